//! Observation ingestion
//!
//! Raw observation JSON arrives loosely typed: intensities may be strings,
//! timestamps may be RFC 3339 strings, plain dates, or epoch milliseconds.
//! This module is the only place where such values are coerced:
//! - `coerce_finite` maps anything to a finite number or a fallback
//! - `coerce_timestamp` maps anything to a valid instant or a fallback
//! - `Normalizer` turns raw records into the typed records in `types`

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{
    AnalyticsInputs, EmotionEntry, EnvironmentalData, RoomConditions, SensoryEntry,
    SensoryResponse, TrackingEntry,
};

/// Lowest and highest intensity on the observation scale
pub const INTENSITY_MIN: f64 = 1.0;
pub const INTENSITY_MAX: f64 = 5.0;

/// Coerce a JSON value to a finite number.
///
/// Accepts numbers and numeric strings; everything else returns `fallback`.
pub fn coerce_finite(value: &Value, fallback: f64) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(fallback)
}

/// Like `coerce_finite`, but absent values stay absent
pub fn coerce_optional_finite(value: Option<&Value>) -> Option<f64> {
    value
        .map(|v| coerce_finite(v, f64::NAN))
        .filter(|v| v.is_finite())
}

/// Parse a timestamp from RFC 3339, `YYYY-MM-DD`, or epoch milliseconds
pub fn parse_timestamp(value: &Value) -> AnalyticsResult<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| AnalyticsError::DateParseError(s.clone()))
        }
        Value::Number(n) => n
            .as_f64()
            .filter(|ms| ms.is_finite())
            .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
            .ok_or_else(|| AnalyticsError::DateParseError(n.to_string())),
        other => Err(AnalyticsError::DateParseError(other.to_string())),
    }
}

/// Coerce a JSON value to a valid instant, falling back to `fallback`
pub fn coerce_timestamp(value: &Value, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match parse_timestamp(value) {
        Ok(ts) => ts,
        Err(e) => {
            warn!(error = %e, "unparseable timestamp, using fallback");
            fallback
        }
    }
}

/// Emotion record as received from storage or the CLI
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEmotionEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Value,
    pub emotion: String,
    #[serde(default)]
    pub intensity: Value,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

/// Sensory record as received from storage or the CLI
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSensoryEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Value,
    #[serde(alias = "type")]
    pub sensory_type: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub intensity: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoomConditions {
    #[serde(default)]
    pub noise_level: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub lighting: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvironmentalData {
    #[serde(default)]
    pub room_conditions: Option<RawRoomConditions>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub classroom_activity: Option<String>,
}

/// Tracking session as received from storage or the CLI
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrackingEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub emotions: Vec<RawEmotionEntry>,
    #[serde(default)]
    pub sensory_inputs: Vec<RawSensoryEntry>,
    #[serde(default)]
    pub environmental_data: Option<RawEnvironmentalData>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The three raw observation arrays
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInputs {
    #[serde(default)]
    pub entries: Vec<RawTrackingEntry>,
    #[serde(default)]
    pub emotions: Vec<RawEmotionEntry>,
    #[serde(default)]
    pub sensory_inputs: Vec<RawSensoryEntry>,
}

/// Converts raw observations into typed records
pub struct Normalizer;

impl Normalizer {
    /// Parse and normalize a JSON document of raw inputs.
    ///
    /// # Arguments
    /// * `json` - Object with optional `entries`, `emotions`, `sensoryInputs`
    /// * `reference` - Instant substituted for unparseable timestamps
    pub fn parse_inputs(json: &str, reference: DateTime<Utc>) -> AnalyticsResult<AnalyticsInputs> {
        let raw: RawInputs = serde_json::from_str(json)
            .map_err(|e| AnalyticsError::ParseError(e.to_string()))?;
        Ok(Self::normalize_inputs(raw, reference))
    }

    pub fn normalize_inputs(raw: RawInputs, reference: DateTime<Utc>) -> AnalyticsInputs {
        AnalyticsInputs {
            entries: raw
                .entries
                .into_iter()
                .map(|e| Self::normalize_tracking(e, reference))
                .collect(),
            emotions: raw
                .emotions
                .into_iter()
                .map(|e| Self::normalize_emotion(e, reference))
                .collect(),
            sensory_inputs: raw
                .sensory_inputs
                .into_iter()
                .map(|s| Self::normalize_sensory(s, reference))
                .collect(),
        }
    }

    pub fn normalize_emotion(raw: RawEmotionEntry, reference: DateTime<Utc>) -> EmotionEntry {
        EmotionEntry {
            id: raw.id.unwrap_or_else(new_id),
            timestamp: coerce_timestamp(&raw.timestamp, reference),
            emotion: raw.emotion.trim().to_lowercase(),
            intensity: coerce_finite(&raw.intensity, INTENSITY_MIN).clamp(INTENSITY_MIN, INTENSITY_MAX),
            triggers: raw.triggers,
            student_id: raw.student_id,
        }
    }

    pub fn normalize_sensory(raw: RawSensoryEntry, reference: DateTime<Utc>) -> SensoryEntry {
        SensoryEntry {
            id: raw.id.unwrap_or_else(new_id),
            timestamp: coerce_timestamp(&raw.timestamp, reference),
            sensory_type: raw.sensory_type.trim().to_lowercase(),
            response: SensoryResponse::classify(&raw.response),
            intensity: coerce_optional_finite(raw.intensity.as_ref())
                .map(|v| v.clamp(INTENSITY_MIN, INTENSITY_MAX)),
            notes: raw.notes,
            student_id: raw.student_id,
        }
    }

    pub fn normalize_tracking(raw: RawTrackingEntry, reference: DateTime<Utc>) -> TrackingEntry {
        let timestamp = coerce_timestamp(&raw.timestamp, reference);
        let student_id = raw.student_id;

        // Nested records inherit the session's time and student when missing
        let emotions = raw
            .emotions
            .into_iter()
            .map(|mut e| {
                if e.student_id.is_none() {
                    e.student_id = student_id.clone();
                }
                Self::normalize_emotion(e, timestamp)
            })
            .collect();
        let sensory_inputs = raw
            .sensory_inputs
            .into_iter()
            .map(|mut s| {
                if s.student_id.is_none() {
                    s.student_id = student_id.clone();
                }
                Self::normalize_sensory(s, timestamp)
            })
            .collect();

        TrackingEntry {
            id: raw.id.unwrap_or_else(new_id),
            timestamp,
            student_id,
            emotions,
            sensory_inputs,
            environmental_data: raw.environmental_data.map(normalize_environment),
            notes: raw.notes,
        }
    }
}

fn normalize_environment(raw: RawEnvironmentalData) -> EnvironmentalData {
    EnvironmentalData {
        room_conditions: raw.room_conditions.map(|room| RoomConditions {
            noise_level: coerce_optional_finite(room.noise_level.as_ref()),
            temperature: coerce_optional_finite(room.temperature.as_ref()),
            lighting: room.lighting.map(|l| l.trim().to_lowercase()),
        }),
        weather: raw.weather,
        classroom_activity: raw.classroom_activity,
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
