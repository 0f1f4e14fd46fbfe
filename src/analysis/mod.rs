//! Statistical analysis core
//!
//! Pure, deterministic computations over observation records. Every operation
//! takes the configuration snapshot and the reference instant from the
//! [`Analyzer`] it is called on, performs no I/O and never panics on empty
//! input.
//!
//! - `patterns`: emotion and sensory pattern detection
//! - `correlation`: correlation matrix and environmental correlations
//! - `anomaly`: z-score anomaly detection
//! - `trend`: least-squares trend analysis
//! - `prediction`: predictive insights with an optional model collaborator
//! - `explanation`: confidence diagnostics
//! - `alerts`: trigger alerts
//! - `summary`: short human-readable insight lines

mod alerts;
mod anomaly;
mod correlation;
mod explanation;
mod patterns;
mod prediction;
mod summary;
mod trend;

use chrono::{DateTime, Utc};

use crate::config::AnalyticsConfiguration;

pub use correlation::{lighting_to_numeric, CORRELATION_FACTORS};
pub use prediction::{EmotionForecast, EmotionPredictor, ML_MIN_TRACKING_ENTRIES};
pub use summary::summarize;

/// Analysis context: a configuration snapshot and the instant "now".
///
/// Windowed operations (patterns, alerts, risk) measure their windows back
/// from `now`, so passing it explicitly keeps every result reproducible.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer<'a> {
    config: &'a AnalyticsConfiguration,
    now: DateTime<Utc>,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a AnalyticsConfiguration, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn config(&self) -> &'a AnalyticsConfiguration {
        self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Requested window, or the configured default when absent or non-positive
    fn window_days(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(days) if days > 0 => days,
            _ => self.config.time_windows.default_analysis_days,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Record builders shared by the analysis tests

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::types::{
        EmotionEntry, EnvironmentalData, RoomConditions, SensoryEntry, SensoryResponse,
        TrackingEntry,
    };

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    pub fn hours_ago(hours: i64) -> DateTime<Utc> {
        now() - Duration::hours(hours)
    }

    pub fn make_emotion(emotion: &str, intensity: f64, ts: DateTime<Utc>) -> EmotionEntry {
        EmotionEntry {
            id: format!("{}-{}", emotion, ts.timestamp_millis()),
            timestamp: ts,
            emotion: emotion.to_string(),
            intensity,
            triggers: vec![],
            student_id: Some("student-1".to_string()),
        }
    }

    pub fn make_sensory(response: SensoryResponse, ts: DateTime<Utc>) -> SensoryEntry {
        SensoryEntry {
            id: format!("{}-{}", response.as_str(), ts.timestamp_millis()),
            timestamp: ts,
            sensory_type: "auditory".to_string(),
            response,
            intensity: Some(3.0),
            notes: None,
            student_id: Some("student-1".to_string()),
        }
    }

    pub fn make_entry(
        index: usize,
        ts: DateTime<Utc>,
        emotions: Vec<EmotionEntry>,
        room: Option<RoomConditions>,
    ) -> TrackingEntry {
        TrackingEntry {
            id: format!("entry-{}", index),
            timestamp: ts,
            student_id: Some("student-1".to_string()),
            emotions,
            sensory_inputs: vec![],
            environmental_data: room.map(|r| EnvironmentalData {
                room_conditions: Some(r),
                weather: None,
                classroom_activity: None,
            }),
            notes: None,
        }
    }

    /// 16 sessions with rising noise and emotion intensity climbing 1 to 5
    pub fn rising_noise_entries() -> Vec<TrackingEntry> {
        (0..16)
            .map(|i| {
                let ts = now() - Duration::days(16 - i as i64);
                let intensity = 1.0 + (i as f64) * 4.0 / 15.0;
                let emotion = make_emotion("anxious", intensity, ts);
                let room = RoomConditions {
                    noise_level: Some(40.0 + i as f64 * 3.0),
                    temperature: None,
                    lighting: None,
                };
                make_entry(i, ts, vec![emotion], Some(room))
            })
            .collect()
    }
}
