//! Core types for Compass analytics
//!
//! This module defines the observation records the engine reads (emotion,
//! sensory, and tracking entries) and the result shapes it produces: patterns,
//! correlation matrices, anomalies, trends, predictive insights, and alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single observed emotion with its intensity on a 1-5 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub emotion: String,
    /// Intensity, 1 (mild) to 5 (severe)
    pub intensity: f64,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

/// Direction of a sensory response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensoryResponse {
    Seeking,
    Avoiding,
    Neutral,
}

impl SensoryResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensoryResponse::Seeking => "seeking",
            SensoryResponse::Avoiding => "avoiding",
            SensoryResponse::Neutral => "neutral",
        }
    }

    /// Classify a free-form response label.
    ///
    /// Observers record responses like "seeking", "craving input", "avoiding"
    /// or "covering ears"; anything else is treated as neutral.
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("seeking") || label.contains("craving") {
            SensoryResponse::Seeking
        } else if label.contains("avoiding") || label.contains("covering") {
            SensoryResponse::Avoiding
        } else {
            SensoryResponse::Neutral
        }
    }
}

/// A single sensory observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sensory_type: String,
    pub response: SensoryResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

/// Room readings captured alongside a tracking session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConditions {
    /// Noise level (dB-like scale)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_level: Option<f64>,
    /// Temperature in celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Lighting label: dim, normal, bright, fluorescent, natural
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
}

/// Environmental context of a tracking session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_conditions: Option<RoomConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_activity: Option<String>,
}

/// A tracking session bundling emotions, sensory inputs and environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default)]
    pub emotions: Vec<EmotionEntry>,
    #[serde(default)]
    pub sensory_inputs: Vec<SensoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_data: Option<EnvironmentalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TrackingEntry {
    /// Room conditions, if any were recorded
    pub fn room(&self) -> Option<&RoomConditions> {
        self.environmental_data
            .as_ref()
            .and_then(|env| env.room_conditions.as_ref())
    }
}

/// The three observation arrays a task analyzes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsInputs {
    #[serde(default)]
    pub entries: Vec<TrackingEntry>,
    #[serde(default)]
    pub emotions: Vec<EmotionEntry>,
    #[serde(default)]
    pub sensory_inputs: Vec<SensoryEntry>,
}

impl AnalyticsInputs {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.emotions.is_empty() && self.sensory_inputs.is_empty()
    }

    /// First student id found in the inputs, used for cache tagging
    pub fn student_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|e| e.student_id.as_deref())
            .or_else(|| self.emotions.iter().find_map(|e| e.student_id.as_deref()))
            .or_else(|| {
                self.sensory_inputs
                    .iter()
                    .find_map(|s| s.student_id.as_deref())
            })
    }
}

/// Which signal family a pattern or anomaly was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Emotion,
    Sensory,
    Environmental,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Emotion => "emotion",
            SignalKind::Sensory => "sensory",
            SignalKind::Environmental => "environmental",
        }
    }
}

/// A recurring regularity found in emotion or sensory data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternResult {
    pub pattern: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub frequency: usize,
    pub data_points: usize,
    pub description: String,
    pub recommendations: Vec<String>,
    /// Analysis window, e.g. "30 days"
    pub timeframe: String,
}

/// Qualitative tier applied to a correlation coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Low,
    Moderate,
    High,
}

/// A factor pair whose correlation cleared the configured threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificantPair {
    pub factor1: String,
    pub factor2: String,
    pub correlation: f64,
    pub significance: Significance,
}

/// Pairwise correlations between derived numeric factors
///
/// `matrix` is symmetric. The diagonal and any pair without enough shared
/// observations hold 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    pub factors: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub significant_pairs: Vec<SignificantPair>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// Correlation between an environmental factor and an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalCorrelation {
    pub factor: String,
    pub outcome: String,
    pub correlation: f64,
    pub significance: Significance,
    pub description: String,
    pub recommendations: Vec<String>,
}

/// Severity bucket shared by anomalies, insights and alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A data point whose z-score exceeded the configured threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetection {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Absolute z-score of the flagged point
    pub z_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Direction of a fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Forecast values extrapolated from a trend line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendForecast {
    pub next7_days: f64,
    pub next30_days: f64,
    pub confidence: f64,
}

/// Least-squares trend over an ordered series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    /// Change per day
    pub rate: f64,
    /// Coefficient of determination (r squared)
    pub significance: f64,
    pub confidence: f64,
    pub forecast: TrendForecast,
}

/// Where an insight came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Ml,
    Heuristic,
}

/// Category of a predictive insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Prediction,
    Trend,
    Risk,
}

/// The forecast carried by a predictive insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub trend: TrendDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_value: Option<f64>,
    pub timeframe: String,
}

/// A forward-looking statement about a student's data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictiveInsight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub prediction: Prediction,
    pub recommendations: Vec<String>,
    pub source: InsightSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<ConfidenceExplanation>,
}

/// Overall confidence band of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// Diagnostic trail describing why an insight has its confidence.
///
/// `factors` are tagged strings such as `insufficientData:3:5` or
/// `adequateTimespan:21:30` that consumers can render or log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceExplanation {
    pub level: ConfidenceLevel,
    pub explanation: String,
    pub factors: Vec<String>,
}

/// Category of a trigger alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Concern,
    Improvement,
    Pattern,
}

/// An actionable alert derived from recent observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAlert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

/// Full analytics shape delivered to consumers.
///
/// `Default` is the well-formed empty result used for skipped stages and
/// error payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResults {
    pub patterns: Vec<PatternResult>,
    pub correlations: Vec<EnvironmentalCorrelation>,
    pub correlation_matrix: CorrelationMatrix,
    pub predictive_insights: Vec<PredictiveInsight>,
    pub anomalies: Vec<AnomalyDetection>,
    pub insights: Vec<String>,
}
