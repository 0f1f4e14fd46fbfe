//! Error types for Compass analytics

use thiserror::Error;

/// Errors that can surface from the analytics engine.
///
/// The statistical core and the cache never return these for expected edge
/// cases (empty or tiny datasets, odd configuration). They appear at the
/// ingestion boundary, at the prediction seam, and inside the orchestrator.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Failed to parse observation payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Stage {stage} failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Worker channel closed")]
    ChannelClosed,
}

/// Convenience alias used across the crate
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
