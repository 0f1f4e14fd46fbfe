//! Worker message schema
//!
//! Requests are either an analysis task or a cache command. Every response
//! shares one envelope, `{type, cacheKey?, payload?, chartsUpdated?,
//! progress?, error?}`, serialized as camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheStats;
use crate::pipeline::PipelineStage;
use crate::types::{
    AnalyticsInputs, AnalyticsResults, AnomalyDetection, CorrelationMatrix,
    EnvironmentalCorrelation, PatternResult, PredictiveInsight,
};

/// Chart identifiers refreshed by each message
pub const CHART_PATTERN_HIGHLIGHTS: &str = "patternHighlights";
pub const CHART_CORRELATION_MATRIX: &str = "correlationMatrix";
pub const CHART_PREDICTIVE_TIMELINE: &str = "predictiveTimeline";
pub const CHART_ANOMALY_TIMELINE: &str = "anomalyTimeline";
pub const CHART_INSIGHT_LIST: &str = "insightList";

/// Message reported by an `error` response
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze data.";

/// One analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub inputs: AnalyticsInputs,
    /// Untrusted configuration; validated before use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl TaskRequest {
    pub fn new(inputs: AnalyticsInputs) -> Self {
        Self {
            cache_key: None,
            inputs,
            config: None,
            ttl_seconds: None,
        }
    }

    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// Cache-control commands, handled outside the analysis pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheCommand {
    ClearAll,
    ClearStudent {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    ClearPatterns,
}

/// Anything the worker accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerRequest {
    Cache(CacheCommand),
    Task(TaskRequest),
}

impl WorkerRequest {
    /// Correlation key echoed on every response to a task
    pub fn cache_key(&self) -> Option<&str> {
        match self {
            WorkerRequest::Task(task) => task.cache_key.as_deref(),
            WorkerRequest::Cache(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseKind {
    Progress,
    Partial,
    Complete,
    Error,
    ClearDone,
}

/// Pipeline position reported with progress, partial and complete messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: PipelineStage,
    pub percent: u8,
}

impl From<PipelineStage> for Progress {
    fn from(stage: PipelineStage) -> Self {
        Self {
            stage,
            percent: stage.percent(),
        }
    }
}

/// The slice a single stage computed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlations: Option<Vec<EnvironmentalCorrelation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_matrix: Option<CorrelationMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictive_insights: Option<Vec<PredictiveInsight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<AnomalyDetection>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    All,
    Student,
    Patterns,
}

/// Acknowledgment for a cache command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub scope: ClearScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub patterns_cleared: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_cleared: Option<usize>,
    pub stats: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Results(AnalyticsResults),
    Cleared(ClearReport),
    Partial(PartialResults),
}

/// Envelope for everything the worker emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ResponsePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts_updated: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn charts(ids: &[&str]) -> Option<Vec<String>> {
    Some(ids.iter().map(|id| id.to_string()).collect())
}

impl WorkerResponse {
    fn empty(kind: ResponseKind, cache_key: Option<String>) -> Self {
        Self {
            kind,
            cache_key,
            payload: None,
            charts_updated: None,
            progress: None,
            error: None,
        }
    }

    /// Sent once when a worker starts accepting requests
    pub fn ready() -> Self {
        Self::progress(PipelineStage::Ready, None)
    }

    pub fn progress(stage: PipelineStage, cache_key: Option<String>) -> Self {
        Self {
            progress: Some(stage.into()),
            ..Self::empty(ResponseKind::Progress, cache_key)
        }
    }

    pub fn partial(stage: PipelineStage, slice: PartialResults, cache_key: Option<String>) -> Self {
        Self {
            payload: Some(ResponsePayload::Partial(slice)),
            charts_updated: Some(stage.charts().iter().map(|c| c.to_string()).collect()),
            progress: Some(stage.into()),
            ..Self::empty(ResponseKind::Partial, cache_key)
        }
    }

    pub fn complete(results: AnalyticsResults, cache_key: Option<String>) -> Self {
        Self {
            payload: Some(ResponsePayload::Results(results)),
            charts_updated: charts(&[CHART_INSIGHT_LIST]),
            progress: Some(PipelineStage::Complete.into()),
            ..Self::empty(ResponseKind::Complete, cache_key)
        }
    }

    /// Error with a well-formed empty result set
    pub fn error(cache_key: Option<String>) -> Self {
        let results = AnalyticsResults {
            insights: vec!["An error occurred during analysis. Please try again.".to_string()],
            ..AnalyticsResults::default()
        };
        Self {
            payload: Some(ResponsePayload::Results(results)),
            charts_updated: charts(&[CHART_INSIGHT_LIST]),
            error: Some(ANALYSIS_FAILED_MESSAGE.to_string()),
            ..Self::empty(ResponseKind::Error, cache_key)
        }
    }

    pub fn clear_done(report: ClearReport) -> Self {
        Self {
            payload: Some(ResponsePayload::Cleared(report)),
            ..Self::empty(ResponseKind::ClearDone, None)
        }
    }

    /// Full results carried by `complete` and `error` messages
    pub fn results(&self) -> Option<&AnalyticsResults> {
        match &self.payload {
            Some(ResponsePayload::Results(results)) => Some(results),
            _ => None,
        }
    }

    pub fn partial_results(&self) -> Option<&PartialResults> {
        match &self.payload {
            Some(ResponsePayload::Partial(slice)) => Some(slice),
            _ => None,
        }
    }
}
