//! Pipeline orchestration
//!
//! Drives one analysis task through the ordered stages:
//! received → patterns → correlations → predictiveInsights → anomalies → complete.
//!
//! Each computed stage emits a `partial` message with only its own slice.
//! Stages below the configured minimum-data gates are skipped without a
//! `partial`. A stage failure ends the run with a single `error` message whose
//! payload is still a complete, empty result set.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::{summarize, Analyzer, EmotionPredictor};
use crate::cache::CacheStats;
use crate::cached::CachedAnalysis;
use crate::config::{merge_config, AnalyticsConfiguration};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::messages::{
    CacheCommand, ClearReport, ClearScope, PartialResults, TaskRequest, WorkerRequest,
    WorkerResponse, CHART_ANOMALY_TIMELINE, CHART_CORRELATION_MATRIX, CHART_INSIGHT_LIST,
    CHART_PATTERN_HIGHLIGHTS, CHART_PREDICTIVE_TIMELINE,
};
use crate::types::{AnalyticsInputs, AnalyticsResults};

/// Position of a task in the analysis pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    /// Worker started; sent once before any task
    Ready,
    #[serde(rename = "start")]
    Received,
    Patterns,
    Correlations,
    PredictiveInsights,
    Anomalies,
    Complete,
    Error,
}

impl PipelineStage {
    /// Following stage. `Complete` and `Error` are terminal.
    pub fn next(self) -> Self {
        match self {
            PipelineStage::Ready => PipelineStage::Received,
            PipelineStage::Received => PipelineStage::Patterns,
            PipelineStage::Patterns => PipelineStage::Correlations,
            PipelineStage::Correlations => PipelineStage::PredictiveInsights,
            PipelineStage::PredictiveInsights => PipelineStage::Anomalies,
            PipelineStage::Anomalies => PipelineStage::Complete,
            PipelineStage::Complete => PipelineStage::Complete,
            PipelineStage::Error => PipelineStage::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Error)
    }

    /// Progress percentage reported once the stage is reached
    pub fn percent(self) -> u8 {
        match self {
            PipelineStage::Ready => 1,
            PipelineStage::Received => 5,
            PipelineStage::Patterns => 30,
            PipelineStage::Correlations => 55,
            PipelineStage::PredictiveInsights => 75,
            PipelineStage::Anomalies => 85,
            PipelineStage::Complete | PipelineStage::Error => 100,
        }
    }

    /// Views a consumer should refresh after this stage
    pub fn charts(self) -> &'static [&'static str] {
        match self {
            PipelineStage::Ready | PipelineStage::Received => &[],
            PipelineStage::Patterns => &[CHART_PATTERN_HIGHLIGHTS],
            PipelineStage::Correlations => &[CHART_CORRELATION_MATRIX],
            PipelineStage::PredictiveInsights => &[CHART_PREDICTIVE_TIMELINE],
            PipelineStage::Anomalies => &[CHART_ANOMALY_TIMELINE],
            PipelineStage::Complete | PipelineStage::Error => &[CHART_INSIGHT_LIST],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Ready => "ready",
            PipelineStage::Received => "start",
            PipelineStage::Patterns => "patterns",
            PipelineStage::Correlations => "correlations",
            PipelineStage::PredictiveInsights => "predictiveInsights",
            PipelineStage::Anomalies => "anomalies",
            PipelineStage::Complete => "complete",
            PipelineStage::Error => "error",
        }
    }
}

/// FIFO queue of outgoing messages awaiting a flush
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<WorkerResponse>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: WorkerResponse) {
        self.queue.push_back(response);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued message, oldest first
    pub fn drain(&mut self) -> Vec<WorkerResponse> {
        self.queue.drain(..).collect()
    }
}

/// Stateful processor holding the result cache between tasks.
///
/// Keeps the last configuration snapshot it was given; a task without a
/// `config` runs against that snapshot.
pub struct AnalyticsProcessor {
    cached: CachedAnalysis,
    config: AnalyticsConfiguration,
    predictor: Option<Arc<dyn EmotionPredictor>>,
}

impl Default for AnalyticsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsProcessor {
    /// Create a processor with default configuration and no predictor
    pub fn new() -> Self {
        Self::with_config(AnalyticsConfiguration::default())
    }

    /// Create a processor starting from a specific configuration
    pub fn with_config(config: AnalyticsConfiguration) -> Self {
        Self {
            cached: CachedAnalysis::new(&config.cache),
            config,
            predictor: None,
        }
    }

    /// Attach a model-based emotion predictor
    pub fn with_predictor(mut self, predictor: Arc<dyn EmotionPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Last configuration snapshot applied
    pub fn config(&self) -> &AnalyticsConfiguration {
        &self.config
    }

    pub fn predictor(&self) -> Option<Arc<dyn EmotionPredictor>> {
        self.predictor.clone()
    }

    pub fn cache(&self) -> &CachedAnalysis {
        &self.cached
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cached.stats()
    }

    /// Release the cache and return its final counters
    pub fn destroy(self) -> CacheStats {
        self.cached.destroy()
    }

    /// Dispatch any worker request
    pub async fn handle(&mut self, request: WorkerRequest, outbox: &mut Outbox) {
        match request {
            WorkerRequest::Task(task) => self.process(task, outbox).await,
            WorkerRequest::Cache(command) => self.handle_cache(command, outbox),
        }
    }

    /// Run one task against the current clock
    pub async fn process(&mut self, request: TaskRequest, outbox: &mut Outbox) {
        self.process_at(request, Utc::now(), outbox).await
    }

    /// Run one task with an explicit reference instant.
    ///
    /// # Arguments
    /// * `request` - Task envelope with inputs and optional configuration
    /// * `now` - Instant that analysis windows are measured back from
    /// * `outbox` - Queue receiving progress, partial, complete or error messages
    pub async fn process_at(&mut self, request: TaskRequest, now: DateTime<Utc>, outbox: &mut Outbox) {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            entries = request.inputs.entries.len(),
            emotions = request.inputs.emotions.len(),
            sensory = request.inputs.sensory_inputs.len(),
            "Analytics task received"
        );
        let cache_key = request.cache_key.clone();
        let outcome = self.run(&request, now, outbox).await;
        self.conclude(run_id, outcome, cache_key, outbox);
    }

    /// Apply a cache-control command and queue its acknowledgment
    pub fn handle_cache(&mut self, command: CacheCommand, outbox: &mut Outbox) {
        let report = match command {
            CacheCommand::ClearAll => {
                let patterns_cleared = self.cached.clear_patterns();
                let remainder = self.cached.invalidate_all_cache();
                ClearReport {
                    scope: ClearScope::All,
                    student_id: None,
                    patterns_cleared,
                    cache_cleared: Some(patterns_cleared + remainder),
                    stats: self.cached.stats(),
                }
            }
            CacheCommand::ClearStudent { student_id } => {
                let cleared = self.cached.invalidate_student_cache(&student_id);
                ClearReport {
                    scope: ClearScope::Student,
                    student_id: Some(student_id),
                    patterns_cleared: cleared,
                    cache_cleared: Some(cleared),
                    stats: self.cached.stats(),
                }
            }
            CacheCommand::ClearPatterns => ClearReport {
                scope: ClearScope::Patterns,
                student_id: None,
                patterns_cleared: self.cached.clear_patterns(),
                cache_cleared: None,
                stats: self.cached.stats(),
            },
        };
        info!(scope = ?report.scope, cleared = report.patterns_cleared, "Cache command handled");
        outbox.push(WorkerResponse::clear_done(report));
    }

    fn conclude(
        &self,
        run_id: Uuid,
        outcome: AnalyticsResult<()>,
        cache_key: Option<String>,
        outbox: &mut Outbox,
    ) {
        match outcome {
            Ok(()) => info!(%run_id, "Analytics task complete"),
            Err(e) => {
                error!(%run_id, error = %e, "Analytics task failed");
                outbox.push(WorkerResponse::error(cache_key));
            }
        }
    }

    fn refresh_config(&mut self, request: &TaskRequest) -> AnalyticsResult<()> {
        if let Some(patch) = &request.config {
            self.config = resolve_config(patch);
        }
        self.cached.apply_config(&self.config)?;
        if let Some(ttl_seconds) = request.ttl_seconds.filter(|secs| *secs > 0) {
            self.cached.set_ttl_override(ttl_seconds);
        }
        Ok(())
    }

    async fn run(
        &mut self,
        request: &TaskRequest,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> AnalyticsResult<()> {
        self.refresh_config(request)?;

        // Snapshot for the rest of this run
        let config = self.config.clone();
        let inputs = &request.inputs;
        let cache_key = request.cache_key.clone();

        if inputs.is_empty() {
            let results = AnalyticsResults {
                insights: summarize(&AnalyticsResults::default(), inputs, &config),
                ..Default::default()
            };
            outbox.push(WorkerResponse::complete(results, cache_key));
            return Ok(());
        }

        let analyzer = Analyzer::new(&config, now);
        let mut results = AnalyticsResults::default();
        let mut stage = PipelineStage::Received;
        outbox.push(WorkerResponse::progress(stage, cache_key.clone()));

        loop {
            stage = stage.next();
            if stage.is_terminal() {
                break;
            }
            if !stage_enabled(stage, inputs, &config) {
                debug!(stage = stage.as_str(), entries = inputs.entries.len(), "Stage skipped below data gate");
                continue;
            }
            let slice = self
                .run_stage(stage, &analyzer, inputs, &mut results)
                .await
                .map_err(|e| AnalyticsError::StageFailed {
                    stage: stage.as_str().to_string(),
                    message: e.to_string(),
                })?;
            outbox.push(WorkerResponse::partial(stage, slice, cache_key.clone()));
        }

        results.insights = summarize(&results, inputs, &config);
        outbox.push(WorkerResponse::complete(results, cache_key));
        Ok(())
    }

    async fn run_stage(
        &mut self,
        stage: PipelineStage,
        analyzer: &Analyzer<'_>,
        inputs: &AnalyticsInputs,
        results: &mut AnalyticsResults,
    ) -> AnalyticsResult<PartialResults> {
        let student_id = inputs.student_id();
        let window_days = Some(analyzer.config().time_windows.default_analysis_days);

        match stage {
            PipelineStage::Patterns => {
                let emotion = self
                    .cached
                    .emotion_patterns(analyzer, student_id, &inputs.emotions, window_days)?;
                let sensory = self
                    .cached
                    .sensory_patterns(analyzer, student_id, &inputs.sensory_inputs, window_days)?;
                results.patterns = emotion.iter().chain(sensory.iter()).cloned().collect();
                Ok(PartialResults {
                    patterns: Some(results.patterns.clone()),
                    ..Default::default()
                })
            }
            PipelineStage::Correlations => {
                let correlations = self
                    .cached
                    .environmental_correlations(analyzer, student_id, &inputs.entries)?;
                let matrix = self.cached.correlation_matrix(analyzer, student_id, &inputs.entries)?;
                results.correlations = Vec::clone(&correlations);
                results.correlation_matrix = matrix.as_ref().clone();
                Ok(PartialResults {
                    correlations: Some(results.correlations.clone()),
                    correlation_matrix: Some(results.correlation_matrix.clone()),
                    ..Default::default()
                })
            }
            PipelineStage::PredictiveInsights => {
                let insights = self
                    .cached
                    .predictive_insights(
                        analyzer,
                        student_id,
                        &inputs.emotions,
                        &inputs.sensory_inputs,
                        &inputs.entries,
                        self.predictor.as_deref(),
                    )
                    .await?;
                results.predictive_insights = Vec::clone(&insights);
                Ok(PartialResults {
                    predictive_insights: Some(results.predictive_insights.clone()),
                    ..Default::default()
                })
            }
            PipelineStage::Anomalies => {
                let anomalies = self.cached.anomalies(
                    analyzer,
                    student_id,
                    &inputs.emotions,
                    &inputs.sensory_inputs,
                    &inputs.entries,
                )?;
                results.anomalies = Vec::clone(&anomalies);
                Ok(PartialResults {
                    anomalies: Some(results.anomalies.clone()),
                    ..Default::default()
                })
            }
            PipelineStage::Ready
            | PipelineStage::Received
            | PipelineStage::Complete
            | PipelineStage::Error => {
                Err(AnalyticsError::StageFailed {
                    stage: stage.as_str().to_string(),
                    message: "not a compute stage".to_string(),
                })
            }
        }
    }
}

/// Configuration carried by a request, laid over the defaults.
///
/// An invalid shape falls back to the defaults as a whole.
fn resolve_config(patch: &Value) -> AnalyticsConfiguration {
    let validated = merge_config(&AnalyticsConfiguration::default(), patch);
    if !validated.meta.is_valid {
        warn!(errors = ?validated.meta.errors, "Task configuration invalid, using defaults");
    }
    validated.config
}

/// Minimum-data gates; patterns always run
fn stage_enabled(stage: PipelineStage, inputs: &AnalyticsInputs, config: &AnalyticsConfiguration) -> bool {
    let sessions = inputs.entries.len();
    match stage {
        PipelineStage::Correlations => sessions >= config.analytics.min_tracking_for_correlation,
        PipelineStage::PredictiveInsights | PipelineStage::Anomalies => {
            sessions >= config.analytics.min_tracking_for_enhanced
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ResponseKind;
    use crate::types::{EmotionEntry, EnvironmentalData, RoomConditions, TrackingEntry};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn make_emotion(i: usize, intensity: f64) -> EmotionEntry {
        EmotionEntry {
            id: format!("e{}", i),
            timestamp: now() - Duration::hours(i as i64 * 12),
            emotion: if i % 3 == 0 { "anxious" } else { "calm" }.to_string(),
            intensity,
            triggers: vec![],
            student_id: Some("student-1".to_string()),
        }
    }

    fn make_inputs(sessions: usize) -> AnalyticsInputs {
        let entries: Vec<TrackingEntry> = (0..sessions)
            .map(|i| TrackingEntry {
                id: format!("t{}", i),
                timestamp: now() - Duration::days(i as i64 + 1),
                student_id: Some("student-1".to_string()),
                emotions: vec![make_emotion(i, 1.0 + (i % 5) as f64)],
                sensory_inputs: vec![],
                environmental_data: Some(EnvironmentalData {
                    room_conditions: Some(RoomConditions {
                        noise_level: Some(30.0 + i as f64 * 3.0),
                        temperature: Some(20.0),
                        lighting: Some("natural".to_string()),
                    }),
                    weather: None,
                    classroom_activity: None,
                }),
                notes: None,
            })
            .collect();
        let emotions = entries.iter().flat_map(|e| e.emotions.clone()).collect();
        AnalyticsInputs {
            entries,
            emotions,
            sensory_inputs: vec![],
        }
    }

    async fn run_task(processor: &mut AnalyticsProcessor, request: TaskRequest) -> Vec<WorkerResponse> {
        let mut outbox = Outbox::new();
        processor.process_at(request, now(), &mut outbox).await;
        outbox.drain()
    }

    fn stages(responses: &[WorkerResponse]) -> Vec<(ResponseKind, Option<PipelineStage>)> {
        responses
            .iter()
            .map(|r| (r.kind, r.progress.map(|p| p.stage)))
            .collect()
    }

    #[test]
    fn test_stage_order() {
        let mut stage = PipelineStage::Ready;
        let mut visited = vec![stage];
        while !stage.is_terminal() {
            stage = stage.next();
            visited.push(stage);
        }
        assert_eq!(
            visited,
            vec![
                PipelineStage::Ready,
                PipelineStage::Received,
                PipelineStage::Patterns,
                PipelineStage::Correlations,
                PipelineStage::PredictiveInsights,
                PipelineStage::Anomalies,
                PipelineStage::Complete,
            ]
        );
        let percents: Vec<u8> = visited.iter().map(|s| s.percent()).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(PipelineStage::Error.next(), PipelineStage::Error);
    }

    #[test]
    fn test_outbox_is_fifo() {
        let mut outbox = Outbox::new();
        outbox.push(WorkerResponse::progress(PipelineStage::Received, Some("a".to_string())));
        outbox.push(WorkerResponse::progress(PipelineStage::Patterns, Some("b".to_string())));
        assert_eq!(outbox.len(), 2);

        let keys: Vec<_> = outbox.drain().into_iter().filter_map(|r| r.cache_key).collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn test_full_run_emits_partials_in_order() {
        let mut processor = AnalyticsProcessor::new();
        let request = TaskRequest::new(make_inputs(8)).with_cache_key("run-1");
        let responses = run_task(&mut processor, request).await;

        assert_eq!(
            stages(&responses),
            vec![
                (ResponseKind::Progress, Some(PipelineStage::Received)),
                (ResponseKind::Partial, Some(PipelineStage::Patterns)),
                (ResponseKind::Partial, Some(PipelineStage::Correlations)),
                (ResponseKind::Partial, Some(PipelineStage::PredictiveInsights)),
                (ResponseKind::Partial, Some(PipelineStage::Anomalies)),
                (ResponseKind::Complete, Some(PipelineStage::Complete)),
            ]
        );
        assert!(responses.iter().all(|r| r.cache_key.as_deref() == Some("run-1")));

        let correlations = responses[2].partial_results().unwrap();
        assert!(correlations.correlation_matrix.is_some());
        assert!(correlations.patterns.is_none());

        let complete = responses.last().unwrap().results().unwrap();
        assert!(!complete.insights.is_empty());
        assert_eq!(
            complete.correlation_matrix.factors.len(),
            crate::analysis::CORRELATION_FACTORS.len()
        );
    }

    #[tokio::test]
    async fn test_small_dataset_skips_gated_stages() {
        let mut processor = AnalyticsProcessor::new();
        let request = TaskRequest::new(make_inputs(1));
        let responses = run_task(&mut processor, request).await;

        assert_eq!(
            stages(&responses),
            vec![
                (ResponseKind::Progress, Some(PipelineStage::Received)),
                (ResponseKind::Partial, Some(PipelineStage::Patterns)),
                (ResponseKind::Complete, Some(PipelineStage::Complete)),
            ]
        );
        let complete = responses[2].results().unwrap();
        assert!(complete.correlations.is_empty());
        assert!(complete.correlation_matrix.is_empty());
        assert!(complete.anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_gates_follow_request_config() {
        let mut processor = AnalyticsProcessor::new();
        let request = TaskRequest::new(make_inputs(4))
            .with_config(json!({"analytics": {"minTrackingForCorrelation": 10}}));
        let responses = run_task(&mut processor, request).await;

        let partial_stages: Vec<_> = responses
            .iter()
            .filter(|r| r.kind == ResponseKind::Partial)
            .filter_map(|r| r.progress.map(|p| p.stage))
            .collect();
        assert_eq!(
            partial_stages,
            vec![
                PipelineStage::Patterns,
                PipelineStage::PredictiveInsights,
                PipelineStage::Anomalies,
            ]
        );
        assert_eq!(processor.config().analytics.min_tracking_for_correlation, 10);
    }

    #[tokio::test]
    async fn test_empty_inputs_complete_immediately() {
        let mut processor = AnalyticsProcessor::new();
        let responses = run_task(&mut processor, TaskRequest::new(AnalyticsInputs::default())).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::Complete);
        assert_eq!(
            responses[0].charts_updated,
            Some(vec![CHART_INSIGHT_LIST.to_string()])
        );
        assert_eq!(processor.cache().computations(), 0);
    }

    #[tokio::test]
    async fn test_repeat_task_served_from_cache() {
        let mut processor = AnalyticsProcessor::new();
        let inputs = make_inputs(8);
        run_task(&mut processor, TaskRequest::new(inputs.clone())).await;
        let computed = processor.cache().computations();

        let second = run_task(&mut processor, TaskRequest::new(inputs)).await;
        assert_eq!(processor.cache().computations(), computed);
        assert_eq!(second.last().map(|r| r.kind), Some(ResponseKind::Complete));
    }

    #[tokio::test]
    async fn test_request_config_and_ttl_override() {
        let mut processor = AnalyticsProcessor::new();
        let mut request = TaskRequest::new(make_inputs(2)).with_config(json!({"cache": {"ttl": 5000, "maxSize": 3}}));
        request.ttl_seconds = Some(120);
        run_task(&mut processor, request).await;

        assert_eq!(processor.cache().max_size(), 3);
        assert_eq!(processor.cache().ttl(), std::time::Duration::from_secs(120));
        assert!(processor.cache_stats().size <= 3);
    }

    #[tokio::test]
    async fn test_invalid_config_falls_back_to_defaults() {
        let mut processor = AnalyticsProcessor::new();
        let request = TaskRequest::new(make_inputs(2))
            .with_config(json!({"patternAnalysis": {"minDataPoints": "lots"}}));
        let responses = run_task(&mut processor, request).await;

        assert_eq!(processor.config(), &AnalyticsConfiguration::default());
        assert_eq!(responses.last().map(|r| r.kind), Some(ResponseKind::Complete));
    }

    #[test]
    fn test_failure_becomes_single_error_message() {
        let processor = AnalyticsProcessor::new();
        let mut outbox = Outbox::new();
        let failure = Err(AnalyticsError::StageFailed {
            stage: "anomalies".to_string(),
            message: "boom".to_string(),
        });
        processor.conclude(Uuid::new_v4(), failure, Some("k".to_string()), &mut outbox);

        let responses = outbox.drain();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::Error);
        let results = responses[0].results().unwrap();
        assert!(results.patterns.is_empty());
        assert!(results.correlation_matrix.is_empty());
        assert_eq!(results.insights.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_commands_report_stats() {
        let mut processor = AnalyticsProcessor::new();
        run_task(&mut processor, TaskRequest::new(make_inputs(8))).await;
        let populated = processor.cache_stats().size;
        assert!(populated > 0);

        let mut outbox = Outbox::new();
        processor.handle_cache(
            CacheCommand::ClearStudent {
                student_id: "student-1".to_string(),
            },
            &mut outbox,
        );
        processor.handle_cache(CacheCommand::ClearAll, &mut outbox);

        let responses = outbox.drain();
        assert!(responses.iter().all(|r| r.kind == ResponseKind::ClearDone));
        let Some(crate::messages::ResponsePayload::Cleared(student)) = &responses[0].payload else {
            panic!("expected clear report");
        };
        assert_eq!(student.scope, ClearScope::Student);
        assert_eq!(student.cache_cleared, Some(populated));
        assert_eq!(student.stats.size, 0);

        let Some(crate::messages::ResponsePayload::Cleared(all)) = &responses[1].payload else {
            panic!("expected clear report");
        };
        assert_eq!(all.cache_cleared, Some(0));
    }

    #[tokio::test]
    async fn test_clear_patterns_empties_analysis_namespaces() {
        let mut processor = AnalyticsProcessor::new();
        run_task(&mut processor, TaskRequest::new(make_inputs(8))).await;

        let mut outbox = Outbox::new();
        processor
            .handle(WorkerRequest::Cache(CacheCommand::ClearPatterns), &mut outbox)
            .await;
        let responses = outbox.drain();
        let Some(crate::messages::ResponsePayload::Cleared(report)) = &responses[0].payload else {
            panic!("expected clear report");
        };
        assert_eq!(report.scope, ClearScope::Patterns);
        assert!(report.patterns_cleared > 0);
        assert_eq!(report.cache_cleared, None);
        assert_eq!(report.stats.size, 0);
    }
}
