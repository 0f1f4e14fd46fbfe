//! Background analytics worker
//!
//! A single consumer task owns an [`AnalyticsProcessor`] and handles requests
//! one at a time, in arrival order. Outgoing messages collect in an
//! [`Outbox`] and are flushed as one batch [`OUTBOX_FLUSH_DELAY`] after the
//! first message of the batch was queued.
//!
//! Each request runs in its own task. A request that panics is answered with
//! a single `error` message and the processor restarts with an empty cache;
//! the worker keeps serving later requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::analysis::EmotionPredictor;
use crate::cache::CacheStats;
use crate::config::AnalyticsConfiguration;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::messages::{WorkerRequest, WorkerResponse};
use crate::pipeline::{AnalyticsProcessor, Outbox};

/// Delay between the first queued message and the batch flush
pub const OUTBOX_FLUSH_DELAY: Duration = Duration::from_millis(30);

/// Spawns the background worker
pub struct AnalyticsWorker;

impl AnalyticsWorker {
    /// Start a worker on the current tokio runtime.
    ///
    /// # Arguments
    /// * `config` - Initial configuration snapshot
    /// * `predictor` - Optional model collaborator for predictive insights
    pub fn spawn(
        config: AnalyticsConfiguration,
        predictor: Option<Arc<dyn EmotionPredictor>>,
    ) -> WorkerHandle {
        let mut processor = AnalyticsProcessor::with_config(config);
        if let Some(predictor) = predictor {
            processor = processor.with_predictor(predictor);
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(run_worker(processor, request_rx, response_tx));

        WorkerHandle {
            requests: request_tx,
            responses: response_rx,
            join,
        }
    }
}

/// Caller side of a running worker
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    responses: mpsc::UnboundedReceiver<Vec<WorkerResponse>>,
    join: JoinHandle<CacheStats>,
}

impl WorkerHandle {
    /// Queue a task or cache command
    pub fn submit(&self, request: WorkerRequest) -> AnalyticsResult<()> {
        self.requests
            .send(request)
            .map_err(|_| AnalyticsError::ChannelClosed)
    }

    /// Stream of flushed batches
    pub fn responses(&mut self) -> &mut mpsc::UnboundedReceiver<Vec<WorkerResponse>> {
        &mut self.responses
    }

    /// Wait for the next flushed batch
    pub async fn next_batch(&mut self) -> Option<Vec<WorkerResponse>> {
        self.responses.recv().await
    }

    /// Stop accepting requests, let the worker finish queued ones, and
    /// return every message not yet received, in order.
    pub async fn shutdown(self) -> AnalyticsResult<Vec<WorkerResponse>> {
        let WorkerHandle {
            requests,
            mut responses,
            join,
        } = self;
        drop(requests);

        let stats = join.await.map_err(|_| AnalyticsError::ChannelClosed)?;
        info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            "Analytics worker stopped"
        );

        let mut pending = Vec::new();
        while let Some(batch) = responses.recv().await {
            pending.extend(batch);
        }
        Ok(pending)
    }
}

fn flush(outbox: &mut Outbox, responses: &mpsc::UnboundedSender<Vec<WorkerResponse>>) {
    if outbox.is_empty() {
        return;
    }
    let batch = outbox.drain();
    debug!(messages = batch.len(), "Flushing outbox");
    // A dropped receiver only means nobody is listening any more
    let _ = responses.send(batch);
}

/// Handle one request in isolation.
///
/// Returns the processor to keep using: the same one on success, a fresh one
/// with the same configuration and predictor after a panic.
async fn handle_isolated(
    processor: AnalyticsProcessor,
    request: WorkerRequest,
    outbox: &mut Outbox,
) -> AnalyticsProcessor {
    let cache_key = request.cache_key().map(str::to_string);
    let config = processor.config().clone();
    let predictor = processor.predictor();

    let task = tokio::spawn(async move {
        let mut processor = processor;
        let mut produced = Outbox::new();
        processor.handle(request, &mut produced).await;
        (processor, produced)
    });

    match task.await {
        Ok((processor, mut produced)) => {
            for response in produced.drain() {
                outbox.push(response);
            }
            processor
        }
        Err(e) => {
            error!(error = %e, cache_key = ?cache_key, "Request handler aborted, resetting cache");
            outbox.push(WorkerResponse::error(cache_key));
            let fresh = AnalyticsProcessor::with_config(config);
            match predictor {
                Some(predictor) => fresh.with_predictor(predictor),
                None => fresh,
            }
        }
    }
}

async fn run_worker(
    mut processor: AnalyticsProcessor,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<Vec<WorkerResponse>>,
) -> CacheStats {
    info!("Analytics worker started");
    let _ = responses.send(vec![WorkerResponse::ready()]);
    let mut outbox = Outbox::new();
    let mut flush_at: Option<Instant> = None;

    loop {
        let deadline = flush_at.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = sleep_until(deadline), if flush_at.is_some() => {
                flush(&mut outbox, &responses);
                flush_at = None;
            }
            request = requests.recv() => match request {
                Some(request) => {
                    processor = handle_isolated(processor, request, &mut outbox).await;
                    if flush_at.is_none() && !outbox.is_empty() {
                        flush_at = Some(Instant::now() + OUTBOX_FLUSH_DELAY);
                    }
                }
                None => break,
            },
        }
    }

    flush(&mut outbox, &responses);
    processor.destroy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::EmotionForecast;
    use crate::messages::{CacheCommand, ResponseKind, TaskRequest};
    use crate::pipeline::PipelineStage;
    use crate::types::{AnalyticsInputs, EmotionEntry, TrackingEntry};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use pretty_assertions::assert_eq;

    struct PanickingPredictor;

    #[async_trait]
    impl EmotionPredictor for PanickingPredictor {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn predict_emotions(
            &self,
            _history: &[TrackingEntry],
            _horizon_days: usize,
        ) -> AnalyticsResult<Vec<EmotionForecast>> {
            panic!("model crashed");
        }
    }

    fn make_emotion(i: usize) -> EmotionEntry {
        EmotionEntry {
            id: format!("e{}", i),
            timestamp: Utc::now() - ChronoDuration::hours(i as i64),
            emotion: "calm".to_string(),
            intensity: 3.0,
            triggers: vec![],
            student_id: Some("student-1".to_string()),
        }
    }

    fn make_inputs(count: usize) -> AnalyticsInputs {
        AnalyticsInputs {
            emotions: (0..count).map(make_emotion).collect(),
            ..Default::default()
        }
    }

    fn make_sessions(count: usize) -> AnalyticsInputs {
        let entries: Vec<TrackingEntry> = (0..count)
            .map(|i| TrackingEntry {
                id: format!("t{}", i),
                timestamp: Utc::now() - ChronoDuration::days(i as i64 + 1),
                student_id: Some("student-1".to_string()),
                emotions: vec![make_emotion(i)],
                sensory_inputs: vec![],
                environmental_data: None,
                notes: None,
            })
            .collect();
        AnalyticsInputs {
            emotions: entries.iter().flat_map(|e| e.emotions.clone()).collect(),
            entries,
            sensory_inputs: vec![],
        }
    }

    fn task(key: &str, count: usize) -> WorkerRequest {
        WorkerRequest::Task(TaskRequest::new(make_inputs(count)).with_cache_key(key))
    }

    async fn spawn_ready(predictor: Option<Arc<dyn EmotionPredictor>>) -> WorkerHandle {
        let mut handle = AnalyticsWorker::spawn(AnalyticsConfiguration::default(), predictor);
        let ready = handle.next_batch().await.unwrap();
        assert_eq!(ready, vec![WorkerResponse::ready()]);
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_announced_on_start() {
        let mut handle = AnalyticsWorker::spawn(AnalyticsConfiguration::default(), None);
        let batch = handle.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ResponseKind::Progress);
        assert_eq!(batch[0].progress.map(|p| (p.stage, p.percent)), Some((PipelineStage::Ready, 1)));
        assert!(handle.shutdown().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_messages_arrive_in_one_batch() {
        let mut handle = spawn_ready(None).await;
        handle.submit(task("a", 4)).unwrap();

        let started = Instant::now();
        let batch = handle.next_batch().await.unwrap();
        assert!(started.elapsed() >= OUTBOX_FLUSH_DELAY);

        let kinds: Vec<ResponseKind> = batch.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResponseKind::Progress,
                ResponseKind::Partial,
                ResponseKind::Complete
            ]
        );
        assert!(handle.shutdown().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_processed_in_order() {
        let mut handle = spawn_ready(None).await;
        handle.submit(task("first", 3)).unwrap();
        handle
            .submit(WorkerRequest::Cache(CacheCommand::ClearAll))
            .unwrap();
        handle.submit(task("second", 5)).unwrap();

        let mut received = Vec::new();
        while received.iter().filter(|r: &&WorkerResponse| r.kind == ResponseKind::Complete).count() < 2 {
            received.extend(handle.next_batch().await.unwrap());
        }

        let first_complete = received
            .iter()
            .position(|r| r.kind == ResponseKind::Complete)
            .unwrap();
        let clear = received
            .iter()
            .position(|r| r.kind == ResponseKind::ClearDone)
            .unwrap();
        let second_start = received
            .iter()
            .position(|r| r.cache_key.as_deref() == Some("second"))
            .unwrap();
        assert!(first_complete < clear);
        assert!(clear < second_start);
        assert!(received[..first_complete]
            .iter()
            .all(|r| r.cache_key.as_deref() == Some("first")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_reports_error_and_worker_survives() {
        let predictor: Arc<dyn EmotionPredictor> = Arc::new(PanickingPredictor);
        let mut handle = spawn_ready(Some(predictor)).await;

        let crashing = TaskRequest::new(make_sessions(8)).with_cache_key("crash");
        handle.submit(WorkerRequest::Task(crashing)).unwrap();
        let batch = handle.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ResponseKind::Error);
        assert_eq!(batch[0].cache_key.as_deref(), Some("crash"));
        let results = batch[0].results().unwrap();
        assert!(results.patterns.is_empty());
        assert!(results.correlation_matrix.is_empty());

        // Too few sessions to consult the model, so this run completes
        handle.submit(task("after", 4)).unwrap();
        let batch = handle.next_batch().await.unwrap();
        assert_eq!(batch.last().map(|r| r.kind), Some(ResponseKind::Complete));
        assert!(batch.iter().all(|r| r.cache_key.as_deref() == Some("after")));

        assert!(handle.shutdown().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_messages() {
        let handle = spawn_ready(None).await;
        handle
            .submit(WorkerRequest::Cache(CacheCommand::ClearPatterns))
            .unwrap();

        let pending = handle.shutdown().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, ResponseKind::ClearDone);
    }
}
