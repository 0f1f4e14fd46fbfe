//! Cached analysis façade
//!
//! Wraps every [`Analyzer`] operation with a [`CacheEngine`] lookup. The key
//! for an operation combines a fingerprint of its input data with a hash of
//! only the configuration fields that operation reads, so identical calls
//! are served from cache and any relevant change yields a fresh key.
//!
//! Results are shared as `Arc`s; a cache hit hands back the same allocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::analysis::{Analyzer, EmotionPredictor};
use crate::cache::{CacheEngine, CacheStats};
use crate::config::{AnalysisOperation, AnalyticsConfiguration, CacheConfig, MIN_CACHE_TTL_MS};
use crate::error::AnalyticsResult;
use crate::fingerprint::{create_key, data_fingerprint};
use crate::types::{
    AnomalyDetection, ConfidenceExplanation, CorrelationMatrix, EmotionEntry,
    EnvironmentalCorrelation, PatternResult, PredictiveInsight, SensoryEntry, TrackingEntry,
    TriggerAlert,
};

/// A cached operation result
#[derive(Debug, Clone)]
pub enum CachedValue {
    Patterns(Arc<Vec<PatternResult>>),
    Correlations(Arc<Vec<EnvironmentalCorrelation>>),
    Matrix(Arc<CorrelationMatrix>),
    Anomalies(Arc<Vec<AnomalyDetection>>),
    Insights(Arc<Vec<PredictiveInsight>>),
    Alerts(Arc<Vec<TriggerAlert>>),
    Explanation(Arc<ConfidenceExplanation>),
}

trait Cacheable: Sized {
    fn wrap(value: Arc<Self>) -> CachedValue;
    fn unwrap(value: &CachedValue) -> Option<Arc<Self>>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn wrap(value: Arc<Self>) -> CachedValue {
                CachedValue::$variant(value)
            }

            fn unwrap(value: &CachedValue) -> Option<Arc<Self>> {
                match value {
                    CachedValue::$variant(inner) => Some(Arc::clone(inner)),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(Vec<PatternResult>, Patterns);
cacheable!(Vec<EnvironmentalCorrelation>, Correlations);
cacheable!(CorrelationMatrix, Matrix);
cacheable!(Vec<AnomalyDetection>, Anomalies);
cacheable!(Vec<PredictiveInsight>, Insights);
cacheable!(Vec<TriggerAlert>, Alerts);
cacheable!(ConfidenceExplanation, Explanation);

/// Tag shared by every entry computed for one student
pub fn student_tag(student_id: &str) -> String {
    format!("student-{}", student_id)
}

/// Cache-backed analysis operations
#[derive(Debug)]
pub struct CachedAnalysis {
    cache: CacheEngine<CachedValue>,
    computations: u64,
    subset_hashes: HashMap<AnalysisOperation, String>,
}

impl CachedAnalysis {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            cache: CacheEngine::from_config(config),
            computations: 0,
            subset_hashes: HashMap::new(),
        }
    }

    /// Number of results computed (cache misses that ran an operation)
    pub fn computations(&self) -> u64 {
        self.computations
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn max_size(&self) -> usize {
        self.cache.max_size()
    }

    /// Key for `op` over `data`.
    ///
    /// `extras` carries call parameters that are not part of the data, such
    /// as a window length.
    pub fn key_for<D: Serialize + ?Sized>(
        op: AnalysisOperation,
        config: &AnalyticsConfiguration,
        data: &D,
        extras: Map<String, Value>,
    ) -> AnalyticsResult<String> {
        let mut parts = extras;
        parts.insert("dataFingerprint".to_string(), Value::String(data_fingerprint(data)?));
        parts.insert(
            "configHash".to_string(),
            Value::String(data_fingerprint(&config.relevant_subset(op))?),
        );
        Ok(create_key(op.as_str(), &parts))
    }

    /// Propagate cache limits from a new configuration snapshot.
    ///
    /// With `invalidateOnConfigChange`, entries of operations whose relevant
    /// configuration changed are dropped; other operations keep their
    /// entries. Returns the number of entries dropped.
    pub fn apply_config(&mut self, config: &AnalyticsConfiguration) -> AnalyticsResult<usize> {
        self.cache.set_ttl(config.cache.ttl_duration());
        self.cache.set_max_size(config.cache.max_entries());

        let mut dropped = 0;
        for op in AnalysisOperation::all() {
            let hash = data_fingerprint(&config.relevant_subset(op))?;
            let previous = self.subset_hashes.insert(op, hash.clone());
            let changed = previous.is_some_and(|prev| prev != hash);
            if changed && config.cache.invalidate_on_config_change {
                dropped += self.cache.clear_by_prefix(&format!("{}:", op.as_str()));
            }
        }
        if dropped > 0 {
            info!(evicted = dropped, "Dropped cache entries after configuration change");
        }
        Ok(dropped)
    }

    /// Per-task TTL override, floored at the minimum TTL
    pub fn set_ttl_override(&mut self, ttl_seconds: u64) {
        let ttl_ms = ttl_seconds.saturating_mul(1_000).max(MIN_CACHE_TTL_MS);
        self.cache.set_ttl(Duration::from_millis(ttl_ms));
    }

    pub fn invalidate_student_cache(&mut self, student_id: &str) -> usize {
        let removed = self.cache.invalidate_by_tag(&student_tag(student_id));
        info!(student_id, evicted = removed, "Invalidated student cache");
        removed
    }

    pub fn invalidate_all_cache(&mut self) -> usize {
        let removed = self.cache.clear_all();
        info!(evicted = removed, "Invalidated all cache entries");
        removed
    }

    /// Drop every analysis result namespace
    pub fn clear_patterns(&mut self) -> usize {
        AnalysisOperation::all()
            .iter()
            .map(|op| self.cache.clear_by_prefix(&format!("{}:", op.as_str())))
            .sum()
    }

    /// Release all entries and return the final counters
    pub fn destroy(mut self) -> CacheStats {
        self.cache.clear_all();
        self.cache.stats()
    }

    fn lookup<T: Cacheable>(&mut self, key: &str) -> Option<Arc<T>> {
        let hit = self.cache.get(key).and_then(|value| T::unwrap(&value));
        if hit.is_some() {
            debug!(cache_key = key, "Cache hit");
        } else {
            debug!(cache_key = key, "Cache miss");
        }
        hit
    }

    fn store<T: Cacheable>(
        &mut self,
        key: &str,
        op: AnalysisOperation,
        student_id: Option<&str>,
        value: T,
    ) -> Arc<T> {
        self.computations += 1;
        let shared = Arc::new(value);
        let mut tags = vec![op.as_str().to_string()];
        if let Some(id) = student_id {
            tags.push(student_tag(id));
        }
        self.cache.set(key, T::wrap(Arc::clone(&shared)), tags);
        shared
    }

    fn cached<T, D, F>(
        &mut self,
        op: AnalysisOperation,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        data: &D,
        extras: Map<String, Value>,
        compute: F,
    ) -> AnalyticsResult<Arc<T>>
    where
        T: Cacheable,
        D: Serialize + ?Sized,
        F: FnOnce() -> T,
    {
        let key = Self::key_for(op, analyzer.config(), data, extras)?;
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        Ok(self.store(&key, op, student_id, compute()))
    }

    pub fn emotion_patterns(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        emotions: &[EmotionEntry],
        window_days: Option<i64>,
    ) -> AnalyticsResult<Arc<Vec<PatternResult>>> {
        self.cached(
            AnalysisOperation::EmotionPatterns,
            analyzer,
            student_id,
            emotions,
            window_extras(window_days),
            || analyzer.analyze_emotion_patterns(emotions, window_days),
        )
    }

    pub fn sensory_patterns(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        sensory: &[SensoryEntry],
        window_days: Option<i64>,
    ) -> AnalyticsResult<Arc<Vec<PatternResult>>> {
        self.cached(
            AnalysisOperation::SensoryPatterns,
            analyzer,
            student_id,
            sensory,
            window_extras(window_days),
            || analyzer.analyze_sensory_patterns(sensory, window_days),
        )
    }

    pub fn environmental_correlations(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        entries: &[TrackingEntry],
    ) -> AnalyticsResult<Arc<Vec<EnvironmentalCorrelation>>> {
        self.cached(
            AnalysisOperation::EnvironmentalCorrelations,
            analyzer,
            student_id,
            entries,
            Map::new(),
            || analyzer.analyze_environmental_correlations(entries),
        )
    }

    pub fn correlation_matrix(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        entries: &[TrackingEntry],
    ) -> AnalyticsResult<Arc<CorrelationMatrix>> {
        self.cached(
            AnalysisOperation::CorrelationMatrix,
            analyzer,
            student_id,
            entries,
            Map::new(),
            || analyzer.generate_correlation_matrix(entries),
        )
    }

    pub fn anomalies(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        emotions: &[EmotionEntry],
        sensory: &[SensoryEntry],
        entries: &[TrackingEntry],
    ) -> AnalyticsResult<Arc<Vec<AnomalyDetection>>> {
        self.cached(
            AnalysisOperation::Anomalies,
            analyzer,
            student_id,
            &(emotions, sensory, entries),
            Map::new(),
            || analyzer.detect_anomalies(emotions, sensory, entries),
        )
    }

    pub fn trigger_alerts(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: &str,
        emotions: &[EmotionEntry],
        entries: &[TrackingEntry],
    ) -> AnalyticsResult<Arc<Vec<TriggerAlert>>> {
        let mut extras = Map::new();
        extras.insert("studentId".to_string(), Value::from(student_id));
        self.cached(
            AnalysisOperation::TriggerAlerts,
            analyzer,
            Some(student_id),
            &(emotions, entries),
            extras,
            || analyzer.generate_trigger_alerts(emotions, entries, student_id),
        )
    }

    pub fn confidence_explanation(
        &mut self,
        analyzer: &Analyzer<'_>,
        sample_size: usize,
        time_span_days: f64,
        r_squared: f64,
        confidence: f64,
    ) -> AnalyticsResult<Arc<ConfidenceExplanation>> {
        self.cached(
            AnalysisOperation::ConfidenceExplanation,
            analyzer,
            None,
            &(sample_size, time_span_days, r_squared, confidence),
            Map::new(),
            || analyzer.generate_confidence_explanation(sample_size, time_span_days, r_squared, confidence),
        )
    }

    /// Predictive insights; the predictor's name is part of the key
    pub async fn predictive_insights(
        &mut self,
        analyzer: &Analyzer<'_>,
        student_id: Option<&str>,
        emotions: &[EmotionEntry],
        sensory: &[SensoryEntry],
        entries: &[TrackingEntry],
        predictor: Option<&dyn EmotionPredictor>,
    ) -> AnalyticsResult<Arc<Vec<PredictiveInsight>>> {
        let op = AnalysisOperation::PredictiveInsights;
        let mut extras = Map::new();
        extras.insert(
            "predictor".to_string(),
            predictor.map_or(Value::Null, |p| Value::from(p.name())),
        );
        let key = Self::key_for(op, analyzer.config(), &(emotions, sensory, entries), extras)?;
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        let insights = analyzer
            .generate_predictive_insights(emotions, sensory, entries, predictor)
            .await;
        Ok(self.store(&key, op, student_id, insights))
    }
}

fn window_extras(window_days: Option<i64>) -> Map<String, Value> {
    let mut extras = Map::new();
    extras.insert("windowDays".to_string(), window_days.map_or(Value::Null, Value::from));
    extras
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomConditions;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn make_emotions(count: usize) -> Vec<EmotionEntry> {
        (0..count)
            .map(|i| EmotionEntry {
                id: format!("e{}", i),
                timestamp: now() - ChronoDuration::hours(i as i64 * 6),
                emotion: if i % 2 == 0 { "anxious" } else { "calm" }.to_string(),
                intensity: 2.0 + (i % 3) as f64,
                triggers: vec![],
                student_id: Some("student-1".to_string()),
            })
            .collect()
    }

    fn make_entries(count: usize) -> Vec<TrackingEntry> {
        (0..count)
            .map(|i| {
                let ts = now() - ChronoDuration::days(i as i64 + 1);
                TrackingEntry {
                    id: format!("t{}", i),
                    timestamp: ts,
                    student_id: Some("student-1".to_string()),
                    emotions: make_emotions(1)
                        .into_iter()
                        .map(|mut e| {
                            e.intensity = 1.0 + i as f64 * 0.5;
                            e
                        })
                        .collect(),
                    sensory_inputs: vec![],
                    environmental_data: Some(crate::types::EnvironmentalData {
                        room_conditions: Some(RoomConditions {
                            noise_level: Some(30.0 + i as f64 * 4.0),
                            temperature: None,
                            lighting: None,
                        }),
                        weather: None,
                        classroom_activity: None,
                    }),
                    notes: None,
                }
            })
            .collect()
    }

    fn make_cached(config: &AnalyticsConfiguration) -> CachedAnalysis {
        CachedAnalysis::new(&config.cache)
    }

    #[test]
    fn test_repeat_call_is_served_from_cache() {
        let config = AnalyticsConfiguration::default();
        let analyzer = Analyzer::new(&config, now());
        let mut cached = make_cached(&config);
        let emotions = make_emotions(12);

        let first = cached.emotion_patterns(&analyzer, Some("student-1"), &emotions, Some(30)).unwrap();
        let second = cached.emotion_patterns(&analyzer, Some("student-1"), &emotions, Some(30)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cached.computations(), 1);
        assert_eq!(cached.stats().hits, 1);
    }

    #[test]
    fn test_relevant_config_change_changes_key() {
        let config = AnalyticsConfiguration::default();
        let mut stricter = config.clone();
        stricter.pattern_analysis.correlation_threshold = 0.6;
        let entries = make_entries(8);

        let a = CachedAnalysis::key_for(AnalysisOperation::CorrelationMatrix, &config, &entries, Map::new()).unwrap();
        let b = CachedAnalysis::key_for(AnalysisOperation::CorrelationMatrix, &stricter, &entries, Map::new()).unwrap();
        assert_ne!(a, b);

        let mut cached = make_cached(&config);
        cached.correlation_matrix(&Analyzer::new(&config, now()), None, &entries).unwrap();
        cached.correlation_matrix(&Analyzer::new(&stricter, now()), None, &entries).unwrap();
        assert_eq!(cached.computations(), 2);
    }

    #[test]
    fn test_unrelated_config_change_keeps_key() {
        let config = AnalyticsConfiguration::default();
        let mut edited = config.clone();
        edited.enhanced_analysis.anomaly_threshold = 1.0;
        edited.cache.ttl = 5_000;
        let emotions = make_emotions(6);

        let extras = window_extras(None);
        let a = CachedAnalysis::key_for(AnalysisOperation::EmotionPatterns, &config, &emotions[..], extras.clone()).unwrap();
        let b = CachedAnalysis::key_for(AnalysisOperation::EmotionPatterns, &edited, &emotions[..], extras).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_data_change_misses() {
        let config = AnalyticsConfiguration::default();
        let analyzer = Analyzer::new(&config, now());
        let mut cached = make_cached(&config);
        let mut emotions = make_emotions(6);

        let first = cached.anomalies(&analyzer, None, &emotions, &[], &[]).unwrap();
        emotions[0].intensity = 5.0;
        let second = cached.anomalies(&analyzer, None, &emotions, &[], &[]).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cached.computations(), 2);
    }

    #[test]
    fn test_student_invalidation() {
        let config = AnalyticsConfiguration::default();
        let analyzer = Analyzer::new(&config, now());
        let mut cached = make_cached(&config);
        let emotions = make_emotions(6);
        let entries = make_entries(5);

        cached.emotion_patterns(&analyzer, Some("student-1"), &emotions, None).unwrap();
        cached.correlation_matrix(&analyzer, Some("student-1"), &entries).unwrap();
        cached.correlation_matrix(&analyzer, Some("student-2"), &entries[..3]).unwrap();

        assert_eq!(cached.invalidate_student_cache("student-1"), 2);
        assert_eq!(cached.stats().size, 1);

        cached.emotion_patterns(&analyzer, Some("student-1"), &emotions, None).unwrap();
        assert_eq!(cached.computations(), 4);
        assert_eq!(cached.invalidate_all_cache(), 2);
    }

    #[test]
    fn test_apply_config_propagates_limits() {
        let mut config = AnalyticsConfiguration::default();
        let mut cached = make_cached(&config);
        assert_eq!(cached.ttl(), Duration::from_millis(600_000));

        config.cache.ttl = 5_000;
        config.cache.max_size = 4;
        cached.apply_config(&config).unwrap();
        assert_eq!(cached.ttl(), Duration::from_millis(5_000));
        assert_eq!(cached.max_size(), 4);

        cached.set_ttl_override(2);
        assert_eq!(cached.ttl(), Duration::from_secs(2));
    }

    #[test]
    fn test_apply_config_drops_only_changed_operations() {
        let mut config = AnalyticsConfiguration::default();
        let mut cached = make_cached(&config);
        cached.apply_config(&config).unwrap();

        let entries = make_entries(6);
        let emotions = make_emotions(6);
        {
            let analyzer = Analyzer::new(&config, now());
            cached.correlation_matrix(&analyzer, None, &entries).unwrap();
            cached.anomalies(&analyzer, None, &emotions, &[], &[]).unwrap();
        }

        config.enhanced_analysis.anomaly_threshold = 1.5;
        assert_eq!(cached.apply_config(&config).unwrap(), 1);
        assert_eq!(cached.stats().size, 1);

        // Matrix entry survived and is still served
        let analyzer = Analyzer::new(&config, now());
        cached.correlation_matrix(&analyzer, None, &entries).unwrap();
        assert_eq!(cached.computations(), 2);
    }

    #[test]
    fn test_clear_patterns_and_destroy() {
        let config = AnalyticsConfiguration::default();
        let analyzer = Analyzer::new(&config, now());
        let mut cached = make_cached(&config);
        cached.emotion_patterns(&analyzer, None, &make_emotions(6), None).unwrap();
        cached.confidence_explanation(&analyzer, 10, 20.0, 0.5, 0.5).unwrap();

        assert_eq!(cached.clear_patterns(), 2);
        cached.emotion_patterns(&analyzer, None, &make_emotions(6), None).unwrap();
        let stats = cached.destroy();
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_trigger_alerts_keyed_per_student() {
        let config = AnalyticsConfiguration::default();
        let analyzer = Analyzer::new(&config, now());
        let mut cached = make_cached(&config);
        let emotions = make_emotions(8);

        let first = cached.trigger_alerts(&analyzer, "student-1", &emotions, &[]).unwrap();
        let again = cached.trigger_alerts(&analyzer, "student-1", &emotions, &[]).unwrap();
        cached.trigger_alerts(&analyzer, "student-2", &emotions, &[]).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cached.computations(), 2);
        assert_eq!(cached.invalidate_student_cache("student-2"), 1);
    }

    #[tokio::test]
    async fn test_predictive_insights_cached() {
        let config = AnalyticsConfiguration::default();
        let analyzer = Analyzer::new(&config, now());
        let mut cached = make_cached(&config);
        let emotions = make_emotions(10);

        let first = cached
            .predictive_insights(&analyzer, Some("student-1"), &emotions, &[], &[], None)
            .await
            .unwrap();
        let second = cached
            .predictive_insights(&analyzer, Some("student-1"), &emotions, &[], &[], None)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cached.computations(), 1);
    }
}
