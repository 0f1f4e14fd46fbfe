//! Analytics configuration
//!
//! Every threshold, time window, cache limit and taxonomy list the engine uses
//! lives in [`AnalyticsConfiguration`]. Operations receive a snapshot by
//! reference; nothing in the crate reads a global.
//!
//! Untrusted configuration goes through [`validate_config`], which returns
//! either a fully validated configuration or the documented defaults.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::AnalyticsResult;

/// Configuration schema version
pub const CONFIG_SCHEMA_VERSION: &str = "2.3.0";

/// Smallest TTL the engine will apply
pub const MIN_CACHE_TTL_MS: u64 = 1_000;

/// Longest analysis window accepted, in days
pub const MAX_WINDOW_DAYS: i64 = 3_650;

/// Thresholds for emotion and sensory pattern detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternAnalysisConfig {
    pub min_data_points: usize,
    pub correlation_threshold: f64,
    pub high_intensity_threshold: f64,
    pub concern_frequency_threshold: f64,
    pub emotion_consistency_threshold: f64,
    pub moderate_negative_threshold: f64,
}

/// Data-volume targets used to score trend confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityTargets {
    pub points_target: f64,
    pub time_span_days_target: f64,
}

/// Inputs to the stress-accumulation risk check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentConfig {
    pub stress_intensity_threshold: f64,
    pub stress_emotions: Vec<String>,
}

/// Thresholds for trends, anomalies and predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedAnalysisConfig {
    pub min_sample_size: usize,
    pub trend_threshold: f64,
    pub anomaly_threshold: f64,
    pub prediction_confidence_threshold: f64,
    pub risk_assessment_threshold: f64,
    pub quality_targets: QualityTargets,
    pub risk_assessment: RiskAssessmentConfig,
}

/// Analysis windows in days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowConfig {
    pub default_analysis_days: i64,
    pub recent_data_days: i64,
    pub short_term_days: i64,
    pub long_term_days: i64,
}

/// Alerting sensitivity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    Low,
    Medium,
    High,
}

/// Multipliers applied to pattern and anomaly thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSensitivityConfig {
    pub level: SensitivityLevel,
    pub emotion_intensity_multiplier: f64,
    pub frequency_multiplier: f64,
    pub anomaly_multiplier: f64,
}

/// Cache limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Entry lifetime in milliseconds
    pub ttl: i64,
    /// Maximum number of live entries
    pub max_size: i64,
    pub invalidate_on_config_change: bool,
}

impl CacheConfig {
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_millis(self.ttl.max(MIN_CACHE_TTL_MS as i64) as u64)
    }

    pub fn max_entries(&self) -> usize {
        self.max_size.max(1) as usize
    }
}

/// Minimum-data gates for the background pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsGates {
    pub min_tracking_for_correlation: usize,
    pub min_tracking_for_enhanced: usize,
    pub analysis_period_days: i64,
}

/// Emotion vocabularies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyConfig {
    pub positive_emotions: Vec<String>,
    pub negative_emotions: Vec<String>,
}

impl TaxonomyConfig {
    pub fn is_positive(&self, emotion: &str) -> bool {
        self.positive_emotions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(emotion))
    }

    pub fn is_negative(&self, emotion: &str) -> bool {
        self.negative_emotions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(emotion))
    }
}

/// Confidence bands for insight explanations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightConfig {
    pub high_confidence_pattern_threshold: f64,
}

/// Complete analytics configuration snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfiguration {
    pub schema_version: String,
    pub pattern_analysis: PatternAnalysisConfig,
    pub enhanced_analysis: EnhancedAnalysisConfig,
    pub time_windows: TimeWindowConfig,
    pub alert_sensitivity: AlertSensitivityConfig,
    pub cache: CacheConfig,
    pub analytics: AnalyticsGates,
    pub taxonomy: TaxonomyConfig,
    pub insights: InsightConfig,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AnalyticsConfiguration {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            pattern_analysis: PatternAnalysisConfig {
                min_data_points: 3,
                correlation_threshold: 0.25,
                high_intensity_threshold: 4.0,
                concern_frequency_threshold: 0.3,
                emotion_consistency_threshold: 0.4,
                moderate_negative_threshold: 0.4,
            },
            enhanced_analysis: EnhancedAnalysisConfig {
                min_sample_size: 5,
                trend_threshold: 0.02,
                anomaly_threshold: 2.5,
                prediction_confidence_threshold: 0.6,
                risk_assessment_threshold: 3.0,
                quality_targets: QualityTargets {
                    points_target: 30.0,
                    time_span_days_target: 21.0,
                },
                risk_assessment: RiskAssessmentConfig {
                    stress_intensity_threshold: 4.0,
                    stress_emotions: strings(&["anxious", "frustrated", "overwhelmed", "angry"]),
                },
            },
            time_windows: TimeWindowConfig {
                default_analysis_days: 30,
                recent_data_days: 7,
                short_term_days: 14,
                long_term_days: 90,
            },
            alert_sensitivity: AlertSensitivityConfig {
                level: SensitivityLevel::Medium,
                emotion_intensity_multiplier: 1.0,
                frequency_multiplier: 1.0,
                anomaly_multiplier: 1.0,
            },
            cache: CacheConfig {
                ttl: 600_000,
                max_size: 50,
                invalidate_on_config_change: true,
            },
            analytics: AnalyticsGates {
                min_tracking_for_correlation: 3,
                min_tracking_for_enhanced: 2,
                analysis_period_days: 30,
            },
            taxonomy: TaxonomyConfig {
                positive_emotions: strings(&[
                    "happy", "calm", "excited", "content", "peaceful", "cheerful", "relaxed",
                    "optimistic",
                ]),
                negative_emotions: strings(&["anxious", "frustrated", "angry", "overwhelmed", "sad"]),
            },
            insights: InsightConfig {
                high_confidence_pattern_threshold: 0.6,
            },
        }
    }
}

/// Named starting points for the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPreset {
    Conservative,
    Balanced,
    Sensitive,
}

impl ConfigPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigPreset::Conservative => "conservative",
            ConfigPreset::Balanced => "balanced",
            ConfigPreset::Sensitive => "sensitive",
        }
    }

    pub fn all() -> [ConfigPreset; 3] {
        [
            ConfigPreset::Conservative,
            ConfigPreset::Balanced,
            ConfigPreset::Sensitive,
        ]
    }

    /// Build the configuration for this preset
    pub fn config(&self) -> AnalyticsConfiguration {
        let mut config = AnalyticsConfiguration::default();
        match self {
            ConfigPreset::Balanced => {}
            ConfigPreset::Conservative => {
                config.pattern_analysis.min_data_points = 5;
                config.pattern_analysis.correlation_threshold = 0.4;
                config.pattern_analysis.concern_frequency_threshold = 0.4;
                config.enhanced_analysis.anomaly_threshold = 3.0;
                config.enhanced_analysis.min_sample_size = 8;
                config.alert_sensitivity = AlertSensitivityConfig {
                    level: SensitivityLevel::Low,
                    emotion_intensity_multiplier: 0.8,
                    frequency_multiplier: 0.8,
                    anomaly_multiplier: 0.8,
                };
            }
            ConfigPreset::Sensitive => {
                config.pattern_analysis.min_data_points = 2;
                config.pattern_analysis.correlation_threshold = 0.15;
                config.pattern_analysis.concern_frequency_threshold = 0.2;
                config.enhanced_analysis.anomaly_threshold = 2.0;
                config.enhanced_analysis.min_sample_size = 3;
                config.alert_sensitivity = AlertSensitivityConfig {
                    level: SensitivityLevel::High,
                    emotion_intensity_multiplier: 1.2,
                    frequency_multiplier: 1.2,
                    anomaly_multiplier: 1.2,
                };
            }
        }
        config
    }
}

/// Operations whose results are cached, each keyed on its own config subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisOperation {
    EmotionPatterns,
    SensoryPatterns,
    EnvironmentalCorrelations,
    CorrelationMatrix,
    Anomalies,
    PredictiveInsights,
    TriggerAlerts,
    ConfidenceExplanation,
}

impl AnalysisOperation {
    pub fn all() -> [AnalysisOperation; 8] {
        [
            AnalysisOperation::EmotionPatterns,
            AnalysisOperation::SensoryPatterns,
            AnalysisOperation::EnvironmentalCorrelations,
            AnalysisOperation::CorrelationMatrix,
            AnalysisOperation::Anomalies,
            AnalysisOperation::PredictiveInsights,
            AnalysisOperation::TriggerAlerts,
            AnalysisOperation::ConfidenceExplanation,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisOperation::EmotionPatterns => "emotion-patterns",
            AnalysisOperation::SensoryPatterns => "sensory-patterns",
            AnalysisOperation::EnvironmentalCorrelations => "environmental-correlations",
            AnalysisOperation::CorrelationMatrix => "correlation-matrix",
            AnalysisOperation::Anomalies => "anomalies",
            AnalysisOperation::PredictiveInsights => "predictive-insights",
            AnalysisOperation::TriggerAlerts => "trigger-alerts",
            AnalysisOperation::ConfidenceExplanation => "confidence-explanation",
        }
    }
}

/// Result of validating an untrusted configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedConfig {
    pub config: AnalyticsConfiguration,
    pub meta: ValidationMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMeta {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl AnalyticsConfiguration {
    /// The configuration subset that determines the result of `op`.
    ///
    /// Only these fields feed the cache key, so editing an unrelated group
    /// leaves other operations' cache entries valid.
    pub fn relevant_subset(&self, op: AnalysisOperation) -> Value {
        let pa = &self.pattern_analysis;
        let ea = &self.enhanced_analysis;
        match op {
            AnalysisOperation::EmotionPatterns | AnalysisOperation::SensoryPatterns => json!({
                "patternAnalysis": pa,
                "alertSensitivity": {
                    "emotionIntensityMultiplier": self.alert_sensitivity.emotion_intensity_multiplier,
                    "frequencyMultiplier": self.alert_sensitivity.frequency_multiplier,
                },
                "taxonomy": self.taxonomy,
                "defaultAnalysisDays": self.time_windows.default_analysis_days,
            }),
            AnalysisOperation::EnvironmentalCorrelations => json!({
                "minDataPoints": pa.min_data_points,
                "correlationThreshold": pa.correlation_threshold,
                "concernFrequencyThreshold": pa.concern_frequency_threshold,
                "taxonomy": self.taxonomy,
            }),
            AnalysisOperation::CorrelationMatrix => json!({
                "correlationThreshold": pa.correlation_threshold,
                "minSampleSize": ea.min_sample_size,
                "positiveEmotions": self.taxonomy.positive_emotions,
            }),
            AnalysisOperation::Anomalies => json!({
                "anomalyThreshold": ea.anomaly_threshold,
                "anomalyMultiplier": self.alert_sensitivity.anomaly_multiplier,
                "minSampleSize": ea.min_sample_size,
            }),
            AnalysisOperation::PredictiveInsights => json!({
                "enhancedAnalysis": ea,
                "highIntensityThreshold": pa.high_intensity_threshold,
                "correlationThreshold": pa.correlation_threshold,
                "timeWindows": self.time_windows,
                "insights": self.insights,
                "positiveEmotions": self.taxonomy.positive_emotions,
            }),
            AnalysisOperation::TriggerAlerts => json!({
                "patternAnalysis": pa,
                "emotionIntensityMultiplier": self.alert_sensitivity.emotion_intensity_multiplier,
                "recentDataDays": self.time_windows.recent_data_days,
                "taxonomy": self.taxonomy,
                "stressEmotions": ea.risk_assessment.stress_emotions,
            }),
            AnalysisOperation::ConfidenceExplanation => json!({
                "minSampleSize": ea.min_sample_size,
                "shortTermDays": self.time_windows.short_term_days,
                "defaultAnalysisDays": self.time_windows.default_analysis_days,
                "correlationThreshold": pa.correlation_threshold,
                "insights": self.insights,
            }),
        }
    }

    /// Clamp out-of-range values into their documented bounds.
    ///
    /// Non-finite numbers fall back to the default for that field.
    pub fn sanitized(mut self) -> Self {
        let defaults = AnalyticsConfiguration::default();

        let pa = &mut self.pattern_analysis;
        let dpa = &defaults.pattern_analysis;
        clamp_ratio(&mut pa.correlation_threshold, dpa.correlation_threshold, "patternAnalysis.correlationThreshold");
        clamp_ratio(&mut pa.concern_frequency_threshold, dpa.concern_frequency_threshold, "patternAnalysis.concernFrequencyThreshold");
        clamp_ratio(&mut pa.emotion_consistency_threshold, dpa.emotion_consistency_threshold, "patternAnalysis.emotionConsistencyThreshold");
        clamp_ratio(&mut pa.moderate_negative_threshold, dpa.moderate_negative_threshold, "patternAnalysis.moderateNegativeThreshold");
        clamp_range(&mut pa.high_intensity_threshold, 1.0, 5.0, dpa.high_intensity_threshold, "patternAnalysis.highIntensityThreshold");
        if pa.min_data_points == 0 {
            warn!(field = "patternAnalysis.minDataPoints", "clamped to 1");
            pa.min_data_points = 1;
        }

        let ea = &mut self.enhanced_analysis;
        let dea = &defaults.enhanced_analysis;
        clamp_ratio(&mut ea.prediction_confidence_threshold, dea.prediction_confidence_threshold, "enhancedAnalysis.predictionConfidenceThreshold");
        clamp_range(&mut ea.trend_threshold, 0.0, f64::MAX, dea.trend_threshold, "enhancedAnalysis.trendThreshold");
        clamp_range(&mut ea.anomaly_threshold, 0.0, f64::MAX, dea.anomaly_threshold, "enhancedAnalysis.anomalyThreshold");
        clamp_range(&mut ea.risk_assessment_threshold, 1.0, f64::MAX, dea.risk_assessment_threshold, "enhancedAnalysis.riskAssessmentThreshold");
        clamp_range(&mut ea.quality_targets.points_target, 1.0, f64::MAX, dea.quality_targets.points_target, "enhancedAnalysis.qualityTargets.pointsTarget");
        clamp_range(&mut ea.quality_targets.time_span_days_target, 1.0, f64::MAX, dea.quality_targets.time_span_days_target, "enhancedAnalysis.qualityTargets.timeSpanDaysTarget");
        clamp_range(&mut ea.risk_assessment.stress_intensity_threshold, 1.0, 5.0, dea.risk_assessment.stress_intensity_threshold, "enhancedAnalysis.riskAssessment.stressIntensityThreshold");
        if ea.min_sample_size < 2 {
            warn!(field = "enhancedAnalysis.minSampleSize", value = ea.min_sample_size, "clamped to 2");
            ea.min_sample_size = 2;
        }

        let sens = &mut self.alert_sensitivity;
        clamp_multiplier(&mut sens.emotion_intensity_multiplier, "alertSensitivity.emotionIntensityMultiplier");
        clamp_multiplier(&mut sens.frequency_multiplier, "alertSensitivity.frequencyMultiplier");
        clamp_multiplier(&mut sens.anomaly_multiplier, "alertSensitivity.anomalyMultiplier");

        let tw = &mut self.time_windows;
        for (value, name) in [
            (&mut tw.default_analysis_days, "timeWindows.defaultAnalysisDays"),
            (&mut tw.recent_data_days, "timeWindows.recentDataDays"),
            (&mut tw.short_term_days, "timeWindows.shortTermDays"),
            (&mut tw.long_term_days, "timeWindows.longTermDays"),
        ] {
            if !(1..=MAX_WINDOW_DAYS).contains(&*value) {
                let clamped = (*value).clamp(1, MAX_WINDOW_DAYS);
                warn!(field = name, value = *value, clamped, "window out of range");
                *value = clamped;
            }
        }

        if self.cache.ttl < MIN_CACHE_TTL_MS as i64 {
            warn!(field = "cache.ttl", value = self.cache.ttl, "reset to default");
            self.cache.ttl = defaults.cache.ttl;
        }
        if self.cache.max_size < 1 {
            warn!(field = "cache.maxSize", value = self.cache.max_size, "clamped to 1");
            self.cache.max_size = 1;
        }

        clamp_ratio(&mut self.insights.high_confidence_pattern_threshold, defaults.insights.high_confidence_pattern_threshold, "insights.highConfidencePatternThreshold");

        self
    }

    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        let pa = &self.pattern_analysis;
        let ea = &self.enhanced_analysis;
        let sens = &self.alert_sensitivity;
        vec![
            ("patternAnalysis.correlationThreshold", pa.correlation_threshold),
            ("patternAnalysis.highIntensityThreshold", pa.high_intensity_threshold),
            ("patternAnalysis.concernFrequencyThreshold", pa.concern_frequency_threshold),
            ("patternAnalysis.emotionConsistencyThreshold", pa.emotion_consistency_threshold),
            ("patternAnalysis.moderateNegativeThreshold", pa.moderate_negative_threshold),
            ("enhancedAnalysis.trendThreshold", ea.trend_threshold),
            ("enhancedAnalysis.anomalyThreshold", ea.anomaly_threshold),
            ("enhancedAnalysis.predictionConfidenceThreshold", ea.prediction_confidence_threshold),
            ("enhancedAnalysis.riskAssessmentThreshold", ea.risk_assessment_threshold),
            ("alertSensitivity.emotionIntensityMultiplier", sens.emotion_intensity_multiplier),
            ("alertSensitivity.frequencyMultiplier", sens.frequency_multiplier),
            ("alertSensitivity.anomalyMultiplier", sens.anomaly_multiplier),
            ("insights.highConfidencePatternThreshold", self.insights.high_confidence_pattern_threshold),
        ]
    }
}

fn clamp_ratio(value: &mut f64, default: f64, field: &str) {
    clamp_range(value, 0.0, 1.0, default, field);
}

fn clamp_range(value: &mut f64, min: f64, max: f64, default: f64, field: &str) {
    if !value.is_finite() {
        warn!(field, "non-finite value reset to default");
        *value = default;
    } else if *value < min || *value > max {
        let clamped = value.clamp(min, max);
        warn!(field, value = *value, clamped, "value out of range");
        *value = clamped;
    }
}

fn clamp_multiplier(value: &mut f64, field: &str) {
    if !value.is_finite() || *value <= 0.0 {
        warn!(field, value = *value, "multiplier reset to 1.0");
        *value = 1.0;
    }
}

/// Validate an untrusted configuration value.
///
/// Returns the parsed and clamped configuration when the shape is valid. Any
/// shape error or non-finite threshold yields the defaults instead, never a
/// mix of the two.
pub fn validate_config(value: &Value) -> ValidatedConfig {
    let invalid = |reason: String| {
        warn!(%reason, "configuration rejected, using defaults");
        ValidatedConfig {
            config: AnalyticsConfiguration::default(),
            meta: ValidationMeta {
                is_valid: false,
                errors: vec!["invalid-shape-or-values".to_string(), reason],
            },
        }
    };

    let config: AnalyticsConfiguration = match serde_json::from_value(value.clone()) {
        Ok(config) => config,
        Err(e) => return invalid(e.to_string()),
    };

    if let Some((field, _)) = config
        .numeric_fields()
        .into_iter()
        .find(|(_, v)| !v.is_finite())
    {
        return invalid(format!("{} is not finite", field));
    }

    ValidatedConfig {
        config: config.sanitized(),
        meta: ValidationMeta {
            is_valid: true,
            errors: Vec::new(),
        },
    }
}

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; scalars and arrays replace.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Apply a partial JSON patch over a configuration and validate the result
pub fn merge_config(base: &AnalyticsConfiguration, patch: &Value) -> ValidatedConfig {
    let mut merged = match serde_json::to_value(base) {
        Ok(value) => value,
        Err(_) => Value::Object(Map::new()),
    };
    deep_merge(&mut merged, patch);
    validate_config(&merged)
}

/// Holder of the live configuration.
///
/// Readers take copies; updates replace the snapshot and notify subscribers.
pub struct ConfigStore {
    current: RwLock<AnalyticsConfiguration>,
    notifier: watch::Sender<AnalyticsConfiguration>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(AnalyticsConfiguration::default())
    }
}

impl ConfigStore {
    pub fn new(config: AnalyticsConfiguration) -> Self {
        let (notifier, _) = watch::channel(config.clone());
        Self {
            current: RwLock::new(config),
            notifier,
        }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> AnalyticsConfiguration {
        self.current.read().clone()
    }

    /// Receive every future configuration update
    pub fn subscribe(&self) -> watch::Receiver<AnalyticsConfiguration> {
        self.notifier.subscribe()
    }

    /// Merge a partial update into the current configuration
    pub fn update(&self, patch: &Value) -> ValidatedConfig {
        let validated = merge_config(&self.snapshot(), patch);
        if validated.meta.is_valid {
            self.replace(validated.config.clone());
        }
        validated
    }

    pub fn set_preset(&self, preset: ConfigPreset) {
        debug!(preset = preset.as_str(), "applying configuration preset");
        self.replace(preset.config());
    }

    pub fn reset_to_defaults(&self) {
        self.replace(AnalyticsConfiguration::default());
    }

    /// Replace the configuration from a full JSON document
    pub fn import_json(&self, json: &str) -> AnalyticsResult<ValidatedConfig> {
        let value: Value = serde_json::from_str(json)?;
        let validated = validate_config(&value);
        if validated.meta.is_valid {
            self.replace(validated.config.clone());
        }
        Ok(validated)
    }

    pub fn export_json(&self) -> AnalyticsResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    fn replace(&self, config: AnalyticsConfiguration) {
        *self.current.write() = config.clone();
        self.notifier.send_replace(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AnalyticsConfiguration::default();
        assert_eq!(config.pattern_analysis.min_data_points, 3);
        assert_eq!(config.pattern_analysis.correlation_threshold, 0.25);
        assert_eq!(config.enhanced_analysis.anomaly_threshold, 2.5);
        assert_eq!(config.cache.ttl, 600_000);
        assert_eq!(config.cache.max_entries(), 50);
        assert_eq!(config.analytics.min_tracking_for_correlation, 3);
        assert!(config.taxonomy.is_positive("Calm"));
        assert!(config.taxonomy.is_negative("anxious"));
    }

    #[test]
    fn test_presets_differ_from_balanced() {
        let conservative = ConfigPreset::Conservative.config();
        let sensitive = ConfigPreset::Sensitive.config();
        let balanced = ConfigPreset::Balanced.config();

        assert_eq!(balanced, AnalyticsConfiguration::default());
        assert!(conservative.pattern_analysis.correlation_threshold > balanced.pattern_analysis.correlation_threshold);
        assert!(sensitive.pattern_analysis.correlation_threshold < balanced.pattern_analysis.correlation_threshold);
        assert_eq!(sensitive.alert_sensitivity.level, SensitivityLevel::High);
    }

    #[test]
    fn test_validate_roundtrip_is_valid() {
        let value = serde_json::to_value(AnalyticsConfiguration::default()).unwrap();
        let validated = validate_config(&value);
        assert!(validated.meta.is_valid);
        assert_eq!(validated.config, AnalyticsConfiguration::default());
    }

    #[test]
    fn test_validate_bad_shape_yields_defaults() {
        let mut value = serde_json::to_value(ConfigPreset::Sensitive.config()).unwrap();
        value["patternAnalysis"]["correlationThreshold"] = json!("high");

        let validated = validate_config(&value);
        assert!(!validated.meta.is_valid);
        assert_eq!(validated.meta.errors[0], "invalid-shape-or-values");
        // No hybrid: the sensitive values are not partially kept
        assert_eq!(validated.config, AnalyticsConfiguration::default());
    }

    #[test]
    fn test_validate_clamps_out_of_range() {
        let mut value = serde_json::to_value(AnalyticsConfiguration::default()).unwrap();
        value["cache"]["ttl"] = json!(-5);
        value["cache"]["maxSize"] = json!(0);
        value["patternAnalysis"]["correlationThreshold"] = json!(1.7);
        value["alertSensitivity"]["anomalyMultiplier"] = json!(0.0);

        let validated = validate_config(&value);
        assert!(validated.meta.is_valid);
        assert_eq!(validated.config.cache.ttl, 600_000);
        assert_eq!(validated.config.cache.max_size, 1);
        assert_eq!(validated.config.pattern_analysis.correlation_threshold, 1.0);
        assert_eq!(validated.config.alert_sensitivity.anomaly_multiplier, 1.0);
    }

    #[test]
    fn test_validate_clamps_time_windows() {
        let mut value = serde_json::to_value(AnalyticsConfiguration::default()).unwrap();
        value["timeWindows"]["defaultAnalysisDays"] = json!(1_000_000_000i64);
        value["timeWindows"]["shortTermDays"] = json!(-3);

        let validated = validate_config(&value);
        assert!(validated.meta.is_valid);
        assert_eq!(validated.config.time_windows.default_analysis_days, MAX_WINDOW_DAYS);
        assert_eq!(validated.config.time_windows.short_term_days, 1);
        assert_eq!(validated.config.time_windows.recent_data_days, 7);

        let merged = merge_config(
            &AnalyticsConfiguration::default(),
            &json!({"timeWindows": {"longTermDays": i64::MAX}}),
        );
        assert_eq!(merged.config.time_windows.long_term_days, MAX_WINDOW_DAYS);
    }

    #[test]
    fn test_merge_partial_patch() {
        let base = AnalyticsConfiguration::default();
        let validated = merge_config(
            &base,
            &json!({"patternAnalysis": {"correlationThreshold": 0.6}, "cache": {"ttl": 5000}}),
        );
        assert!(validated.meta.is_valid);
        assert_eq!(validated.config.pattern_analysis.correlation_threshold, 0.6);
        assert_eq!(validated.config.pattern_analysis.min_data_points, 3);
        assert_eq!(validated.config.cache.ttl, 5000);
    }

    #[test]
    fn test_relevant_subset_isolation() {
        let base = AnalyticsConfiguration::default();
        let mut changed = base.clone();
        changed.enhanced_analysis.anomaly_threshold = 1.0;

        assert_eq!(
            base.relevant_subset(AnalysisOperation::EmotionPatterns),
            changed.relevant_subset(AnalysisOperation::EmotionPatterns)
        );
        assert_ne!(
            base.relevant_subset(AnalysisOperation::Anomalies),
            changed.relevant_subset(AnalysisOperation::Anomalies)
        );
    }

    #[test]
    fn test_store_update_notifies() {
        let store = ConfigStore::default();
        let mut rx = store.subscribe();

        let validated = store.update(&json!({"cache": {"maxSize": 10}}));
        assert!(validated.meta.is_valid);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().cache.max_size, 10);
        assert_eq!(store.snapshot().cache.max_size, 10);

        store.set_preset(ConfigPreset::Conservative);
        assert_eq!(store.snapshot().pattern_analysis.min_data_points, 5);

        store.reset_to_defaults();
        assert_eq!(store.snapshot(), AnalyticsConfiguration::default());
    }

    #[test]
    fn test_store_import_export() {
        let store = ConfigStore::new(ConfigPreset::Sensitive.config());
        let exported = store.export_json().unwrap();

        let other = ConfigStore::default();
        let validated = other.import_json(&exported).unwrap();
        assert!(validated.meta.is_valid);
        assert_eq!(other.snapshot(), ConfigPreset::Sensitive.config());
        assert!(other.import_json("{not json").is_err());
    }
}
