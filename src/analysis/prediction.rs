//! Predictive insights
//!
//! Statistical forecasts come from [`Analyzer::analyze_trend`]. An optional
//! [`EmotionPredictor`] adds a model-based forecast; any failure on that path
//! is logged and the heuristic insights are returned on their own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Analyzer;
use crate::error::AnalyticsResult;
use crate::stats::mean;
use crate::types::{
    ConfidenceExplanation, EmotionEntry, InsightKind, InsightSource, Prediction, PredictiveInsight, SensoryEntry,
    SensoryResponse, Severity, TrackingEntry, TrendAnalysis, TrendDirection,
};
use crate::window::{days_before, time_span_days};

/// Tracking sessions required before the model collaborator is consulted
pub const ML_MIN_TRACKING_ENTRIES: usize = 7;

/// Sessions of history handed to the model
const ML_HISTORY_ENTRIES: usize = 14;

/// Days the model is asked to forecast
const ML_HORIZON_DAYS: usize = 7;

/// r² bands for trend severity
const TREND_SEVERITY_HIGH: f64 = 0.7;
const TREND_SEVERITY_MEDIUM: f64 = 0.5;

/// One forecast day: predicted intensity per emotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionForecast {
    pub emotions: BTreeMap<String, f64>,
    pub confidence: f64,
}

impl EmotionForecast {
    fn mean_intensity(&self) -> Option<f64> {
        let values: Vec<f64> = self.emotions.values().copied().collect();
        mean(&values)
    }
}

/// Model collaborator producing per-day emotion forecasts
#[async_trait]
pub trait EmotionPredictor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Forecast `horizon_days` days from the given session history
    async fn predict_emotions(
        &self,
        history: &[TrackingEntry],
        horizon_days: usize,
    ) -> AnalyticsResult<Vec<EmotionForecast>>;
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn emotion_trend_recommendations(trend: &TrendAnalysis) -> Vec<String> {
    match trend.direction {
        TrendDirection::Decreasing => to_strings(&[
            "Increase positive reinforcement strategies",
            "Review environmental factors that may be contributing to stress",
            "Consider additional sensory support tools",
            "Schedule more frequent check-ins",
        ]),
        TrendDirection::Increasing => to_strings(&[
            "Continue current successful strategies",
            "Document what is working well",
            "Gradually introduce new challenges",
            "Share progress with student and family",
        ]),
        TrendDirection::Stable => to_strings(&[
            "Monitor for changes in patterns",
            "Maintain current support level",
            "Be prepared to adjust strategies as needed",
        ]),
    }
}

fn sensory_trend_recommendations(trend: &TrendAnalysis) -> Vec<String> {
    if trend.rate > 0.0 {
        to_strings(&[
            "Provide more structured sensory breaks",
            "Introduce additional sensory tools",
            "Consider sensory diet adjustments",
            "Monitor for overstimulation",
        ])
    } else if trend.rate < 0.0 {
        to_strings(&[
            "Reduce environmental stimuli",
            "Provide more quiet spaces",
            "Gradually reintroduce sensory experiences",
            "Focus on calming strategies",
        ])
    } else {
        to_strings(&[
            "Maintain current sensory support level",
            "Continue monitoring sensory preferences",
            "Be responsive to daily variations",
        ])
    }
}

/// Only a well-fit decline is treated as severe
fn trend_severity(trend: &TrendAnalysis) -> Severity {
    match trend.direction {
        TrendDirection::Decreasing if trend.significance >= TREND_SEVERITY_HIGH => Severity::High,
        TrendDirection::Decreasing if trend.significance >= TREND_SEVERITY_MEDIUM => Severity::Medium,
        _ => Severity::Low,
    }
}

fn sensory_value(response: SensoryResponse) -> f64 {
    match response {
        SensoryResponse::Seeking => 1.0,
        SensoryResponse::Avoiding => -1.0,
        SensoryResponse::Neutral => 0.0,
    }
}

impl Analyzer<'_> {
    /// Forecasts and risk statements for a student's recent data.
    ///
    /// Emits, in order: the statistical emotion forecast, the model forecast
    /// (when `predictor` is present and there are at least
    /// [`ML_MIN_TRACKING_ENTRIES`] sessions), the statistical sensory forecast,
    /// and the stress accumulation risk.
    pub async fn generate_predictive_insights(
        &self,
        emotions: &[EmotionEntry],
        sensory: &[SensoryEntry],
        entries: &[TrackingEntry],
        predictor: Option<&dyn EmotionPredictor>,
    ) -> Vec<PredictiveInsight> {
        let mut insights = Vec::new();

        let emotion_points: Vec<(DateTime<Utc>, f64)> =
            emotions.iter().map(|e| (e.timestamp, e.intensity)).collect();
        if let Some(trend) = self.confident_trend(&emotion_points) {
            insights.push(PredictiveInsight {
                kind: InsightKind::Prediction,
                title: "Emotional Well-being Forecast (Statistical)".to_string(),
                description: format!(
                    "Based on current trends, emotional intensity is {}",
                    trend.direction.as_str()
                ),
                confidence: trend.significance,
                severity: Some(trend_severity(&trend)),
                prediction: Prediction {
                    trend: trend.direction,
                    accuracy: Some(trend.confidence),
                    predicted_value: Some(trend.forecast.next7_days),
                    timeframe: "7-day forecast".to_string(),
                },
                recommendations: emotion_trend_recommendations(&trend),
                source: InsightSource::Heuristic,
                explanation: Some(self.explain_trend(&emotion_points, &trend)),
            });
        }

        if let Some(predictor) = predictor {
            if entries.len() >= ML_MIN_TRACKING_ENTRIES {
                if let Some(insight) = self.model_insight(predictor, emotions, entries).await {
                    insights.push(insight);
                }
            } else {
                debug!(
                    predictor = predictor.name(),
                    entries = entries.len(),
                    "Not enough sessions for model forecast"
                );
            }
        }

        let sensory_points: Vec<(DateTime<Utc>, f64)> = sensory
            .iter()
            .map(|s| (s.timestamp, sensory_value(s.response)))
            .collect();
        if let Some(trend) = self.confident_trend(&sensory_points) {
            insights.push(PredictiveInsight {
                kind: InsightKind::Prediction,
                title: "Sensory Regulation Forecast (Statistical)".to_string(),
                description: format!(
                    "Sensory seeking/avoiding patterns show {} trend",
                    trend.direction.as_str()
                ),
                confidence: trend.significance,
                severity: Some(trend_severity(&trend)),
                prediction: Prediction {
                    trend: trend.direction,
                    accuracy: Some(trend.confidence),
                    predicted_value: Some(trend.forecast.next7_days),
                    timeframe: "14-day forecast".to_string(),
                },
                recommendations: sensory_trend_recommendations(&trend),
                source: InsightSource::Heuristic,
                explanation: Some(self.explain_trend(&sensory_points, &trend)),
            });
        }

        insights.extend(self.assess_risks(emotions));
        insights
    }

    /// Trend whose fit meets `predictionConfidenceThreshold`
    fn confident_trend(&self, points: &[(DateTime<Utc>, f64)]) -> Option<TrendAnalysis> {
        let threshold = self.config.enhanced_analysis.prediction_confidence_threshold;
        self.analyze_trend(points)
            .filter(|trend| trend.significance >= threshold)
    }

    fn explain_trend(
        &self,
        points: &[(DateTime<Utc>, f64)],
        trend: &TrendAnalysis,
    ) -> ConfidenceExplanation {
        let span = time_span_days(points.iter().map(|(ts, _)| *ts)).floor();
        self.generate_confidence_explanation(points.len(), span, trend.significance, trend.confidence)
    }

    async fn model_insight(
        &self,
        predictor: &dyn EmotionPredictor,
        emotions: &[EmotionEntry],
        entries: &[TrackingEntry],
    ) -> Option<PredictiveInsight> {
        let history = &entries[entries.len().saturating_sub(ML_HISTORY_ENTRIES)..];
        let forecasts = match predictor.predict_emotions(history, ML_HORIZON_DAYS).await {
            Ok(forecasts) => forecasts,
            Err(err) => {
                warn!(predictor = predictor.name(), error = %err, "Model forecast failed, using heuristics");
                return None;
            }
        };

        let daily: Vec<f64> = forecasts
            .iter()
            .filter_map(EmotionForecast::mean_intensity)
            .filter(|v| v.is_finite())
            .collect();
        let Some(predicted) = mean(&daily) else {
            debug!(predictor = predictor.name(), "Model returned no usable forecast");
            return None;
        };

        let recent: Vec<f64> = emotions[emotions.len().saturating_sub(7)..]
            .iter()
            .map(|e| e.intensity)
            .collect();
        let current = mean(&recent).unwrap_or(0.0);

        let trend_threshold = self.config.enhanced_analysis.trend_threshold;
        let trend = if predicted >= current * (1.0 + trend_threshold) {
            TrendDirection::Increasing
        } else if predicted <= current * (1.0 - trend_threshold) {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let high = self.config.pattern_analysis.high_intensity_threshold;
        let severity = if predicted >= high {
            Severity::High
        } else if predicted > (high - 2.0).max(1.0) {
            Severity::Medium
        } else {
            Severity::Low
        };

        let confidence = forecasts.first().map(|f| f.confidence).unwrap_or(0.0);
        Some(PredictiveInsight {
            kind: InsightKind::Prediction,
            title: "Emotional Well-being Forecast (ML)".to_string(),
            description: format!(
                "Machine learning predicts emotional patterns will be {}",
                trend.as_str()
            ),
            confidence,
            severity: Some(severity),
            prediction: Prediction {
                trend,
                accuracy: Some(confidence),
                predicted_value: Some(predicted),
                timeframe: "7-day forecast".to_string(),
            },
            recommendations: self.model_recommendations(&forecasts, trend),
            source: InsightSource::Ml,
            explanation: None,
        })
    }

    fn model_recommendations(&self, forecasts: &[EmotionForecast], trend: TrendDirection) -> Vec<String> {
        let high = self.config.pattern_analysis.high_intensity_threshold;
        let low = (high - 2.0).max(1.0);
        let taxonomy = &self.config.taxonomy;

        let anxious_days = forecasts
            .iter()
            .filter(|f| f.emotions.get("anxious").is_some_and(|v| *v >= high))
            .count();
        let low_positive_days = forecasts
            .iter()
            .filter(|f| {
                let positive: Vec<f64> = f
                    .emotions
                    .iter()
                    .filter(|(emotion, _)| taxonomy.is_positive(emotion))
                    .map(|(_, v)| *v)
                    .collect();
                mean(&positive).is_some_and(|avg| avg < low)
            })
            .count();

        let mut recommendations = Vec::new();
        if anxious_days >= 3 {
            recommendations.push("ML predicts elevated anxiety - implement proactive calming strategies".to_string());
            recommendations.push("Schedule additional check-ins on high-anxiety days".to_string());
        }
        if low_positive_days >= 4 {
            recommendations.push(
                "ML indicates low positive emotions upcoming - increase engagement activities".to_string(),
            );
            recommendations.push("Prepare mood-boosting interventions".to_string());
        }
        match trend {
            TrendDirection::Increasing => recommendations
                .push("ML shows increasing emotional intensity - monitor for triggers".to_string()),
            TrendDirection::Decreasing => recommendations
                .push("ML shows decreasing emotional engagement - check for withdrawal signs".to_string()),
            TrendDirection::Stable => {}
        }
        recommendations.push("Compare ML predictions with actual outcomes to refine models".to_string());
        recommendations
    }

    /// Stress accumulation over the short-term window
    fn assess_risks(&self, emotions: &[EmotionEntry]) -> Vec<PredictiveInsight> {
        let ea = &self.config.enhanced_analysis;
        let short_term = self.config.time_windows.short_term_days;
        let cutoff = days_before(self.now, short_term);
        let risk = &ea.risk_assessment;

        let incidents = emotions
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .filter(|e| e.intensity >= risk.stress_intensity_threshold)
            .filter(|e| risk.stress_emotions.iter().any(|s| s.eq_ignore_ascii_case(&e.emotion)))
            .count();

        let required = (ea.risk_assessment_threshold.floor() as usize).max(1);
        if incidents < required {
            return Vec::new();
        }

        vec![PredictiveInsight {
            kind: InsightKind::Risk,
            title: "Stress Accumulation Risk".to_string(),
            description: format!("{} high-stress incidents in the past {} days", incidents, short_term),
            confidence: 0.8,
            severity: Some(Severity::High),
            prediction: Prediction {
                trend: TrendDirection::Increasing,
                accuracy: None,
                predicted_value: None,
                timeframe: "Immediate attention needed".to_string(),
            },
            recommendations: to_strings(&[
                "Implement immediate stress reduction strategies",
                "Review and adjust current interventions",
                "Consider environmental modifications",
                "Schedule additional support sessions",
            ]),
            source: InsightSource::Heuristic,
            explanation: None,
        }]
    }
}
