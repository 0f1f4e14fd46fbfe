//! Short human-readable insight lines

use crate::config::AnalyticsConfiguration;
use crate::types::{AnalyticsInputs, AnalyticsResults, Significance};

const MAX_PATTERNS_TO_SHOW: usize = 3;
const MAX_CORRELATIONS_TO_SHOW: usize = 3;
const MAX_PREDICTIONS_TO_SHOW: usize = 2;
const RECENT_EMOTION_COUNT: usize = 10;
const POSITIVE_TREND_RATE: f64 = 0.6;
const NEGATIVE_TREND_RATE: f64 = 0.3;

fn percent(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Summarize computed results as display lines.
///
/// Always returns at least one line. When no patterns were found the list
/// carries a line asking for more data.
pub fn summarize(
    results: &AnalyticsResults,
    inputs: &AnalyticsInputs,
    config: &AnalyticsConfiguration,
) -> Vec<String> {
    if inputs.is_empty() {
        return vec![
            "No tracking data available yet. Start by creating your first tracking session to begin pattern analysis."
                .to_string(),
        ];
    }

    let mut lines = Vec::new();

    let sessions = inputs.entries.len();
    if sessions < config.analytics.min_tracking_for_correlation {
        lines.push(format!(
            "Limited data available ({} sessions). Analytics will improve as more data is collected.",
            sessions
        ));
    }

    if results.patterns.is_empty() {
        lines.push(
            "Not enough data to identify patterns yet. Continue collecting observations.".to_string(),
        );
    }

    let threshold = config.insights.high_confidence_pattern_threshold;
    lines.extend(
        results
            .patterns
            .iter()
            .filter(|p| p.confidence > threshold)
            .take(MAX_PATTERNS_TO_SHOW)
            .map(|p| format!("Pattern detected: {} ({}% confidence)", p.description, percent(p.confidence))),
    );

    lines.extend(
        results
            .correlations
            .iter()
            .filter(|c| c.significance == Significance::High)
            .take(MAX_CORRELATIONS_TO_SHOW)
            .map(|c| format!("Strong correlation found: {}", c.description)),
    );

    lines.extend(
        results
            .predictive_insights
            .iter()
            .take(MAX_PREDICTIONS_TO_SHOW)
            .map(|i| format!("Prediction: {} ({}% confidence)", i.description, percent(i.confidence))),
    );

    let emotions = &inputs.emotions;
    if emotions.len() >= RECENT_EMOTION_COUNT {
        let recent = &emotions[emotions.len() - RECENT_EMOTION_COUNT..];
        let positive = recent
            .iter()
            .filter(|e| config.taxonomy.is_positive(&e.emotion))
            .count();
        let rate = positive as f64 / recent.len() as f64;
        if rate > POSITIVE_TREND_RATE {
            lines.push(format!(
                "Positive trend: {}% of recent emotions have been positive.",
                percent(rate)
            ));
        } else if rate < NEGATIVE_TREND_RATE {
            lines.push(format!(
                "Consider reviewing strategies - only {}% of recent emotions have been positive.",
                percent(rate)
            ));
        }
    }

    if lines.is_empty() {
        lines.push(
            "Analytics are active and monitoring patterns. Continue collecting data for more detailed insights."
                .to_string(),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::types::{PatternResult, SignalKind};

    fn make_pattern(confidence: f64) -> PatternResult {
        PatternResult {
            pattern: "anxious".to_string(),
            kind: SignalKind::Emotion,
            confidence,
            frequency: 5,
            data_points: 10,
            description: "Frequent anxious episodes".to_string(),
            recommendations: vec![],
            timeframe: "30 days".to_string(),
        }
    }

    #[test]
    fn test_no_data() {
        let config = AnalyticsConfiguration::default();
        let lines = summarize(&AnalyticsResults::default(), &AnalyticsInputs::default(), &config);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("No tracking data available yet"));
    }

    #[test]
    fn test_no_patterns_asks_for_more_data() {
        let config = AnalyticsConfiguration::default();
        let inputs = AnalyticsInputs {
            emotions: vec![make_emotion("calm", 2.0, hours_ago(1))],
            ..Default::default()
        };
        let lines = summarize(&AnalyticsResults::default(), &inputs, &config);
        assert!(lines.iter().any(|l| l.starts_with("Not enough data to identify patterns")));
    }

    #[test]
    fn test_high_confidence_patterns_and_trend() {
        let config = AnalyticsConfiguration::default();
        let emotions = (0..10).map(|i| make_emotion("happy", 3.0, hours_ago(i))).collect();
        let inputs = AnalyticsInputs {
            entries: rising_noise_entries(),
            emotions,
            sensory_inputs: vec![],
        };
        let results = AnalyticsResults {
            patterns: vec![make_pattern(0.9), make_pattern(0.3)],
            ..Default::default()
        };

        let lines = summarize(&results, &inputs, &config);
        assert_eq!(
            lines,
            vec![
                "Pattern detected: Frequent anxious episodes (90% confidence)".to_string(),
                "Positive trend: 100% of recent emotions have been positive.".to_string(),
            ]
        );
    }
}
