//! Emotion and sensory pattern detection

use std::collections::BTreeMap;

use super::Analyzer;
use crate::stats::std_dev;
use crate::types::{EmotionEntry, PatternResult, SensoryEntry, SensoryResponse, SignalKind};
use crate::window::DateRange;

const SEEKING_RECOMMENDATIONS: [&str; 3] = [
    "Provide scheduled sensory breaks",
    "Offer fidget tools and movement opportunities",
    "Consider sensory-rich learning activities",
];

const AVOIDING_RECOMMENDATIONS: [&str; 3] = [
    "Provide quiet, low-stimulation spaces",
    "Use noise-canceling headphones when appropriate",
    "Gradually introduce sensory experiences",
];

impl Analyzer<'_> {
    /// Detect emotion patterns inside a trailing window.
    ///
    /// # Arguments
    /// * `emotions` - Emotion observations, any order
    /// * `window_days` - Window length; `None` uses `timeWindows.defaultAnalysisDays`
    ///
    /// # Returns
    /// Zero or more of `high-intensity-negative`, `consistent-emotion` and
    /// `moderate-negative-trend`.
    pub fn analyze_emotion_patterns(
        &self,
        emotions: &[EmotionEntry],
        window_days: Option<i64>,
    ) -> Vec<PatternResult> {
        let pa = &self.config.pattern_analysis;
        let sensitivity = &self.config.alert_sensitivity;
        let days = self.window_days(window_days);

        if emotions.len() < pa.min_data_points {
            return Vec::new();
        }

        let window = DateRange::trailing(days, self.now);
        let recent: Vec<&EmotionEntry> = emotions
            .iter()
            .filter(|e| window.contains(e.timestamp))
            .collect();
        if recent.is_empty() {
            return Vec::new();
        }

        let total = recent.len();
        let timeframe = format!("{} days", days);
        let intensity_threshold = pa.high_intensity_threshold / sensitivity.emotion_intensity_multiplier;
        let frequency_threshold = pa.concern_frequency_threshold / sensitivity.frequency_multiplier;
        let moderate_threshold = (pa.high_intensity_threshold - 1.0).max(1.0);
        let taxonomy = &self.config.taxonomy;

        let high_negative: Vec<f64> = recent
            .iter()
            .filter(|e| e.intensity >= intensity_threshold && taxonomy.is_negative(&e.emotion))
            .map(|e| e.intensity)
            .collect();
        let moderate_negative: Vec<f64> = recent
            .iter()
            .filter(|e| e.intensity >= moderate_threshold && taxonomy.is_negative(&e.emotion))
            .map(|e| e.intensity)
            .collect();

        let mut patterns = Vec::new();

        let high_ratio = high_negative.len() as f64 / total as f64;
        if high_ratio > frequency_threshold {
            patterns.push(PatternResult {
                pattern: "high-intensity-negative".to_string(),
                kind: SignalKind::Emotion,
                confidence: pattern_confidence(high_ratio, total, &high_negative, pa.min_data_points),
                frequency: high_negative.len(),
                description: format!(
                    "High-intensity negative emotions detected in {}% of recent sessions",
                    percent(high_ratio)
                ),
                recommendations: to_strings(&[
                    "Consider implementing calming strategies before intense activities",
                    "Monitor environmental triggers that may contribute to stress",
                    "Discuss coping mechanisms with student",
                ]),
                data_points: total,
                timeframe: timeframe.clone(),
            });
        }

        // BTreeMap keeps the dominant-emotion tie-break deterministic
        let mut by_emotion: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for e in &recent {
            by_emotion
                .entry(e.emotion.to_lowercase())
                .or_default()
                .push(e.intensity);
        }
        let dominant = by_emotion
            .iter()
            .fold(None::<(&String, &Vec<f64>)>, |best, (emotion, values)| match best {
                Some((_, best_values)) if best_values.len() >= values.len() => best,
                _ => Some((emotion, values)),
            });

        if let Some((emotion, values)) = dominant {
            let ratio = values.len() as f64 / total as f64;
            if ratio > pa.emotion_consistency_threshold {
                patterns.push(PatternResult {
                    pattern: "consistent-emotion".to_string(),
                    kind: SignalKind::Emotion,
                    confidence: pattern_confidence(ratio, total, values, pa.min_data_points),
                    frequency: values.len(),
                    description: format!("Consistent {} emotion pattern detected", emotion),
                    recommendations: emotion_recommendations(emotion),
                    data_points: total,
                    timeframe: timeframe.clone(),
                });
            }
        }

        let moderate_ratio = moderate_negative.len() as f64 / total as f64;
        if high_negative.is_empty() && moderate_ratio > pa.moderate_negative_threshold {
            patterns.push(PatternResult {
                pattern: "moderate-negative-trend".to_string(),
                kind: SignalKind::Emotion,
                confidence: pattern_confidence(moderate_ratio, total, &moderate_negative, pa.min_data_points),
                frequency: moderate_negative.len(),
                description: format!(
                    "Moderate negative emotions detected in {}% of recent sessions",
                    percent(moderate_ratio)
                ),
                recommendations: to_strings(&[
                    "Monitor for potential stress escalation",
                    "Implement preventive calming strategies",
                    "Consider environmental adjustments",
                ]),
                data_points: total,
                timeframe,
            });
        }

        patterns
    }

    /// Detect sensory seeking or avoiding patterns inside a trailing window.
    ///
    /// When both behaviors occur, one must outnumber the other by a factor of
    /// `1 + concernFrequencyThreshold`. When only one occurs, its share of all
    /// inputs must reach `concernFrequencyThreshold`.
    pub fn analyze_sensory_patterns(
        &self,
        sensory_inputs: &[SensoryEntry],
        window_days: Option<i64>,
    ) -> Vec<PatternResult> {
        let pa = &self.config.pattern_analysis;
        let days = self.window_days(window_days);

        if sensory_inputs.len() < pa.min_data_points {
            return Vec::new();
        }

        let window = DateRange::trailing(days, self.now);
        let recent: Vec<&SensoryEntry> = sensory_inputs
            .iter()
            .filter(|s| window.contains(s.timestamp))
            .collect();
        if recent.is_empty() {
            return Vec::new();
        }

        let total = recent.len();
        let intensities_of = |response: SensoryResponse| -> Vec<f64> {
            recent
                .iter()
                .filter(|s| s.response == response)
                .map(|s| s.intensity.unwrap_or(3.0))
                .collect()
        };
        let seeking = intensities_of(SensoryResponse::Seeking);
        let avoiding = intensities_of(SensoryResponse::Avoiding);

        let dominance = 1.0 + pa.concern_frequency_threshold;
        let prevalence = pa.concern_frequency_threshold;
        let seeking_ratio = seeking.len() as f64 / total as f64;
        let avoiding_ratio = avoiding.len() as f64 / total as f64;
        let ratio_over = |a: usize, b: usize| a as f64 / b.max(1) as f64;

        let detected = if !avoiding.is_empty() && ratio_over(seeking.len(), avoiding.len()) > dominance {
            Some((SensoryResponse::Seeking, seeking_ratio, "Strong sensory-seeking pattern identified"))
        } else if !seeking.is_empty() && ratio_over(avoiding.len(), seeking.len()) > dominance {
            Some((SensoryResponse::Avoiding, avoiding_ratio, "Strong sensory-avoiding pattern identified"))
        } else if avoiding.is_empty() && !seeking.is_empty() && seeking_ratio >= prevalence {
            Some((SensoryResponse::Seeking, seeking_ratio, "Prevalent sensory-seeking behavior observed"))
        } else if seeking.is_empty() && !avoiding.is_empty() && avoiding_ratio >= prevalence {
            Some((SensoryResponse::Avoiding, avoiding_ratio, "Prevalent sensory-avoiding behavior observed"))
        } else {
            None
        };

        let Some((response, ratio, description)) = detected else {
            return Vec::new();
        };
        let (observed, recommendations) = match response {
            SensoryResponse::Avoiding => (&avoiding, AVOIDING_RECOMMENDATIONS),
            _ => (&seeking, SEEKING_RECOMMENDATIONS),
        };

        vec![PatternResult {
            pattern: format!("sensory-{}", response.as_str()),
            kind: SignalKind::Sensory,
            confidence: pattern_confidence(ratio, total, observed, pa.min_data_points),
            frequency: observed.len(),
            description: description.to_string(),
            recommendations: to_strings(&recommendations),
            data_points: total,
            timeframe: format!("{} days", days),
        }]
    }
}

/// Confidence from the pattern's share of observations, damped for small
/// samples and for inconsistent intensities. Always within [0, 1].
fn pattern_confidence(ratio: f64, sample: usize, intensities: &[f64], min_points: usize) -> f64 {
    // Full weight once the sample is three times the minimum
    let saturation = (min_points.max(1) * 3) as f64;
    let sample_factor = 0.5 + 0.5 * (sample as f64 / saturation).min(1.0);
    // Intensities live on a 1-5 scale, so their spread is at most 2
    let consistency = std_dev(intensities)
        .map(|sd| 1.0 - (sd / 2.0).min(1.0) * 0.5)
        .unwrap_or(1.0);
    (ratio * sample_factor * consistency).clamp(0.0, 1.0)
}

fn percent(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn emotion_recommendations(emotion: &str) -> Vec<String> {
    match emotion {
        "anxious" => to_strings(&[
            "Introduce mindfulness and breathing exercises",
            "Create predictable routines and schedules",
            "Provide advance notice of changes",
        ]),
        "frustrated" => to_strings(&[
            "Break tasks into smaller, manageable steps",
            "Offer choice and control opportunities",
            "Teach problem-solving strategies",
        ]),
        "happy" => to_strings(&[
            "Continue activities that promote positive engagement",
            "Document successful strategies for future use",
            "Build on current strengths",
        ]),
        "calm" => to_strings(&[
            "Maintain current supportive environment",
            "Use as a baseline for comparison",
            "Gradually introduce new challenges",
        ]),
        _ => to_strings(&[
            "Monitor patterns and adjust strategies as needed",
            "Consult with support team for specialized approaches",
        ]),
    }
}
