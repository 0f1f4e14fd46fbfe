//! Correlation matrix and environmental correlations

use std::collections::BTreeMap;

use super::Analyzer;
use crate::config::AnalyticsConfiguration;
use crate::stats::{mean, pearson, pearson_pairwise};
use crate::types::{
    CorrelationMatrix, EnvironmentalCorrelation, Significance, SignificantPair, SensoryResponse,
    TrackingEntry,
};

/// Factors derived from every tracking session, in matrix order
pub const CORRELATION_FACTORS: [&str; 6] = [
    "avgEmotionIntensity",
    "positiveEmotionRatio",
    "sensorySeekingRatio",
    "noiseLevel",
    "temperature",
    "lightingQuality",
];

/// Offsets above `correlationThreshold` for the moderate and high tiers
const MODERATE_TIER_OFFSET: f64 = 0.2;
const HIGH_TIER_OFFSET: f64 = 0.4;

/// Map a lighting label to an ordinal quality score.
///
/// Unrecognized labels score as normal lighting.
pub fn lighting_to_numeric(lighting: &str) -> f64 {
    match lighting.to_lowercase().as_str() {
        "dim" => 1.0,
        "fluorescent" => 2.5,
        "bright" => 3.0,
        "natural" => 3.5,
        _ => 2.0,
    }
}

/// Factor values for one session; `None` where the session has no data
fn extract_factors(entry: &TrackingEntry, config: &AnalyticsConfiguration) -> [Option<f64>; 6] {
    let intensities: Vec<f64> = entry.emotions.iter().map(|e| e.intensity).collect();
    let avg_intensity = mean(&intensities);

    let positive_ratio = if entry.emotions.is_empty() {
        None
    } else {
        let positive = entry
            .emotions
            .iter()
            .filter(|e| config.taxonomy.is_positive(&e.emotion))
            .count();
        Some(positive as f64 / entry.emotions.len() as f64)
    };

    let seeking_ratio = if entry.sensory_inputs.is_empty() {
        None
    } else {
        let seeking = entry
            .sensory_inputs
            .iter()
            .filter(|s| s.response == SensoryResponse::Seeking)
            .count();
        Some(seeking as f64 / entry.sensory_inputs.len() as f64)
    };

    let room = entry.room();
    [
        avg_intensity,
        positive_ratio,
        seeking_ratio,
        room.and_then(|r| r.noise_level),
        room.and_then(|r| r.temperature),
        room.and_then(|r| r.lighting.as_deref()).map(lighting_to_numeric),
    ]
}

impl Analyzer<'_> {
    /// Tier an absolute coefficient against `correlationThreshold` and the
    /// two tier offsets, each capped at 1. Returns `None` below the base.
    fn matrix_significance(&self, abs_r: f64) -> Option<Significance> {
        let base = self.config.pattern_analysis.correlation_threshold.clamp(0.0, 1.0);
        let moderate_cut = (base + MODERATE_TIER_OFFSET).min(1.0);
        let high_cut = (base + HIGH_TIER_OFFSET).min(1.0);
        if abs_r >= high_cut {
            Some(Significance::High)
        } else if abs_r >= moderate_cut {
            Some(Significance::Moderate)
        } else if abs_r >= base {
            Some(Significance::Low)
        } else {
            None
        }
    }

    /// Pairwise Pearson correlations between the derived session factors.
    ///
    /// Missing values are excluded pair by pair, never imputed. A pair is
    /// reported as significant when `|r| >= correlationThreshold` and it has
    /// at least `minSampleSize` shared observations. Pairs are sorted by
    /// descending `|r|`.
    pub fn generate_correlation_matrix(&self, entries: &[TrackingEntry]) -> CorrelationMatrix {
        if entries.is_empty() {
            return CorrelationMatrix::default();
        }

        let rows: Vec<[Option<f64>; 6]> = entries
            .iter()
            .map(|entry| extract_factors(entry, self.config))
            .collect();
        let column = |idx: usize| -> Vec<Option<f64>> { rows.iter().map(|row| row[idx]).collect() };
        let columns: Vec<Vec<Option<f64>>> = (0..CORRELATION_FACTORS.len()).map(column).collect();

        let n = CORRELATION_FACTORS.len();
        let min_pairs = self.config.enhanced_analysis.min_sample_size;
        let mut matrix = vec![vec![0.0; n]; n];
        let mut significant_pairs = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let (r, pairs) = pearson_pairwise(&columns[i], &columns[j]);
                matrix[i][j] = r;
                matrix[j][i] = r;

                if pairs < min_pairs {
                    continue;
                }
                if let Some(significance) = self.matrix_significance(r.abs()) {
                    significant_pairs.push(SignificantPair {
                        factor1: CORRELATION_FACTORS[i].to_string(),
                        factor2: CORRELATION_FACTORS[j].to_string(),
                        correlation: r,
                        significance,
                    });
                }
            }
        }

        significant_pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));

        CorrelationMatrix {
            factors: CORRELATION_FACTORS.iter().map(|f| f.to_string()).collect(),
            matrix,
            significant_pairs,
        }
    }

    /// Environmental factors that track emotional outcomes.
    ///
    /// Reports noise against average emotion intensity when `|r|` exceeds
    /// `correlationThreshold`, and the best and worst lighting groups when
    /// their positive-emotion rates differ by more than
    /// `concernFrequencyThreshold`.
    pub fn analyze_environmental_correlations(
        &self,
        entries: &[TrackingEntry],
    ) -> Vec<EnvironmentalCorrelation> {
        let pa = &self.config.pattern_analysis;
        if entries.len() < pa.min_data_points {
            return Vec::new();
        }

        let mut correlations = Vec::new();

        let (noise, intensity): (Vec<f64>, Vec<f64>) = entries
            .iter()
            .filter_map(|entry| {
                let noise = entry.room().and_then(|r| r.noise_level)?;
                let intensities: Vec<f64> = entry.emotions.iter().map(|e| e.intensity).collect();
                Some((noise, mean(&intensities)?))
            })
            .unzip();

        if noise.len() >= pa.min_data_points {
            let r = pearson(&noise, &intensity);
            if r.abs() > pa.correlation_threshold {
                let (description, recommendations) = if r > 0.0 {
                    (
                        "Higher noise levels correlate with more intense emotions",
                        vec![
                            "Consider noise reduction strategies".to_string(),
                            "Provide quiet spaces during intense activities".to_string(),
                        ],
                    )
                } else {
                    (
                        "Lower noise levels correlate with more intense emotions",
                        vec!["Monitor for overstimulation in quiet environments".to_string()],
                    )
                };
                correlations.push(EnvironmentalCorrelation {
                    factor: "Noise Level".to_string(),
                    outcome: "Emotion Intensity".to_string(),
                    correlation: r,
                    significance: self.environmental_significance(r.abs()),
                    description: description.to_string(),
                    recommendations,
                });
            }
        }

        let mut lighting_groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for entry in entries {
            let Some(lighting) = entry.room().and_then(|r| r.lighting.as_deref()) else {
                continue;
            };
            if entry.emotions.is_empty() {
                continue;
            }
            let positive = entry
                .emotions
                .iter()
                .filter(|e| self.config.taxonomy.is_positive(&e.emotion))
                .count();
            lighting_groups
                .entry(lighting.to_lowercase())
                .or_default()
                .push(positive as f64 / entry.emotions.len() as f64);
        }

        let mut averages: Vec<(String, f64)> = lighting_groups
            .into_iter()
            .filter(|(_, values)| values.len() >= pa.min_data_points)
            .filter_map(|(lighting, values)| mean(&values).map(|avg| (lighting, avg)))
            .collect();
        averages.sort_by(|a, b| b.1.total_cmp(&a.1));

        if let (Some(best), Some(worst)) = (averages.first(), averages.last()) {
            if averages.len() > 1 && best.1 - worst.1 > pa.concern_frequency_threshold {
                correlations.push(EnvironmentalCorrelation {
                    factor: "Lighting Conditions".to_string(),
                    outcome: "Positive Emotions".to_string(),
                    // Categorical comparison, reported as a fixed moderate estimate
                    correlation: 0.5,
                    significance: Significance::Moderate,
                    description: format!(
                        "{} lighting shows highest positive emotion rates ({}%)",
                        best.0,
                        (best.1 * 100.0).round() as i64
                    ),
                    recommendations: vec![
                        format!("Optimize for {} lighting when possible", best.0),
                        format!(
                            "Minimize exposure to {} lighting during challenging activities",
                            worst.0
                        ),
                    ],
                });
            }
        }

        correlations
    }

    fn environmental_significance(&self, abs_r: f64) -> Significance {
        let threshold = self.config.pattern_analysis.correlation_threshold;
        if abs_r < threshold {
            Significance::Low
        } else if abs_r < threshold * 2.0 {
            Significance::Moderate
        } else {
            Significance::High
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::types::RoomConditions;
    use chrono::Duration;

    #[test]
    fn test_empty_matrix() {
        let config = AnalyticsConfiguration::default();
        let matrix = Analyzer::new(&config, now()).generate_correlation_matrix(&[]);
        assert!(matrix.is_empty());
        assert!(matrix.matrix.is_empty());
        assert!(matrix.significant_pairs.is_empty());
    }

    #[test]
    fn test_rising_noise_produces_significant_pair() {
        let config = AnalyticsConfiguration::default();
        let entries = rising_noise_entries();
        let matrix = Analyzer::new(&config, now()).generate_correlation_matrix(&entries);

        assert_eq!(matrix.factors.len(), 6);
        assert!(!matrix.significant_pairs.is_empty());
        let top = &matrix.significant_pairs[0];
        assert_eq!(top.factor1, "avgEmotionIntensity");
        assert_eq!(top.factor2, "noiseLevel");
        assert!(top.correlation > 0.99);
        assert_eq!(top.significance, Significance::High);

        // Symmetric with a zero diagonal
        for i in 0..6 {
            assert_eq!(matrix.matrix[i][i], 0.0);
            for j in 0..6 {
                assert_eq!(matrix.matrix[i][j], matrix.matrix[j][i]);
            }
        }
    }

    #[test]
    fn test_threshold_monotonicity() {
        let mut entries = rising_noise_entries();
        // Add a weaker, noisy temperature signal so pairs straddle the thresholds
        for (i, entry) in entries.iter_mut().enumerate() {
            let wobble = if i % 2 == 0 { 4.0 } else { -4.0 };
            if let Some(room) = entry
                .environmental_data
                .as_mut()
                .and_then(|env| env.room_conditions.as_mut())
            {
                room.temperature = Some(20.0 + i as f64 * 0.3 + wobble);
            }
        }

        let low = AnalyticsConfiguration::default();
        let mut high = low.clone();
        high.pattern_analysis.correlation_threshold = 0.6;

        let low_pairs = Analyzer::new(&low, now()).generate_correlation_matrix(&entries).significant_pairs;
        let high_pairs = Analyzer::new(&high, now()).generate_correlation_matrix(&entries).significant_pairs;

        assert!(!low_pairs.is_empty());
        assert!(high_pairs.len() <= low_pairs.len());
        assert!(high_pairs.iter().all(|p| p.correlation.abs() >= 0.6));
        assert!(low_pairs.iter().all(|p| p.correlation.abs() >= 0.25));
    }

    #[test]
    fn test_missing_values_are_excluded_not_zeroed() {
        let config = AnalyticsConfiguration::default();
        let mut entries = rising_noise_entries();
        // Sessions without emotions must not count as intensity zero
        for entry in entries.iter_mut().take(4) {
            entry.emotions.clear();
        }
        let matrix = Analyzer::new(&config, now()).generate_correlation_matrix(&entries);
        assert!(matrix.matrix[0][3] > 0.99);
    }

    #[test]
    fn test_min_sample_size_gate() {
        let mut config = AnalyticsConfiguration::default();
        config.enhanced_analysis.min_sample_size = 20;
        let matrix = Analyzer::new(&config, now()).generate_correlation_matrix(&rising_noise_entries());
        assert!(matrix.significant_pairs.is_empty());
        assert!(matrix.matrix[0][3] > 0.99);
    }

    #[test]
    fn test_lighting_mapping() {
        assert_eq!(lighting_to_numeric("Dim"), 1.0);
        assert_eq!(lighting_to_numeric("natural"), 3.5);
        assert_eq!(lighting_to_numeric("strobe"), 2.0);
    }

    #[test]
    fn test_environmental_noise_correlation() {
        let config = AnalyticsConfiguration::default();
        let found = Analyzer::new(&config, now()).analyze_environmental_correlations(&rising_noise_entries());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].factor, "Noise Level");
        assert_eq!(found[0].significance, Significance::High);
        assert!(found[0].description.starts_with("Higher noise"));
    }

    #[test]
    fn test_environmental_lighting_groups() {
        let config = AnalyticsConfiguration::default();
        let mut entries = Vec::new();
        for i in 0..6 {
            let ts = now() - Duration::days(i as i64 + 1);
            let (lighting, emotion) = if i % 2 == 0 { ("natural", "happy") } else { ("fluorescent", "anxious") };
            let room = RoomConditions {
                noise_level: None,
                temperature: None,
                lighting: Some(lighting.to_string()),
            };
            entries.push(make_entry(i, ts, vec![make_emotion(emotion, 3.0, ts)], Some(room)));
        }

        let found = Analyzer::new(&config, now()).analyze_environmental_correlations(&entries);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].factor, "Lighting Conditions");
        assert!(found[0].description.starts_with("natural lighting"));
        assert_eq!(found[0].recommendations[1], "Minimize exposure to fluorescent lighting during challenging activities");
    }
}
