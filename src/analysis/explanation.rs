//! Confidence diagnostics for insights

use super::Analyzer;
use crate::types::{ConfidenceExplanation, ConfidenceLevel};

impl Analyzer<'_> {
    /// Explain a confidence value in terms of sample size, time span and fit.
    ///
    /// Factors are tagged strings (`insufficientData:3:5`,
    /// `adequateTimespan:21:30`, `strongPattern:0.812:ct=0.25`). Sufficiency
    /// is judged against `minSampleSize`, span against `shortTermDays` and
    /// pattern strength against `correlationThreshold`.
    pub fn generate_confidence_explanation(
        &self,
        sample_size: usize,
        time_span_days: f64,
        r_squared: f64,
        confidence: f64,
    ) -> ConfidenceExplanation {
        let min_samples = self.config.enhanced_analysis.min_sample_size;
        let windows = &self.config.time_windows;
        let threshold = self.config.pattern_analysis.correlation_threshold;
        let strong_cut = (threshold + 0.4).max(0.7);

        let mut factors = Vec::with_capacity(3);

        if sample_size < min_samples {
            factors.push(format!("insufficientData:{}:{}", sample_size, min_samples));
        } else {
            factors.push(format!("sufficientData:{}:{}", sample_size, min_samples));
        }

        let span = if time_span_days < windows.short_term_days as f64 {
            "shortTimespan"
        } else {
            "adequateTimespan"
        };
        factors.push(format!("{}:{}:{}", span, time_span_days, windows.default_analysis_days));

        if r_squared < threshold {
            factors.push(format!("weakPattern:{:.3}:ct={}", r_squared, threshold));
        } else if r_squared > strong_cut {
            factors.push(format!("strongPattern:{:.3}:ct={}", r_squared, threshold));
        } else {
            factors.push(format!("moderatePattern:ct={}", threshold));
        }

        let high = self.config.insights.high_confidence_pattern_threshold;
        let (level, explanation) = if confidence >= high {
            let tag = if r_squared > strong_cut {
                "excellentData"
            } else {
                "reliableInsight"
            };
            (ConfidenceLevel::High, tag)
        } else if confidence >= high - 0.2 {
            (ConfidenceLevel::Medium, "emergingTrend")
        } else {
            (ConfidenceLevel::Low, "needMoreData")
        };

        ConfidenceExplanation {
            level,
            explanation: explanation.to_string(),
            factors,
        }
    }
}
