//! Least-squares trend analysis

use chrono::{DateTime, Utc};

use super::Analyzer;
use crate::stats::linear_regression;
use crate::types::{TrendAnalysis, TrendDirection, TrendForecast};

impl Analyzer<'_> {
    /// Fit a trend line through `(timestamp, value)` points.
    ///
    /// Points are ordered by time and regressed against their index. The
    /// slope is converted to a per-day rate over the observed span, and
    /// confidence blends data volume, time coverage and fit quality:
    /// `0.3·dataQuality + 0.3·timeSpanQuality + 0.4·r²`.
    ///
    /// Returns `None` below `minSampleSize` points or when no line can be fit.
    pub fn analyze_trend(&self, points: &[(DateTime<Utc>, f64)]) -> Option<TrendAnalysis> {
        let ea = &self.config.enhanced_analysis;
        if points.len() < ea.min_sample_size.max(2) {
            return None;
        }

        let mut sorted: Vec<(DateTime<Utc>, f64)> = points
            .iter()
            .copied()
            .filter(|(_, value)| value.is_finite())
            .collect();
        sorted.sort_by_key(|(ts, _)| *ts);
        let values: Vec<f64> = sorted.iter().map(|(_, value)| *value).collect();
        let fit = linear_regression(&values)?;

        let n = values.len() as f64;
        let span_days = match (sorted.first(), sorted.last()) {
            (Some((first, _)), Some((last, _))) => (*last - *first).num_days().max(0) as f64,
            _ => 0.0,
        };
        let daily_rate = fit.slope * n / span_days.max(1.0);

        let targets = &ea.quality_targets;
        let data_quality = if targets.points_target > 0.0 {
            (n / targets.points_target).min(1.0)
        } else {
            0.0
        };
        let time_quality = if targets.time_span_days_target > 0.0 {
            (span_days / targets.time_span_days_target).min(1.0)
        } else {
            0.0
        };
        let confidence = data_quality * 0.3 + time_quality * 0.3 + fit.r_squared * 0.4;

        let direction = if daily_rate.abs() < ea.trend_threshold {
            TrendDirection::Stable
        } else if daily_rate > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        let last = fit.predict(n - 1.0);
        let windows = &self.config.time_windows;
        Some(TrendAnalysis {
            direction,
            rate: daily_rate,
            significance: fit.r_squared,
            confidence,
            forecast: TrendForecast {
                next7_days: last + fit.slope * windows.recent_data_days as f64,
                next30_days: last + fit.slope * windows.default_analysis_days as f64,
                confidence,
            },
        })
    }
}
