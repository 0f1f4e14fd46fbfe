//! Z-score anomaly detection

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use super::Analyzer;
use crate::stats::z_scores;
use crate::types::{AnomalyDetection, EmotionEntry, SensoryEntry, Severity, SignalKind, TrackingEntry};

const MEDIUM_SEVERITY_OFFSET: f64 = 0.5;
const HIGH_SEVERITY_OFFSET: f64 = 1.5;

fn anomaly_recommendations(kind: SignalKind) -> Vec<String> {
    let lines: &[&str] = match kind {
        SignalKind::Emotion => &[
            "Investigate potential triggers for this emotional spike",
            "Provide immediate support and coping strategies",
            "Monitor closely for additional unusual patterns",
            "Consider environmental or schedule changes",
        ],
        SignalKind::Sensory => &[
            "Review sensory environment for unusual factors",
            "Check for changes in routine or schedule",
            "Provide additional sensory regulation support",
            "Monitor for illness or other physical factors",
        ],
        SignalKind::Environmental => &[
            "Investigate potential causes",
            "Provide additional support",
            "Monitor closely",
            "Document and track patterns",
        ],
    };
    lines.iter().map(|line| line.to_string()).collect()
}

impl Analyzer<'_> {
    /// Effective z-score threshold after the sensitivity multiplier
    fn anomaly_cutoff(&self) -> f64 {
        self.config.enhanced_analysis.anomaly_threshold
            * self.config.alert_sensitivity.anomaly_multiplier
    }

    fn anomaly_severity(&self, z: f64) -> Severity {
        let cutoff = self.anomaly_cutoff();
        if z >= cutoff + HIGH_SEVERITY_OFFSET {
            Severity::High
        } else if z >= cutoff + MEDIUM_SEVERITY_OFFSET {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Indices and absolute z-scores of the points beyond the cutoff.
    ///
    /// Series shorter than `minSampleSize`, or with zero spread, yield nothing.
    fn flag_outliers(&self, values: &[f64]) -> Vec<(usize, f64)> {
        if values.len() < self.config.enhanced_analysis.min_sample_size {
            return Vec::new();
        }
        let Some(scores) = z_scores(values) else {
            return Vec::new();
        };
        let cutoff = self.anomaly_cutoff();
        scores
            .into_iter()
            .map(f64::abs)
            .enumerate()
            .filter(|(_, z)| *z > cutoff)
            .collect()
    }

    /// Flag emotion intensities, daily sensory volumes and room noise levels
    /// whose z-score exceeds `anomalyThreshold × anomalyMultiplier`.
    ///
    /// Results are ordered newest first.
    pub fn detect_anomalies(
        &self,
        emotions: &[EmotionEntry],
        sensory: &[SensoryEntry],
        entries: &[TrackingEntry],
    ) -> Vec<AnomalyDetection> {
        let mut anomalies = Vec::new();

        let intensities: Vec<f64> = emotions.iter().map(|e| e.intensity).collect();
        for (idx, z) in self.flag_outliers(&intensities) {
            let emotion = &emotions[idx];
            anomalies.push(AnomalyDetection {
                kind: SignalKind::Emotion,
                severity: self.anomaly_severity(z),
                timestamp: emotion.timestamp,
                z_score: z,
                description: Some(format!(
                    "Unusual {} intensity detected ({}/5)",
                    emotion.emotion, emotion.intensity
                )),
                recommendations: anomaly_recommendations(SignalKind::Emotion),
            });
        }

        let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for input in sensory {
            *daily.entry(input.timestamp.date_naive()).or_default() += 1;
        }
        let days: Vec<(NaiveDate, usize)> = daily.into_iter().collect();
        let counts: Vec<f64> = days.iter().map(|(_, count)| *count as f64).collect();
        for (idx, z) in self.flag_outliers(&counts) {
            let (day, count) = days[idx];
            let timestamp = Utc.from_utc_datetime(&day.and_time(NaiveTime::default()));
            anomalies.push(AnomalyDetection {
                kind: SignalKind::Sensory,
                severity: self.anomaly_severity(z),
                timestamp,
                z_score: z,
                description: Some(format!(
                    "Unusual sensory activity level detected ({} inputs)",
                    count
                )),
                recommendations: anomaly_recommendations(SignalKind::Sensory),
            });
        }

        let noise: Vec<(DateTime<Utc>, f64)> = entries
            .iter()
            .filter_map(|entry| Some((entry.timestamp, entry.room()?.noise_level?)))
            .collect();
        let levels: Vec<f64> = noise.iter().map(|(_, level)| *level).collect();
        for (idx, z) in self.flag_outliers(&levels) {
            let (timestamp, level) = noise[idx];
            anomalies.push(AnomalyDetection {
                kind: SignalKind::Environmental,
                severity: self.anomaly_severity(z),
                timestamp,
                z_score: z,
                description: Some(format!("Unusual noise level detected ({} dB)", level)),
                recommendations: anomaly_recommendations(SignalKind::Environmental),
            });
        }

        anomalies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        anomalies
    }
}
