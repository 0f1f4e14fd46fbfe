//! Trigger alerts from recent observations

use uuid::Uuid;

use super::Analyzer;
use crate::types::{
    AlertKind, EmotionEntry, Severity, Significance, TrackingEntry, TriggerAlert,
};
use crate::window::days_before;

impl Analyzer<'_> {
    /// Alerts over the last `recentDataDays`.
    ///
    /// - a high-stress concern when enough stress emotions reach the high
    ///   intensity threshold (scaled by `emotionIntensityMultiplier`)
    /// - a positive-progress note when enough positive emotions are intense
    /// - one environmental alert per strong environmental correlation
    pub fn generate_trigger_alerts(
        &self,
        emotions: &[EmotionEntry],
        entries: &[TrackingEntry],
        student_id: &str,
    ) -> Vec<TriggerAlert> {
        let pa = &self.config.pattern_analysis;
        let recent_days = self.config.time_windows.recent_data_days;
        let cutoff = days_before(self.now, recent_days);

        let recent_emotions: Vec<&EmotionEntry> =
            emotions.iter().filter(|e| e.timestamp >= cutoff).collect();
        let recent_entries: Vec<TrackingEntry> = entries
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect();

        let alert = |kind, severity, title: &str, description: String, recommendations: Vec<String>| {
            TriggerAlert {
                id: Uuid::new_v4(),
                kind,
                severity,
                title: title.to_string(),
                description,
                recommendations,
                timestamp: self.now,
                student_id: Some(student_id.to_string()),
            }
        };

        let mut alerts = Vec::new();

        let multiplier = self.config.alert_sensitivity.emotion_intensity_multiplier;
        let stress_threshold = if multiplier > 0.0 {
            pa.high_intensity_threshold / multiplier
        } else {
            pa.high_intensity_threshold
        };
        let stress_emotions = &self.config.enhanced_analysis.risk_assessment.stress_emotions;
        let high_stress = recent_emotions
            .iter()
            .filter(|e| e.intensity >= stress_threshold)
            .filter(|e| stress_emotions.iter().any(|s| s.eq_ignore_ascii_case(&e.emotion)))
            .count();

        if high_stress >= pa.min_data_points {
            alerts.push(alert(
                AlertKind::Concern,
                Severity::High,
                "High Stress Pattern Detected",
                format!(
                    "{} high-intensity stress responses recorded in the past {} days",
                    high_stress, recent_days
                ),
                vec![
                    "Schedule a check-in with the student".to_string(),
                    "Review current stressors and triggers".to_string(),
                    "Implement additional calming strategies".to_string(),
                    "Consider environmental modifications".to_string(),
                ],
            ));
        }

        let intense_positive = recent_emotions
            .iter()
            .filter(|e| self.config.taxonomy.is_positive(&e.emotion))
            .filter(|e| e.intensity >= pa.high_intensity_threshold)
            .count();

        if intense_positive >= pa.min_data_points && recent_emotions.len() >= pa.min_data_points {
            let share = intense_positive as f64 / recent_emotions.len() as f64;
            alerts.push(alert(
                AlertKind::Improvement,
                Severity::Low,
                "Positive Progress Noted",
                format!(
                    "Strong positive emotional responses observed in {}% of recent sessions",
                    (share * 100.0).round() as i64
                ),
                vec![
                    "Continue current successful strategies".to_string(),
                    "Document what is working well".to_string(),
                    "Consider sharing success with student and family".to_string(),
                ],
            ));
        }

        for correlation in self.analyze_environmental_correlations(&recent_entries) {
            if correlation.significance == Significance::High
                && correlation.correlation.abs() > pa.correlation_threshold * 2.0
            {
                alerts.push(alert(
                    AlertKind::Pattern,
                    Severity::Medium,
                    "Environmental Pattern Identified",
                    correlation.description,
                    correlation.recommendations,
                ));
            }
        }

        alerts
    }
}
