//! Date windows
//!
//! Ranges are half-open: `start` is included, `end` is excluded.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{EmotionEntry, SensoryEntry, TrackingEntry};

/// Named ranges relative to a reference instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RangePreset {
    Last7Days,
    Last30Days,
    Last90Days,
    QuarterToDate,
}

/// A half-open `[start, end)` interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a custom range; `start` must not be after `end`
    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> AnalyticsResult<Self> {
        if start > end {
            return Err(AnalyticsError::InvalidRecord(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range for a preset, ending just after `now` so `now` itself is included
    pub fn preset(preset: RangePreset, now: DateTime<Utc>) -> Self {
        let end = just_after(now);
        let start = match preset {
            RangePreset::Last7Days => days_before(now, 7),
            RangePreset::Last30Days => days_before(now, 30),
            RangePreset::Last90Days => days_before(now, 90),
            RangePreset::QuarterToDate => {
                let quarter_month = ((now.month() - 1) / 3) * 3 + 1;
                Utc.with_ymd_and_hms(now.year(), quarter_month, 1, 0, 0, 0)
                    .single()
                    .unwrap_or(now)
            }
        };
        Self { start, end }
    }

    /// Trailing window of `days` ending at `now`, inclusive of both ends
    pub fn trailing(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: days_before(now, days.max(0)),
            end: just_after(now),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Whole days covered by the range
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn filter_emotions(&self, emotions: &[EmotionEntry]) -> Vec<EmotionEntry> {
        emotions
            .iter()
            .filter(|e| self.contains(e.timestamp))
            .cloned()
            .collect()
    }

    pub fn filter_sensory(&self, inputs: &[SensoryEntry]) -> Vec<SensoryEntry> {
        inputs
            .iter()
            .filter(|s| self.contains(s.timestamp))
            .cloned()
            .collect()
    }

    pub fn filter_entries(&self, entries: &[TrackingEntry]) -> Vec<TrackingEntry> {
        entries
            .iter()
            .filter(|e| self.contains(e.timestamp))
            .cloned()
            .collect()
    }
}

/// `now` minus `days`, saturating at the earliest representable instant
pub fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn just_after(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_signed(Duration::milliseconds(1)).unwrap_or(now)
}

/// Span in fractional days between the earliest and latest instant
pub fn time_span_days<I>(timestamps: I) -> f64
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut iter = timestamps.into_iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
    (max - min).num_milliseconds() as f64 / 86_400_000.0
}
