use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::timerange::TimeRange;

pub const DAY_MS: i64 = 86_400_000;

/// The trailing span of data a region keeps, `[start_ms, end_ms)`.
///
/// The window ends at the midnight following `now - freshness_offset` and
/// starts `retention` days before that day's midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl RetentionWindow {
    pub fn at(now: DateTime<Utc>, retention_days: i64, freshness_offset_days: i64) -> Self {
        let anchor_ms = now
            .timestamp_millis()
            .saturating_sub(freshness_offset_days.saturating_mul(DAY_MS));
        let day_start = anchor_ms.div_euclid(DAY_MS).saturating_mul(DAY_MS);
        Self {
            start_ms: day_start.saturating_sub(retention_days.saturating_mul(DAY_MS)),
            end_ms: day_start.saturating_add(DAY_MS),
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_ms, self.end_ms)
    }

    /// The range still to fetch given the last checkpoint.
    ///
    /// A checkpoint inside the window resumes right after it; a missing or
    /// expired checkpoint refetches the whole window. The result is empty when
    /// the checkpoint already covers the window end.
    pub fn fetch_range(&self, checkpoint_ms: Option<i64>) -> TimeRange {
        match checkpoint_ms {
            Some(last) if last > self.start_ms => TimeRange::new(last + 1, self.end_ms),
            _ => TimeRange::new(self.start_ms, self.end_ms),
        }
    }
}
