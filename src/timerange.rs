use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open span of epoch milliseconds, `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn is_empty(&self) -> bool {
        self.start_ms >= self.end_ms
    }

    pub fn contains(&self, ms: i64) -> bool {
        ms >= self.start_ms && ms < self.end_ms
    }

    /// Splits the range into contiguous sub-windows of `width_ms`, the last
    /// one clipped to `end_ms`.
    pub fn split(&self, width_ms: i64) -> Vec<TimeRange> {
        let mut windows = Vec::new();
        if self.is_empty() || width_ms <= 0 {
            return windows;
        }

        let mut cur = self.start_ms;
        while cur < self.end_ms {
            let next = cur.saturating_add(width_ms).min(self.end_ms);
            windows.push(TimeRange::new(cur, next));
            cur = next;
        }
        windows
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start_ms, self.end_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_even() {
        let windows = TimeRange::new(0, 6).split(2);
        assert_eq!(
            windows,
            vec![
                TimeRange::new(0, 2),
                TimeRange::new(2, 4),
                TimeRange::new(4, 6)
            ]
        );
    }

    #[test]
    fn test_split_clips_last_window() {
        let windows = TimeRange::new(0, 5).split(2);
        assert_eq!(windows.last(), Some(&TimeRange::new(4, 5)));
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn test_split_empty_range() {
        assert!(TimeRange::new(5, 5).split(2).is_empty());
        assert!(TimeRange::new(6, 5).split(2).is_empty());
    }

    #[test]
    fn test_split_windows_are_contiguous() {
        let windows = TimeRange::new(1_000, 50_000).split(7_000);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(windows.first().unwrap().start_ms, 1_000);
        assert_eq!(windows.last().unwrap().end_ms, 50_000);
    }

    #[test]
    fn test_contains_is_half_open() {
        let r = TimeRange::new(10, 20);
        assert!(r.contains(10));
        assert!(r.contains(19));
        assert!(!r.contains(20));
    }
}
