//! Merged busy intervals

use chrono::{DateTime, Utc};

use crate::interval::TimeInterval;

/// Calendar-occupied intervals, sorted by start.
///
/// No two members overlap or touch: such inputs are merged on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusySet {
    intervals: Vec<TimeInterval>,
}

impl BusySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort and merge arbitrary intervals
    pub fn from_intervals(intervals: impl IntoIterator<Item = TimeInterval>) -> Self {
        let mut sorted: Vec<TimeInterval> = intervals.into_iter().collect();
        sorted.sort_by_key(|i| (i.start(), i.end()));

        let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());
        for interval in sorted {
            match merged.last_mut() {
                Some(last) if last.touches(&interval) => {
                    if interval.end() > last.end() {
                        // start < end holds for the union of two valid intervals
                        *last = TimeInterval::new(last.start(), interval.end())
                            .unwrap_or(*last);
                    }
                }
                _ => merged.push(interval),
            }
        }

        Self { intervals: merged }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeInterval> {
        self.intervals.iter()
    }

    pub fn as_slice(&self) -> &[TimeInterval] {
        &self.intervals
    }

    /// Index of the first member ending after `instant`.
    ///
    /// Members are disjoint and sorted, so their ends are sorted too.
    pub(crate) fn first_ending_after(&self, instant: DateTime<Utc>) -> usize {
        self.intervals.partition_point(|i| i.end() <= instant)
    }

    /// Free gaps inside `[window_start, window_end)`.
    ///
    /// An empty or inverted window has no gaps.
    pub fn gaps(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Vec<TimeInterval> {
        let mut gaps = Vec::new();
        if window_start >= window_end {
            return gaps;
        }

        let mut cursor = window_start;
        for busy in &self.intervals[self.first_ending_after(window_start)..] {
            if busy.start() >= window_end {
                break;
            }
            if busy.start() > cursor {
                if let Ok(gap) = TimeInterval::new(cursor, busy.start()) {
                    gaps.push(gap);
                }
            }
            cursor = cursor.max(busy.end());
        }

        if cursor < window_end {
            if let Ok(gap) = TimeInterval::new(cursor, window_end) {
                gaps.push(gap);
            }
        }

        gaps
    }
}

impl FromIterator<TimeInterval> for BusySet {
    fn from_iter<T: IntoIterator<Item = TimeInterval>>(iter: T) -> Self {
        Self::from_intervals(iter)
    }
}
