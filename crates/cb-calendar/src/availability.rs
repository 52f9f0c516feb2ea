//! Availability resolver
//!
//! Pure functions over a [`BusySet`]: a free/busy decision for one interval
//! and a proximity-ordered list of alternative slots.

use chrono::{DateTime, Utc};

use crate::busy::BusySet;
use crate::interval::TimeInterval;

/// True iff `requested` overlaps no member of `busy`.
///
/// Touching a busy boundary is not a conflict.
pub fn is_free(requested: &TimeInterval, busy: &BusySet) -> bool {
    let slice = busy.as_slice();
    // first busy interval that ends after the requested start; anything
    // earlier cannot overlap, and only this one can start before requested.end
    let idx = busy.first_ending_after(requested.start());
    match slice.get(idx) {
        Some(candidate) => !candidate.overlaps(requested),
        None => true,
    }
}

/// Alternative slots of the requested duration inside `[window_start, window_end)`.
///
/// One candidate per free gap long enough, anchored at the gap start, ordered
/// by distance from the requested start (earlier start wins ties) and
/// truncated to `max_suggestions`.
pub fn suggest_alternatives(
    requested: &TimeInterval,
    busy: &BusySet,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    max_suggestions: usize,
) -> Vec<TimeInterval> {
    let duration = requested.duration();

    let mut candidates: Vec<TimeInterval> = busy
        .gaps(window_start, window_end)
        .into_iter()
        .filter(|gap| gap.duration() >= duration)
        .filter_map(|gap| TimeInterval::starting_at(gap.start(), duration).ok())
        .collect();

    candidates.sort_by_key(|c| ((c.start() - requested.start()).abs(), c.start()));
    candidates.truncate(max_suggestions);
    candidates
}
