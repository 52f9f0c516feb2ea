//! Booking workflow
//!
//! ```text
//! Received -> Checking -> Booking -> Confirmed
//!                |           |
//!                |           +-- lost race -> Checking (once)
//!                +-- busy -> Conflict
//!                +-- calendar unavailable -> Failed
//! ```
//!
//! One run produces exactly one [`BookingResult`]. The workflow keeps no
//! state between runs; concurrent runs only meet at the calendar.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use cb_calendar::{
    is_free, suggest_alternatives, BusySet, CalendarClient, CalendarError, TimeInterval,
};
use cb_core::BookingConfig;
use chrono::{DateTime, Duration, DurationRound, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::request::{BookingRequest, BookingResult};

/// Automatic retries after a lost write race
const MAX_RETRIES: u32 = 1;

/// Alternatives never start at odd minutes
const SLOT_GRANULARITY_MINUTES: i64 = 15;

const DEFAULT_BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Received,
    Checking,
    Booking,
    Confirmed,
    Conflict,
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Checking => "checking",
            Self::Booking => "booking",
            Self::Confirmed => "confirmed",
            Self::Conflict => "conflict",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Local working day that alternatives are confined to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::default() + Duration::hours(9),
            end: NaiveTime::default() + Duration::hours(17),
        }
    }
}

impl WorkingHours {
    /// Time outside the working day, inside `[window_start, window_end)`
    pub fn off_hours(
        &self,
        tz: Tz,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<TimeInterval> {
        let mut working = Vec::new();
        let mut day = window_start.with_timezone(&tz).date_naive();
        let last = window_end.with_timezone(&tz).date_naive();

        while day <= last {
            // a boundary inside a DST gap leaves the whole day off
            let start = tz.from_local_datetime(&day.and_time(self.start)).earliest();
            let end = tz.from_local_datetime(&day.and_time(self.end)).latest();
            if let (Some(start), Some(end)) = (start, end) {
                if let Ok(interval) =
                    TimeInterval::new(start.with_timezone(&Utc), end.with_timezone(&Utc))
                {
                    working.push(interval);
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        BusySet::from_intervals(working).gaps(window_start, window_end)
    }
}

/// Tunables for a workflow
#[derive(Debug, Clone)]
pub struct WorkflowPolicy {
    /// Searched on each side of the requested slot
    pub search_window: Duration,
    pub max_suggestions: usize,
    /// Upper bound on one busy-set read
    pub busy_timeout: StdDuration,
    pub working_hours: WorkingHours,
    /// Zone the working hours are read in
    pub tz: Tz,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        let config = BookingConfig::default();
        Self {
            search_window: Duration::days(i64::from(config.search_window_days)),
            max_suggestions: config.max_suggestions,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            working_hours: WorkingHours::default(),
            tz: Tz::UTC,
        }
    }
}

impl WorkflowPolicy {
    pub fn from_config(config: &BookingConfig) -> crate::Result<Self> {
        let (start, end) = config.working_hours()?;
        Ok(Self {
            search_window: Duration::days(i64::from(config.search_window_days)),
            max_suggestions: config.max_suggestions,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            working_hours: WorkingHours { start, end },
            tz: config.tz()?,
        })
    }

    pub fn with_busy_timeout(mut self, timeout: StdDuration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Negotiates one booking at a time against a calendar
pub struct BookingWorkflow<C: CalendarClient + ?Sized> {
    calendar: Arc<C>,
    policy: WorkflowPolicy,
}

impl<C: CalendarClient + ?Sized> BookingWorkflow<C> {
    pub fn new(calendar: Arc<C>, policy: WorkflowPolicy) -> Self {
        Self { calendar, policy }
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    pub fn calendar(&self) -> &Arc<C> {
        &self.calendar
    }

    /// Run the workflow for `request` against the current time
    pub async fn run(&self, request: &BookingRequest) -> BookingResult {
        self.run_at(request, Utc::now()).await
    }

    pub async fn run_at(&self, request: &BookingRequest, now: DateTime<Utc>) -> BookingResult {
        let requested = request.requested;
        let mut state = WorkflowState::Received;
        debug!("Booking '{}' at {}: {}", request.title, requested, state);

        let mut attempt = 0;
        loop {
            transition(&mut state, WorkflowState::Checking, &requested);
            let busy = match self.load_busy(self.search_range(&requested)).await {
                Ok(busy) => busy,
                Err(e) => return self.fail(&mut state, &requested, e),
            };

            if !is_free(&requested, &busy) {
                let alternatives = self.alternatives(&requested, &busy, now);
                return self.conflict(&mut state, &requested, alternatives);
            }

            transition(&mut state, WorkflowState::Booking, &requested);
            match self
                .calendar
                .create_event(requested, &request.title, &request.attendees)
                .await
            {
                Ok(event) => {
                    transition(&mut state, WorkflowState::Confirmed, &requested);
                    info!("Booking confirmed: {} ({})", event.id, requested);
                    return BookingResult::Confirmed {
                        event_id: event.id,
                        interval: event.interval,
                        title: event.title,
                        html_link: event.html_link,
                    };
                }
                Err(CalendarError::Conflict(reason)) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!("Lost the race for {} ({}); re-checking", requested, reason);
                }
                Err(CalendarError::Conflict(reason)) => {
                    warn!("Lost the race for {} again ({})", requested, reason);
                    // the slot is now taken even though our last read said otherwise
                    let busy =
                        BusySet::from_intervals(busy.iter().copied().chain([requested]));
                    let alternatives = self.alternatives(&requested, &busy, now);
                    return self.conflict(&mut state, &requested, alternatives);
                }
                Err(e) => return self.fail(&mut state, &requested, e),
            }
        }
    }

    /// Whether `interval` is free right now
    pub async fn check_availability(&self, interval: TimeInterval) -> Result<bool, CalendarError> {
        let busy = self.load_busy(interval).await?;
        Ok(is_free(&interval, &busy))
    }

    /// Slots of the same length near `interval`
    pub async fn propose_alternatives(
        &self,
        interval: TimeInterval,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeInterval>, CalendarError> {
        let busy = self.load_busy(self.search_range(&interval)).await?;
        Ok(self.alternatives(&interval, &busy, now))
    }

    async fn load_busy(&self, range: TimeInterval) -> Result<BusySet, CalendarError> {
        match tokio::time::timeout(self.policy.busy_timeout, self.calendar.list_busy(range)).await {
            Ok(result) => result,
            Err(_) => Err(CalendarError::Upstream(format!(
                "busy-time lookup timed out after {:?}",
                self.policy.busy_timeout
            ))),
        }
    }

    /// Range read from the calendar: the search window around `requested`
    fn search_range(&self, requested: &TimeInterval) -> TimeInterval {
        let start = requested.start() - self.policy.search_window;
        let end = requested.end() + self.policy.search_window;
        TimeInterval::new(start, end).unwrap_or(*requested)
    }

    fn alternatives(
        &self,
        requested: &TimeInterval,
        busy: &BusySet,
        now: DateTime<Utc>,
    ) -> Vec<TimeInterval> {
        let range = self.search_range(requested);
        let window_start = range.start().max(next_slot_boundary(now));
        let off_hours =
            self.policy
                .working_hours
                .off_hours(self.policy.tz, window_start, range.end());
        let busy = BusySet::from_intervals(busy.iter().copied().chain(off_hours));
        suggest_alternatives(
            requested,
            &busy,
            window_start,
            range.end(),
            self.policy.max_suggestions,
        )
    }

    fn conflict(
        &self,
        state: &mut WorkflowState,
        requested: &TimeInterval,
        alternatives: Vec<TimeInterval>,
    ) -> BookingResult {
        transition(state, WorkflowState::Conflict, requested);
        info!(
            "Booking conflict for {}: {} alternatives",
            requested,
            alternatives.len()
        );
        BookingResult::Conflict { alternatives }
    }

    fn fail(
        &self,
        state: &mut WorkflowState,
        requested: &TimeInterval,
        e: CalendarError,
    ) -> BookingResult {
        let from = *state;
        transition(state, WorkflowState::Failed, requested);
        if from == WorkflowState::Booking {
            error!("Booking failed while writing {}: {}", requested, e);
        } else {
            warn!("Booking failed for {}: {}", requested, e);
        }
        BookingResult::Failed {
            reason: e.to_string(),
        }
    }
}

fn transition(state: &mut WorkflowState, next: WorkflowState, requested: &TimeInterval) {
    debug!("Workflow {}: {} -> {}", requested, state, next);
    *state = next;
}

/// `now` rounded up to the slot granularity
fn next_slot_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let step = Duration::minutes(SLOT_GRANULARITY_MINUTES);
    match now.duration_trunc(step) {
        Ok(floor) if floor == now => now,
        Ok(floor) => floor + step,
        Err(_) => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_slot_boundary() {
        let at = |h, m, s| Utc.with_ymd_and_hms(2030, 3, 4, h, m, s).unwrap();
        assert_eq!(next_slot_boundary(at(9, 0, 0)), at(9, 0, 0));
        assert_eq!(next_slot_boundary(at(9, 0, 1)), at(9, 15, 0));
        assert_eq!(next_slot_boundary(at(9, 44, 59)), at(9, 45, 0));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = WorkflowPolicy::from_config(&BookingConfig {
            search_window_days: 2,
            max_suggestions: 3,
            timezone: "Europe/Berlin".to_string(),
            working_hours: "08:00-12:30".to_string(),
            ..BookingConfig::default()
        })
        .unwrap()
        .with_busy_timeout(StdDuration::from_millis(250));
        assert_eq!(policy.search_window, Duration::days(2));
        assert_eq!(policy.max_suggestions, 3);
        assert_eq!(policy.busy_timeout, StdDuration::from_millis(250));
        assert_eq!(policy.tz, chrono_tz::Europe::Berlin);
        assert_eq!(policy.working_hours.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(policy.working_hours.end, NaiveTime::from_hms_opt(12, 30, 0).unwrap());

        let bad = BookingConfig {
            working_hours: "night".to_string(),
            ..BookingConfig::default()
        };
        assert!(WorkflowPolicy::from_config(&bad).is_err());
    }

    #[test]
    fn test_default_working_hours_match_config() {
        let (start, end) = BookingConfig::default().working_hours().unwrap();
        assert_eq!(WorkingHours::default(), WorkingHours { start, end });
    }

    #[test]
    fn test_off_hours_in_zone() {
        let at = |d, h, m| Utc.with_ymd_and_hms(2030, 3, d, h, m, 0).unwrap();
        // 09:00-17:00 IST is 03:30-11:30 UTC
        let off = WorkingHours::default().off_hours(chrono_tz::Asia::Kolkata, at(4, 0, 0), at(5, 0, 0));
        assert_eq!(
            off,
            vec![
                TimeInterval::new(at(4, 0, 0), at(4, 3, 30)).unwrap(),
                TimeInterval::new(at(4, 11, 30), at(5, 0, 0)).unwrap(),
            ]
        );

        // a window inside the working day has no off hours
        let off = WorkingHours::default().off_hours(Tz::UTC, at(4, 10, 0), at(4, 12, 0));
        assert!(off.is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WorkflowState::Checking.to_string(), "checking");
        assert_eq!(WorkflowState::Confirmed.to_string(), "confirmed");
    }
}
