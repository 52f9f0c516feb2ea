//! Calendar client trait

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::busy::BusySet;
use crate::error::Result;
use crate::interval::TimeInterval;
use crate::models::CalendarEvent;

/// Read busy time and write events on one calendar.
///
/// Implementations: [`GoogleCalendarClient`](crate::GoogleCalendarClient)
/// and [`InMemoryCalendar`](crate::InMemoryCalendar).
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Busy intervals intersecting `range`, merged.
    ///
    /// An empty calendar yields an empty [`BusySet`], not an error.
    async fn list_busy(&self, range: TimeInterval) -> Result<BusySet>;

    /// Create an event after re-checking that `interval` is still free.
    ///
    /// Fails with `Conflict` when the slot has been taken. Not idempotent:
    /// each success is a new remote event.
    async fn create_event(
        &self,
        interval: TimeInterval,
        title: &str,
        attendees: &BTreeSet<String>,
    ) -> Result<CalendarEvent>;
}
