//! In-memory calendar backend

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::availability::is_free;
use crate::busy::BusySet;
use crate::client::CalendarClient;
use crate::error::{CalendarError, Result};
use crate::interval::TimeInterval;
use crate::models::CalendarEvent;

/// Process-local calendar.
///
/// The re-check and the insert of `create_event` happen under one lock, so
/// two concurrent bookings of the same slot cannot both succeed.
#[derive(Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<CalendarEvent>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    /// Seed a busy block without going through the availability check
    pub async fn block(&self, interval: TimeInterval, title: &str) -> CalendarEvent {
        let event = new_event(interval, title, &BTreeSet::new());
        self.events.lock().await.push(event.clone());
        event
    }

    /// Snapshot of all stored events
    pub async fn events(&self) -> Vec<CalendarEvent> {
        self.events.lock().await.clone()
    }
}

fn new_event(interval: TimeInterval, title: &str, attendees: &BTreeSet<String>) -> CalendarEvent {
    CalendarEvent {
        id: Uuid::new_v4().to_string(),
        interval,
        title: title.to_string(),
        description: None,
        attendees: attendees.iter().cloned().collect(),
        html_link: None,
    }
}

fn busy_within(events: &[CalendarEvent], range: &TimeInterval) -> BusySet {
    events
        .iter()
        .map(|e| e.interval)
        .filter(|i| i.overlaps(range))
        .collect()
}

#[async_trait]
impl CalendarClient for InMemoryCalendar {
    async fn list_busy(&self, range: TimeInterval) -> Result<BusySet> {
        let events = self.events.lock().await;
        let busy = busy_within(&events, &range);
        debug!("In-memory calendar: {} busy intervals in {}", busy.len(), range);
        Ok(busy)
    }

    async fn create_event(
        &self,
        interval: TimeInterval,
        title: &str,
        attendees: &BTreeSet<String>,
    ) -> Result<CalendarEvent> {
        let mut events = self.events.lock().await;
        if !is_free(&interval, &busy_within(&events, &interval)) {
            return Err(CalendarError::Conflict(format!("{} is no longer free", interval)));
        }

        let event = new_event(interval, title, attendees);
        events.push(event.clone());
        info!("In-memory calendar: created event {} at {}", event.id, interval);
        Ok(event)
    }
}
