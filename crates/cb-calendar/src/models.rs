//! Calendar data models

use serde::{Deserialize, Serialize};

use crate::interval::TimeInterval;

/// An event as written to (or read back from) the calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub interval: TimeInterval,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Link to the event in the calendar's web UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}
