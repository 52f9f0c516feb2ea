//! Booking request and result

use std::collections::BTreeSet;

use cb_calendar::TimeInterval;
use serde::{Deserialize, Serialize};

/// A validated request to book one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub requested: TimeInterval,
    pub title: String,
    pub attendees: BTreeSet<String>,
}

impl BookingRequest {
    pub fn new(requested: TimeInterval, title: impl Into<String>) -> Self {
        Self {
            requested,
            title: title.into(),
            attendees: BTreeSet::new(),
        }
    }

    pub fn with_attendees(mut self, attendees: impl IntoIterator<Item = String>) -> Self {
        self.attendees.extend(attendees);
        self
    }
}

/// Outcome of one workflow run.
///
/// Serialized with a `status` tag; this is the shape the model sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookingResult {
    Confirmed {
        event_id: String,
        interval: TimeInterval,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        html_link: Option<String>,
    },
    Conflict {
        alternatives: Vec<TimeInterval>,
    },
    Failed {
        reason: String,
    },
}

impl BookingResult {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Conflict { .. } => "conflict",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_result_serialization() {
        let interval = TimeInterval::new(
            Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 4, 10, 30, 0).unwrap(),
        )
        .unwrap();

        let confirmed = BookingResult::Confirmed {
            event_id: "evt-1".to_string(),
            interval,
            title: "Dentist".to_string(),
            html_link: None,
        };
        assert_eq!(
            serde_json::to_value(&confirmed).unwrap(),
            json!({
                "status": "confirmed",
                "event_id": "evt-1",
                "interval": {"start": "2030-03-04T10:00:00Z", "end": "2030-03-04T10:30:00Z"},
                "title": "Dentist"
            })
        );

        let conflict = BookingResult::Conflict { alternatives: vec![interval] };
        assert_eq!(serde_json::to_value(&conflict).unwrap()["status"], "conflict");
        assert_eq!(conflict.status(), "conflict");
        assert!(!conflict.is_confirmed());
    }

    #[test]
    fn test_attendees_are_a_set() {
        let interval = TimeInterval::new(
            Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 4, 11, 0, 0).unwrap(),
        )
        .unwrap();
        let request = BookingRequest::new(interval, "Sync").with_attendees(vec![
            "b@example.com".to_string(),
            "a@example.com".to_string(),
            "b@example.com".to_string(),
        ]);
        assert_eq!(request.attendees.len(), 2);
        assert_eq!(request.attendees.iter().next().map(String::as_str), Some("a@example.com"));
    }
}
