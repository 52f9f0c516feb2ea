//! Intent validation
//!
//! Whatever the model (or the rule-based extractor) claims the user wants is
//! checked here before anything reaches the calendar.

use std::collections::BTreeSet;

use cb_calendar::TimeInterval;
use cb_core::BookingConfig;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{IntentError, Result};
use crate::request::BookingRequest;

/// Accepted forms for timestamps without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Requests may start this far in the past (clock skew, slow typing)
const PAST_TOLERANCE_MINUTES: i64 = 1;

/// An unvalidated booking intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawIntent {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl RawIntent {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Turns [`RawIntent`]s into [`BookingRequest`]s
#[derive(Debug, Clone)]
pub struct IntentValidator {
    tz: Tz,
    horizon: Duration,
    max_duration: Duration,
    default_title: String,
}

impl IntentValidator {
    pub fn new(tz: Tz) -> Self {
        let defaults = BookingConfig::default();
        Self {
            tz,
            horizon: Duration::days(i64::from(defaults.horizon_days)),
            max_duration: Duration::minutes(i64::from(defaults.max_duration_minutes)),
            default_title: defaults.default_title,
        }
    }

    pub fn from_config(config: &BookingConfig) -> Result<Self> {
        Ok(Self {
            tz: config.tz()?,
            horizon: Duration::days(i64::from(config.horizon_days)),
            max_duration: Duration::minutes(i64::from(config.max_duration_minutes)),
            default_title: config.default_title.clone(),
        })
    }

    /// Zone used for timestamps without an offset
    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn default_title(&self) -> &str {
        &self.default_title
    }

    /// Parse one timestamp; naive values are read in the configured zone.
    pub fn parse_timestamp(&self, value: &str, field: &str) -> std::result::Result<DateTime<Utc>, IntentError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(IntentError::invalid(format!("{} time is missing", field)));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.with_timezone(&Utc));
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .ok_or_else(|| {
                IntentError::invalid(format!(
                    "could not understand {} time '{}'; use a format like 2030-03-04T15:00",
                    field, value
                ))
            })?;

        // ambiguous local times (DST fall-back) take the earlier instant
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                IntentError::invalid(format!(
                    "{} time {} does not exist in {}",
                    field, naive, self.tz
                ))
            })
    }

    /// Validate only the time range of an intent
    pub fn validate_interval(
        &self,
        start: &str,
        end: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<TimeInterval, IntentError> {
        let start = self.parse_timestamp(start, "start")?;
        let end = self.parse_timestamp(end, "end")?;

        let interval = TimeInterval::new(start, end)
            .map_err(|_| IntentError::invalid("the end time must be after the start time"))?;

        if start < now - Duration::minutes(PAST_TOLERANCE_MINUTES) {
            return Err(IntentError::invalid("that time is in the past"));
        }
        if start > now + self.horizon {
            return Err(IntentError::invalid(format!(
                "that is too far ahead; bookings are possible up to {} days out",
                self.horizon.num_days()
            )));
        }
        if interval.duration() > self.max_duration {
            return Err(IntentError::invalid(format!(
                "appointments can be at most {} minutes long",
                self.max_duration.num_minutes()
            )));
        }

        Ok(interval)
    }

    pub fn validate(
        &self,
        raw: &RawIntent,
        now: DateTime<Utc>,
    ) -> std::result::Result<BookingRequest, IntentError> {
        let requested = self.validate_interval(&raw.start, &raw.end, now)?;

        let title = raw
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.default_title.as_str())
            .to_string();

        let mut attendees = BTreeSet::new();
        for attendee in raw.attendees.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            if !attendee.contains('@') || attendee.starts_with('@') || attendee.ends_with('@') {
                return Err(IntentError::invalid(format!(
                    "'{}' is not an email address",
                    attendee
                )));
            }
            attendees.insert(attendee.to_lowercase());
        }

        Ok(BookingRequest {
            requested,
            title,
            attendees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap()
    }

    fn utc() -> IntentValidator {
        IntentValidator::new(Tz::UTC)
    }

    #[test]
    fn test_valid_intent() {
        let raw = RawIntent {
            start: "2030-03-04T10:00:00Z".to_string(),
            end: "2030-03-04T10:30:00Z".to_string(),
            title: Some("  Dentist ".to_string()),
            attendees: vec![
                "Pat@Example.com".to_string(),
                "pat@example.com".to_string(),
                " ".to_string(),
            ],
        };
        let request = utc().validate(&raw, now()).unwrap();
        assert_eq!(request.title, "Dentist");
        assert_eq!(request.requested.duration(), Duration::minutes(30));
        assert_eq!(request.attendees.len(), 1);
        assert!(request.attendees.contains("pat@example.com"));
    }

    #[test]
    fn test_start_equal_to_end_is_invalid() {
        let raw = RawIntent::new("2030-03-04T10:00:00Z", "2030-03-04T10:00:00Z");
        let err = utc().validate(&raw, now()).unwrap_err();
        assert!(matches!(err, IntentError::InvalidIntent(_)));
        assert!(err.message().contains("after the start"));
    }

    #[test]
    fn test_missing_and_garbage() {
        assert!(utc().validate(&RawIntent::new("", "2030-03-04T10:00"), now()).is_err());
        let err = utc()
            .validate(&RawIntent::new("next tuesday-ish", "2030-03-04T10:00"), now())
            .unwrap_err();
        assert!(err.message().contains("next tuesday-ish"));
    }

    #[test]
    fn test_naive_times_use_configured_zone() {
        let validator = IntentValidator::new(chrono_tz::Asia::Kolkata);
        let request = validator
            .validate(&RawIntent::new("2030-03-04T17:00", "2030-03-04 18:00:00"), now())
            .unwrap();
        assert_eq!(
            request.requested.start(),
            Utc.with_ymd_and_hms(2030, 3, 4, 11, 30, 0).unwrap()
        );
        assert_eq!(request.requested.duration(), Duration::hours(1));

        // explicit offsets win over the zone
        let request = validator
            .validate(&RawIntent::new("2030-03-04T17:00:00Z", "2030-03-04T18:00:00Z"), now())
            .unwrap();
        assert_eq!(request.requested.start(), Utc.with_ymd_and_hms(2030, 3, 4, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_nonexistent_local_time() {
        let validator = IntentValidator::new(chrono_tz::Europe::Berlin);
        // clocks jump from 02:00 to 03:00 on 2030-03-31
        let err = validator
            .validate(&RawIntent::new("2030-03-31T02:30", "2030-03-31T03:30"), now())
            .unwrap_err();
        assert!(err.message().contains("does not exist"));
    }

    #[test]
    fn test_time_window_limits() {
        let v = utc();
        assert!(v.validate(&RawIntent::new("2030-03-01T11:59:30Z", "2030-03-01T12:30:00Z"), now()).is_ok());
        assert!(v.validate(&RawIntent::new("2030-03-01T10:00:00Z", "2030-03-01T11:00:00Z"), now()).is_err());
        assert!(v.validate(&RawIntent::new("2032-03-01T10:00:00Z", "2032-03-01T11:00:00Z"), now()).is_err());
        let err = v
            .validate(&RawIntent::new("2030-03-04T08:00:00Z", "2030-03-04T17:00:00Z"), now())
            .unwrap_err();
        assert!(err.message().contains("480 minutes"));
    }

    #[test]
    fn test_default_title_and_bad_attendee() {
        let v = utc();
        let request = v
            .validate(&RawIntent::new("2030-03-04T10:00", "2030-03-04T11:00").with_title("   "), now())
            .unwrap();
        assert_eq!(request.title, "Appointment");

        let mut raw = RawIntent::new("2030-03-04T10:00", "2030-03-04T11:00");
        raw.attendees = vec!["not-an-email".to_string()];
        assert!(v.validate(&raw, now()).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = BookingConfig {
            timezone: "America/New_York".to_string(),
            default_title: "Meeting".to_string(),
            ..BookingConfig::default()
        };
        let v = IntentValidator::from_config(&config).unwrap();
        assert_eq!(v.tz(), chrono_tz::America::New_York);
        assert_eq!(v.default_title(), "Meeting");

        let bad = BookingConfig {
            timezone: "Mars/Olympus".to_string(),
            ..BookingConfig::default()
        };
        assert!(IntentValidator::from_config(&bad).is_err());
    }
}
