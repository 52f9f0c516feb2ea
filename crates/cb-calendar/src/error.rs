//! Error types for cb-calendar

use thiserror::Error;

/// cb-calendar error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Transport, authentication or timeout failure talking to the calendar
    #[error("Calendar service unavailable: {0}")]
    Upstream(String),

    /// A write lost a race: the slot was taken by someone else
    #[error("Slot already taken: {0}")]
    Conflict(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Upstream(format!("request timed out: {}", e))
        } else {
            Self::Upstream(e.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CalendarError>;
