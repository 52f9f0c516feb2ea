//! Error types for cb-agent

use cb_calendar::CalendarError;
use thiserror::Error;

/// An intent that cannot become a booking request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),
}

impl IntentError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidIntent(message.into())
    }

    /// The human-readable part, without the prefix
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidIntent(message) => message,
        }
    }
}

/// cb-agent error type
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Core(#[from] cb_core::Error),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;
