//! Error types for cb-core

use thiserror::Error;

/// Main error type for cb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure happened talking to a remote service
    /// (transport, auth, timeout or an error status from the LLM API).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::LlmApi(_) | Self::Http(_))
    }
}

/// Result type alias for cb-core
pub type Result<T> = std::result::Result<T, Error>;
