//! Tool trait definition
//!
//! Defines the core trait for implementing tools that can be
//! executed by LLM function calling.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::Result;

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Output string from tool execution
    pub output: String,
    /// Whether the execution resulted in an error
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create a successful result carrying a JSON document
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::success(serde_json::to_string(value)?))
    }

    /// Create an error tool result
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

/// Tool trait for LLM function calling
///
/// The input is whatever the model produced; implementations must treat
/// it as untrusted and validate it before acting on it.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name (used in tool definitions)
    fn name(&self) -> &str;

    /// Get the tool description (shown to the model when selecting tools)
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's input parameters
    fn input_schema(&self) -> JsonValue;

    /// Execute the tool with the given input
    async fn execute(&self, input: JsonValue) -> Result<ToolResult>;
}
