//! cb-core: Calendar Booking Gateway core library
//!
//! Configuration, the LLM API client with its function-calling loop,
//! and the tool system the booking tools plug into.

pub mod config;
pub mod error;
pub mod llm;
pub mod tool;

pub use config::{BookingConfig, CalendarBackend, CalendarConfig, Config, LlmConfig, LlmProvider};
pub use error::{Error, Result};
pub use llm::{
    run_agent_loop, AgentLoopResult, ChatModel, LlmClient, Message, MessageContent, ToolDefinition,
};
pub use tool::{SchemaBuilder, Tool, ToolManager, ToolResult};
