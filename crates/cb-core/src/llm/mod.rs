//! LLM API client and types
//!
//! Supports both Claude API and OpenAI-compatible APIs (GLM, Gemini, etc.)

mod client;
mod types;

pub use client::{run_agent_loop, AgentLoopResult, ChatModel, LlmClient, TokenUsage, ToolCall};
pub use types::*;
