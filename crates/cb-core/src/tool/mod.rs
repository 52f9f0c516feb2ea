//! Tool system for LLM function calling
//!
//! Tools are registered with a [`ToolManager`], advertised to the model
//! through their JSON schema and executed when the model asks for them.

pub mod manager;
pub mod schema;
pub mod traits;

pub use crate::llm::ToolDefinition;
pub use manager::ToolManager;
pub use schema::SchemaBuilder;
pub use traits::{Tool, ToolResult};
