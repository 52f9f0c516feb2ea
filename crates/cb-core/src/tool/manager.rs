//! Tool manager for registering and executing tools

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::llm::ToolDefinition;
use crate::tool::{Tool, ToolResult};

/// Manager for registered tools
///
/// Tools are kept sorted by name so the definitions sent to the model are
/// stable from one request to the next.
#[derive(Default)]
pub struct ToolManager {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolManager {
    /// Create a new empty tool manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all registered tool definitions
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect()
    }

    /// Execute a tool by name.
    ///
    /// Never fails: an unknown tool or a tool error becomes an error result
    /// that is handed back to the model.
    pub async fn execute(&self, name: &str, input: JsonValue) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!("Model requested unknown tool: {}", name);
            return ToolResult::error(format!("Unknown tool: {}", name));
        };

        match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                ToolResult::error(format!("Tool execution error: {}", e))
            }
        }
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if no tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedTool {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        fn input_schema(&self) -> JsonValue {
            json!({"type": "object"})
        }

        async fn execute(&self, _input: JsonValue) -> Result<ToolResult> {
            if self.fail {
                Err(Error::ToolExecution("boom".to_string()))
            } else {
                Ok(ToolResult::success("ok"))
            }
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(FixedTool { name: "b_tool", fail: false }));
        manager.register(Arc::new(FixedTool { name: "a_tool", fail: true }));

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.tool_names(), vec!["a_tool", "b_tool"]);
        assert!(manager.contains("a_tool"));

        let ok = manager.execute("b_tool", json!({})).await;
        assert_eq!(ok, ToolResult::success("ok"));

        let failed = manager.execute("a_tool", json!({})).await;
        assert!(failed.is_error);
        assert!(failed.output.contains("boom"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let manager = ToolManager::new();
        assert!(manager.is_empty());
        let result = manager.execute("nope", json!({})).await;
        assert!(result.is_error);
        assert_eq!(result.output, "Unknown tool: nope");
    }

    #[test]
    fn test_definitions_sorted() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(FixedTool { name: "zeta", fail: false }));
        manager.register(Arc::new(FixedTool { name: "alpha", fail: false }));
        let names: Vec<_> = manager.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
