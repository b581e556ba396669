//! Tool trait — the abstraction over agent capabilities.
//!
//! A tool accepts a JSON-shaped input and returns text or fails. Tools are
//! registered in the ToolRegistry under exact names; the reasoning loop
//! looks them up by the name the model emitted and treats a miss as fatal.
//!
//! Tool implementations must be safe to abandon: the loop races each call
//! against a timeout and does not send any cancellation signal, so a
//! timed-out call may still be running after the loop has moved on.

use crate::error::ToolError;
use async_trait::async_trait;
use std::collections::HashMap;

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (rendered into the prompt).
    fn description(&self) -> &str;

    /// Execute the tool with the given JSON arguments, returning text.
    async fn execute(&self, arguments: serde_json::Value)
        -> std::result::Result<String, ToolError>;
}

/// A registry of available tools.
///
/// The loops use this to render the tool catalogue into prompts and to look
/// up and execute tools when the model requests them.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Render the tool catalogue as `- name: description` lines, sorted by
    /// name so the prompt text is deterministic.
    pub fn catalogue(&self) -> String {
        let mut entries: Vec<_> = self.tools.values().collect();
        entries.sort_by_key(|t| t.name());
        entries
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn catalogue_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let catalogue = registry.catalogue();
        assert!(catalogue.contains("- echo: Echoes back the input"));
    }

    #[tokio::test]
    async fn tool_executes_with_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let tool = registry.get("echo").unwrap();
        let out = tool
            .execute(serde_json::json!({"text": "hello world"}))
            .await
            .unwrap();
        assert_eq!(out, "hello world");
    }
}
