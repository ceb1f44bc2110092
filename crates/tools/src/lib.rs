//! Tool dispatch for the CClaw agent runtime.
//!
//! A registry maps tool names to handlers; every execution produces a
//! [`ToolResult`] whose output is always populated, even on failure, so the
//! model can see what went wrong and recover. Tool definitions are emitted
//! in Claude-style format (`{name, description, input_schema}`); the OpenAI
//! adapter translates when needed.

pub mod file_read;
pub mod file_write;
pub mod memory;
pub mod shell;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use memory::{MemoryRecallTool, MemoryStoreTool};
pub use shell::ShellTool;

/// The outcome of one tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// A capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input object.
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: &Value, workspace: &Path) -> ToolResult;
}

/// Name → handler registry. Registration order is preserved in the emitted
/// definitions.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Claude-style definitions array, serialized for the provider request.
    pub fn definitions_json(&self) -> String {
        let defs: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.input_schema(),
                })
            })
            .collect();
        Value::Array(defs).to_string()
    }

    /// Dispatch a call by name. Unknown names and malformed argument JSON
    /// come back as failed results, never errors; the loop continues and
    /// the model sees the message.
    pub async fn execute(&self, name: &str, input_json: &str, workspace: &Path) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(tool = name, "unknown tool requested");
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        let input: Value = match serde_json::from_str(input_json) {
            Ok(v) => v,
            Err(_) => return ToolResult::error("Error: invalid JSON input"),
        };

        tool.execute(&input, workspace).await
    }
}

/// The built-in tool set: shell, file_read, file_write.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ShellTool));
    registry.register(Box::new(FileReadTool));
    registry.register(Box::new(FileWriteTool));
    registry
}
