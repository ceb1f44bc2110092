//! File write tool.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::file_read::resolve_path;
use crate::{Tool, ToolResult};

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: &Value, workspace: &Path) -> ToolResult {
        let (Some(path), Some(content)) = (input["path"].as_str(), input["content"].as_str())
        else {
            return ToolResult::error("Error: missing 'path' or 'content'");
        };

        let full = resolve_path(workspace, path);
        if let Some(parent) = full.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ToolResult::error(format!("Error: cannot write {}: {e}", full.display()));
            }
        }

        match fs::write(&full, content).await {
            Ok(()) => {
                info!(path, bytes = content.len(), "file_write");
                ToolResult::ok(format!("Wrote {} bytes to {path}", content.len()))
            }
            Err(e) => ToolResult::error(format!("Error: cannot write {}: {e}", full.display())),
        }
    }
}
