//! File read tool.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{Tool, ToolResult};

const MAX_FILE_READ: usize = 512 * 1024;

/// Resolve a tool-supplied path: absolute paths pass through, relative
/// paths are anchored at the workspace.
pub(crate) fn resolve_path(workspace: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        workspace.join(p)
    }
}

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path (relative to workspace)"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: &Value, workspace: &Path) -> ToolResult {
        let Some(path) = input["path"].as_str() else {
            return ToolResult::error("Error: missing 'path'");
        };

        let full = resolve_path(workspace, path);
        match fs::read(&full).await {
            Ok(mut bytes) => {
                bytes.truncate(MAX_FILE_READ);
                ToolResult::ok(String::from_utf8_lossy(&bytes))
            }
            Err(e) => ToolResult::error(format!("Error: cannot read {}: {e}", full.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_relative_to_workspace() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let result = FileReadTool
            .execute(&serde_json::json!({"path": "notes.txt"}), dir.path())
            .await;
        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn absolute_path_passes_through() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("abs.txt");
        std::fs::write(&file, "abs").unwrap();

        let result = FileReadTool
            .execute(
                &serde_json::json!({"path": file.to_str().unwrap()}),
                Path::new("/nonexistent"),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.output, "abs");
    }

    #[tokio::test]
    async fn missing_file_is_a_readable_error() {
        let dir = TempDir::new().unwrap();
        let result = FileReadTool
            .execute(&serde_json::json!({"path": "nope.txt"}), dir.path())
            .await;
        assert!(!result.success);
        assert!(result.output.starts_with("Error: cannot read"));
    }

    #[tokio::test]
    async fn missing_path_parameter() {
        let dir = TempDir::new().unwrap();
        let result = FileReadTool.execute(&serde_json::json!({}), dir.path()).await;
        assert!(!result.success);
        assert!(result.output.contains("missing 'path'"));
    }
}
