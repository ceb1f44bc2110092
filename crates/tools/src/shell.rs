//! Shell tool: run a command under the POSIX shell in the workspace.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

use crate::{Tool, ToolResult};

/// Combined stdout+stderr cap.
const MAX_OUTPUT: usize = 128 * 1024;

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Shell command to execute"}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: &Value, workspace: &Path) -> ToolResult {
        let Some(command) = input["command"].as_str() else {
            return ToolResult::error("Error: missing 'command' parameter");
        };

        info!(command, "shell");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workspace)
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => return ToolResult::error(format!("Error: failed to spawn shell: {e}")),
        };

        let exit_code = output.status.code().unwrap_or(-1);

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.len() > MAX_OUTPUT {
            let mut cut = MAX_OUTPUT;
            while !combined.is_char_boundary(cut) {
                cut -= 1;
            }
            combined.truncate(cut);
        }

        ToolResult {
            success: exit_code == 0,
            output: format!("[exit {exit_code}]\n{combined}"),
        }
    }
}
