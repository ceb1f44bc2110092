//! Workspace system prompt assembler.
//!
//! The prompt is built from fixed Safety/Tools sections, the workspace
//! path, a set of well-known project context files injected verbatim, and
//! a date/runtime footer. Missing context files are noted inline so the
//! model knows they were looked for.

use std::fmt::Write as _;
use std::path::Path;

/// Per-file size cap.
const MAX_FILE_SIZE: u64 = 64 * 1024;

const CONTEXT_FILES: &[&str] = &[
    "AGENTS.md",
    "SOUL.md",
    "TOOLS.md",
    "IDENTITY.md",
    "USER.md",
    "HEARTBEAT.md",
    "MEMORY.md",
];

const SAFETY: &str = "## Safety\n\n\
    - Do not exfiltrate private data.\n\
    - Do not run destructive commands without asking.\n\
    - Prefer recoverable operations over destructive ones.\n\
    - When in doubt, ask before acting externally.\n\n";

const TOOLS: &str = "## Tools\n\n\
    You have access to the following tools:\n\n\
    - **shell**: Execute terminal commands\n\
    - **file_read**: Read file contents\n\
    - **file_write**: Write file contents\n\
    - **memory_store**: Save to memory\n\
    - **memory_recall**: Search memory\n\n";

fn read_context_file(workspace: &Path, filename: &str) -> Option<String> {
    let path = workspace.join(filename);
    let meta = std::fs::metadata(&path).ok()?;
    if meta.len() == 0 || meta.len() > MAX_FILE_SIZE {
        return None;
    }
    std::fs::read_to_string(&path).ok()
}

pub fn build_system_prompt(workspace: &Path, model: &str) -> String {
    let mut out = String::with_capacity(4096);

    out.push_str(SAFETY);
    out.push_str(TOOLS);

    let _ = write!(
        out,
        "## Workspace\n\nWorking directory: `{}`\n\n## Project Context\n\n",
        workspace.display()
    );

    for filename in CONTEXT_FILES {
        match read_context_file(workspace, filename) {
            Some(content) => {
                let _ = write!(out, "### {filename}\n\n{content}\n\n");
            }
            None => {
                let _ = write!(out, "### {filename}\n\n[File not found: {filename}]\n\n");
            }
        }
    }

    let now = chrono::Utc::now();
    let _ = write!(
        out,
        "## Current Date & Time\n\nTimezone: UTC\nDate: {}\n\n",
        now.format("%Y-%m-%d %H:%M:%S")
    );

    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".into());
    let _ = write!(
        out,
        "## Runtime\n\nHost: {hostname} | OS: {} {} | Model: {model} | Engine: CClaw (Rust)\n\n",
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn contains_fixed_sections() {
        let dir = TempDir::new().unwrap();
        let prompt = build_system_prompt(dir.path(), "test-model");
        assert!(prompt.contains("## Safety"));
        assert!(prompt.contains("## Tools"));
        assert!(prompt.contains("## Workspace"));
        assert!(prompt.contains("## Current Date & Time"));
        assert!(prompt.contains("Model: test-model"));
    }

    #[test]
    fn injects_present_context_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "Be kind.").unwrap();

        let prompt = build_system_prompt(dir.path(), "m");
        assert!(prompt.contains("### SOUL.md\n\nBe kind."));
    }

    #[test]
    fn notes_missing_context_files() {
        let dir = TempDir::new().unwrap();
        let prompt = build_system_prompt(dir.path(), "m");
        assert!(prompt.contains("[File not found: AGENTS.md]"));
    }

    #[test]
    fn oversized_files_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("USER.md"), "x".repeat(100 * 1024)).unwrap();
        let prompt = build_system_prompt(dir.path(), "m");
        assert!(prompt.contains("[File not found: USER.md]"));
    }
}
