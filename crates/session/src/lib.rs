//! Per-channel conversation logs.
//!
//! A session is an append-only sequence of messages keyed by a
//! channel-prefixed identifier (`cli`, `tg_<chat>`, `ws_<conn>`). Keyed
//! sessions persist to `{workspace}/.cclaw/sessions/{key}.json` and are
//! rehydrated on open; ephemeral sessions (no key) live in memory only.
//!
//! Content blocks are never reordered: a saved file is valid iff it
//! round-trips through [`Session::open`].

use cclaw_core::{Content, ContentBlock, Message, Role, SessionError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct Session {
    messages: Vec<Message>,
    path: Option<PathBuf>,
}

impl Session {
    /// Open a session. With a key, any existing on-disk history is loaded;
    /// a missing or unparsable file starts the session empty.
    pub fn open(workspace: &Path, key: Option<&str>) -> Self {
        let path = key.map(|k| workspace.join(".cclaw").join("sessions").join(format!("{k}.json")));

        let mut session = Self {
            messages: Vec::new(),
            path,
        };

        if let Some(path) = &session.path {
            match fs::read_to_string(path) {
                Ok(raw) => match serde_json::from_str::<Vec<Message>>(&raw) {
                    Ok(messages) => {
                        debug!(key = key.unwrap_or(""), count = messages.len(), "loaded session");
                        session.messages = messages;
                    }
                    Err(e) => warn!(path = %path.display(), "ignoring corrupt session file: {e}"),
                },
                Err(_) => {} // first use
            }
        }

        session
    }

    /// An in-memory session with no backing file.
    pub fn ephemeral() -> Self {
        Self {
            messages: Vec::new(),
            path: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a user message with plain text content.
    pub fn add_user(&mut self, text: &str) {
        self.messages.push(Message::user(text));
    }

    /// Append an assistant message with one text block.
    pub fn add_assistant(&mut self, text: &str) {
        self.messages.push(Message::assistant(text));
    }

    /// Record a tool invocation. If the last message is an assistant block
    /// message, the `tool_use` block is appended to it; otherwise a new
    /// assistant message is created. Unparsable input degrades to an empty
    /// object; the call is never dropped.
    pub fn add_tool_use(&mut self, id: &str, name: &str, input_json: &str) {
        let input = serde_json::from_str(input_json)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
        let block = ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        };

        if let Some(Message {
            role: Role::Assistant,
            content: Content::Blocks(blocks),
        }) = self.messages.last_mut()
        {
            blocks.push(block);
            return;
        }

        self.messages.push(Message {
            role: Role::Assistant,
            content: Content::Blocks(vec![block]),
        });
    }

    /// Record a tool's output as a user message with one `tool_result` block.
    pub fn add_tool_result(&mut self, tool_use_id: &str, output: &str) {
        self.messages.push(Message {
            role: Role::User,
            content: Content::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content: output.to_string(),
            }]),
        });
    }

    /// The JSON array encoding sent to providers.
    pub fn serialize_messages(&self) -> String {
        serde_json::to_string(&self.messages).unwrap_or_else(|_| "[]".into())
    }

    /// Persist the session. Writes a sibling temp file first and renames it
    /// into place so a crash mid-write cannot corrupt the log. Ephemeral
    /// sessions are a no-op.
    pub fn save(&self) -> Result<(), SessionError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let write_err = |reason: String| SessionError::Write {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(&self.messages)
            .map_err(|e| write_err(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| write_err(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| write_err(e.to_string()))?;

        debug!(path = %path.display(), count = self.messages.len(), "saved session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_user_preserves_count_and_order() {
        let mut s = Session::ephemeral();
        for i in 0..5 {
            s.add_user(&format!("msg {i}"));
        }
        assert_eq!(s.len(), 5);
        for (i, msg) in s.messages().iter().enumerate() {
            assert_eq!(msg.role, Role::User);
            assert_eq!(msg.content.text(), format!("msg {i}"));
        }
    }

    #[test]
    fn tool_use_appends_to_trailing_assistant() {
        let mut s = Session::ephemeral();
        s.add_user("do it");
        s.add_tool_use("t1", "shell", r#"{"command":"ls"}"#);
        s.add_tool_use("t2", "shell", r#"{"command":"pwd"}"#);

        assert_eq!(s.len(), 2);
        match &s.messages()[1].content {
            Content::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            _ => panic!("expected blocks"),
        }
    }

    #[test]
    fn tool_use_with_bad_json_keeps_empty_input() {
        let mut s = Session::ephemeral();
        s.add_tool_use("t1", "shell", "{not json");
        match &s.messages()[0].content {
            Content::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolUse { input, .. } => {
                    assert!(input.as_object().unwrap().is_empty());
                }
                _ => panic!("expected tool_use"),
            },
            _ => panic!("expected blocks"),
        }
    }

    #[test]
    fn tool_result_references_prior_tool_use() {
        let mut s = Session::ephemeral();
        s.add_user("run");
        s.add_tool_use("t1", "shell", r#"{"command":"echo hi"}"#);
        s.add_tool_result("t1", "[exit 0]\nhi");

        // Every tool_result id must have a prior tool_use with the same id.
        let mut seen = std::collections::HashSet::new();
        for msg in s.messages() {
            if let Content::Blocks(blocks) = &msg.content {
                for block in blocks {
                    match block {
                        ContentBlock::ToolUse { id, .. } => {
                            seen.insert(id.clone());
                        }
                        ContentBlock::ToolResult { tool_use_id, .. } => {
                            assert!(seen.contains(tool_use_id));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    #[test]
    fn save_and_reopen_roundtrips() {
        let dir = TempDir::new().unwrap();
        let mut s = Session::open(dir.path(), Some("cli"));
        s.add_user("What is 2+2?");
        s.add_assistant("4");
        s.add_tool_use("t1", "shell", r#"{"command":"true"}"#);
        s.add_tool_result("t1", "[exit 0]\n");
        s.save().unwrap();

        let reopened = Session::open(dir.path(), Some("cli"));
        assert_eq!(reopened.len(), s.len());
        assert_eq!(reopened.serialize_messages(), s.serialize_messages());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".cclaw").join("sessions");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("bad.json"), "{{{{").unwrap();

        let s = Session::open(dir.path(), Some("bad"));
        assert!(s.is_empty());
    }

    #[test]
    fn ephemeral_save_is_noop() {
        let mut s = Session::ephemeral();
        s.add_user("hi");
        s.save().unwrap();
    }

    #[test]
    fn session_path_scheme() {
        let dir = TempDir::new().unwrap();
        let mut s = Session::open(dir.path(), Some("tg_42"));
        s.add_user("hello");
        s.save().unwrap();
        assert!(dir
            .path()
            .join(".cclaw")
            .join("sessions")
            .join("tg_42.json")
            .exists());
    }

    #[test]
    fn serialize_messages_is_a_json_array() {
        let mut s = Session::ephemeral();
        s.add_user("hi");
        let parsed: serde_json::Value = serde_json::from_str(&s.serialize_messages()).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["role"], "user");
        assert_eq!(parsed[0]["content"], "hi");
    }
}
