//! The agent loop: prompt → provider → tools → prompt, bounded per turn.
//!
//! The provider is the state machine; the loop honors its directives until
//! it stops asking for tools. A hard iteration cap prevents runaway spending
//! on cyclic tool use. The loop cannot fail: provider errors arrive as
//! synthetic text, tool errors as failed results the model can react to.

use cclaw_providers::{ChatRequest, Provider, TextSink};
use cclaw_session::Session;
use cclaw_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Provider calls per user turn.
const MAX_TURNS: usize = 10;

/// Read-only context shared by every channel: the selected provider, the
/// tool registry, and the prompt/tool definitions assembled at startup.
pub struct AgentContext {
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub system_prompt: String,
    pub tools_json: String,
    pub model: String,
    pub temperature: f32,
    pub workspace: PathBuf,
}

impl AgentContext {
    /// Run one user turn against a session. With a text sink, model text is
    /// forwarded as it streams; tool calls are always accumulated silently
    /// and executed after each response completes.
    ///
    /// Returns the turn's final reply, or, if the iteration cap was hit,
    /// the most recent text the model produced alongside its tool calls
    /// (possibly empty).
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_msg: &str,
        mut on_text: Option<TextSink<'_>>,
    ) -> String {
        session.add_user(user_msg);

        let mut final_text: Option<String> = None;

        for turn in 0..MAX_TURNS {
            let messages_json = session.serialize_messages();
            let req = ChatRequest {
                model: &self.model,
                system_prompt: &self.system_prompt,
                messages_json: &messages_json,
                tools_json: &self.tools_json,
                temperature: self.temperature,
            };

            let resp = match on_text.as_mut() {
                Some(sink) => self.provider.chat_stream(req, &mut **sink).await,
                None => self.provider.chat(req).await,
            };

            debug!(
                turn,
                input_tokens = resp.input_tokens,
                output_tokens = resp.output_tokens,
                stop = resp.stop_reason.as_str(),
                tools = resp.num_tools(),
                "provider response"
            );

            if resp.num_tools() > 0 {
                for call in &resp.tool_calls {
                    session.add_tool_use(&call.id, &call.name, &call.input_json);

                    let result = self
                        .tools
                        .execute(&call.name, &call.input_json, &self.workspace)
                        .await;

                    debug!(
                        tool = %call.name,
                        success = result.success,
                        bytes = result.output.len(),
                        "tool executed"
                    );

                    session.add_tool_result(&call.id, &result.output);
                }

                // Text alongside tool calls becomes the fallback reply if the
                // model never sends a pure-text final.
                if resp.text.is_some() {
                    final_text = resp.text;
                }
                continue;
            }

            if let Some(text) = resp.text {
                session.add_assistant(&text);
                final_text = Some(text);
            }
            break;
        }

        if let Err(e) = session.save() {
            warn!("failed to save session: {e}");
        }

        final_text.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cclaw_core::{ChatResponse, Content, ContentBlock, Role, StopReason, ToolCallRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted provider: returns canned responses in order, repeating the
    /// last one when the script runs out.
    struct StubProvider {
        script: Mutex<Vec<ChatResponse>>,
        calls: AtomicUsize,
        stream_text: bool,
    }

    impl StubProvider {
        fn new(script: Vec<ChatResponse>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                stream_text: false,
            }
        }

        fn next(&self) -> ChatResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn chat(&self, _req: ChatRequest<'_>) -> ChatResponse {
            self.next()
        }

        async fn chat_stream(&self, _req: ChatRequest<'_>, on_text: TextSink<'_>) -> ChatResponse {
            let resp = self.next();
            if self.stream_text {
                if let Some(text) = &resp.text {
                    for ch in text.chars() {
                        if !on_text(&ch.to_string()) {
                            break;
                        }
                    }
                }
            }
            resp
        }
    }

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            text: Some(text.into()),
            stop_reason: StopReason::EndTurn,
            ..Default::default()
        }
    }

    fn tool_response(id: &str, name: &str, input: &str) -> ChatResponse {
        ChatResponse {
            tool_calls: vec![ToolCallRequest {
                id: id.into(),
                name: name.into(),
                input_json: input.into(),
            }],
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        }
    }

    fn context(provider: StubProvider, workspace: PathBuf) -> (AgentContext, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        let tools = Arc::new(cclaw_tools::default_registry());
        let ctx = AgentContext {
            provider: provider.clone(),
            tools: tools.clone(),
            system_prompt: "test".into(),
            tools_json: tools.definitions_json(),
            model: "stub-model".into(),
            temperature: 0.7,
            workspace,
        };
        (ctx, provider)
    }

    #[tokio::test]
    async fn one_shot_without_tools() {
        let dir = TempDir::new().unwrap();
        let (ctx, provider) = context(
            StubProvider::new(vec![text_response("4")]),
            dir.path().to_path_buf(),
        );

        let mut session = Session::ephemeral();
        let reply = ctx.run_turn(&mut session, "What is 2+2?", None).await;

        assert_eq!(reply, "4");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(session.messages()[0].content.text(), "What is 2+2?");
        assert_eq!(session.messages()[1].role, Role::Assistant);
        assert_eq!(session.messages()[1].content.text(), "4");
    }

    #[tokio::test]
    async fn tool_roundtrip_feeds_result_back() {
        let dir = TempDir::new().unwrap();
        let (ctx, provider) = context(
            StubProvider::new(vec![
                tool_response("t1", "shell", r#"{"command":"echo hi"}"#),
                text_response("hi"),
            ]),
            dir.path().to_path_buf(),
        );

        let mut session = Session::ephemeral();
        let reply = ctx.run_turn(&mut session, "say hi via shell", None).await;

        assert_eq!(reply, "hi");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        // user, assistant(tool_use), user(tool_result), assistant(text)
        assert_eq!(session.len(), 4);

        match &session.messages()[1].content {
            Content::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolUse { id, name, .. } => {
                    assert_eq!(id, "t1");
                    assert_eq!(name, "shell");
                }
                _ => panic!("expected tool_use"),
            },
            _ => panic!("expected blocks"),
        }

        match &session.messages()[2].content {
            Content::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { tool_use_id, content } => {
                    assert_eq!(tool_use_id, "t1");
                    assert!(content.starts_with("[exit 0]\nhi"));
                }
                _ => panic!("expected tool_result"),
            },
            _ => panic!("expected blocks"),
        }
    }

    #[tokio::test]
    async fn iteration_cap_bounds_provider_calls() {
        let dir = TempDir::new().unwrap();
        let (ctx, provider) = context(
            StubProvider::new(vec![tool_response("t", "shell", r#"{"command":"true"}"#)]),
            dir.path().to_path_buf(),
        );

        let mut session = Session::ephemeral();
        let reply = ctx.run_turn(&mut session, "loop forever", None).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 10);
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn partial_text_survives_the_cap() {
        let dir = TempDir::new().unwrap();
        let mut looping = tool_response("t", "shell", r#"{"command":"true"}"#);
        looping.text = Some("working on it".into());
        let (ctx, _) = context(StubProvider::new(vec![looping]), dir.path().to_path_buf());

        let mut session = Session::ephemeral();
        let reply = ctx.run_turn(&mut session, "go", None).await;
        assert_eq!(reply, "working on it");
    }

    #[tokio::test]
    async fn unknown_tool_result_is_recorded_and_loop_continues() {
        let dir = TempDir::new().unwrap();
        let (ctx, provider) = context(
            StubProvider::new(vec![
                tool_response("t1", "no_such_tool", "{}"),
                text_response("recovered"),
            ]),
            dir.path().to_path_buf(),
        );

        let mut session = Session::ephemeral();
        let reply = ctx.run_turn(&mut session, "try", None).await;

        assert_eq!(reply, "recovered");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        match &session.messages()[2].content {
            Content::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { content, .. } => {
                    assert_eq!(content, "Unknown tool: no_such_tool");
                }
                _ => panic!("expected tool_result"),
            },
            _ => panic!("expected blocks"),
        }
    }

    #[tokio::test]
    async fn streaming_forwards_deltas_to_sink() {
        let dir = TempDir::new().unwrap();
        let mut provider = StubProvider::new(vec![text_response("hey")]);
        provider.stream_text = true;
        let (ctx, _) = context(provider, dir.path().to_path_buf());

        let mut session = Session::ephemeral();
        let mut seen = String::new();
        let mut sink = |t: &str| {
            seen.push_str(t);
            true
        };
        let reply = ctx.run_turn(&mut session, "hi", Some(&mut sink)).await;

        assert_eq!(reply, "hey");
        assert_eq!(seen, "hey");
    }

    #[tokio::test]
    async fn keyed_session_is_saved_after_turn() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(
            StubProvider::new(vec![text_response("saved")]),
            dir.path().to_path_buf(),
        );

        let mut session = Session::open(dir.path(), Some("cli"));
        ctx.run_turn(&mut session, "persist me", None).await;

        let reloaded = Session::open(dir.path(), Some("cli"));
        assert_eq!(reloaded.len(), 2);
    }
}
