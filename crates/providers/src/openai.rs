//! OpenAI Chat Completions adapter.
//!
//! Translates between the runtime's Claude-style shapes and the OpenAI wire
//! format:
//! - the system prompt becomes a synthetic leading `{role:"system"}` message
//! - tool definitions `{name, description, input_schema}` become
//!   `{type:"function", function:{name, description, parameters}}`
//! - `finish_reason` maps `stop → end_turn`, `tool_calls → tool_use`, and
//!   passes anything else through
//!
//! Streaming tool calls arrive as indexed deltas whose `arguments` field is
//! a JSON fragment; up to 32 parallel calls are accumulated per index and
//! emitted in index order.

use async_trait::async_trait;
use cclaw_core::{ChatResponse, StopReason, ToolCallRequest};
use cclaw_http::{HttpClient, SseAction};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::{ChatRequest, Provider, TextSink, NO_RESPONSE};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 8192;
const MAX_PARALLEL_TOOL_CALLS: usize = 32;

pub struct OpenAiProvider {
    http: Arc<HttpClient>,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(http: Arc<HttpClient>, api_key: String) -> Self {
        Self { http, api_key }
    }

    /// Anthropic-style tool definitions → OpenAI function-calling format.
    fn convert_tools(tools_json: &str) -> Option<Value> {
        let src: Value = serde_json::from_str(tools_json).ok()?;
        let tools = src.as_array()?;
        if tools.is_empty() {
            return None;
        }

        let converted: Vec<Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t["name"],
                        "description": t["description"],
                        "parameters": t["input_schema"],
                    }
                })
            })
            .collect();
        Some(Value::Array(converted))
    }

    fn build_body(req: &ChatRequest<'_>, stream: bool) -> String {
        let mut messages = Vec::new();
        if !req.system_prompt.is_empty() {
            messages.push(serde_json::json!({"role": "system", "content": req.system_prompt}));
        }
        match serde_json::from_str::<Value>(req.messages_json) {
            Ok(Value::Array(msgs)) => messages.extend(msgs),
            _ => messages.push(serde_json::json!({"role": "user", "content": req.messages_json})),
        }

        let mut body = serde_json::json!({
            "model": req.model,
            "max_tokens": MAX_TOKENS,
            "temperature": req.temperature,
            "messages": messages,
        });
        if stream {
            body["stream"] = Value::Bool(true);
        }
        if let Some(tools) = Self::convert_tools(req.tools_json) {
            body["tools"] = tools;
        }

        body.to_string()
    }

    fn parse_response(raw: &str) -> ChatResponse {
        let root: ApiResponse = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("unparsable OpenAI response: {e}");
                return ChatResponse::error_text("Error: failed to parse provider response");
            }
        };

        if let Some(err) = root.error {
            return ChatResponse::error_text(
                err.message.unwrap_or_else(|| "Unknown API error".into()),
            );
        }

        let mut resp = ChatResponse::default();
        if let Some(usage) = root.usage {
            resp.input_tokens = usage.prompt_tokens;
            resp.output_tokens = usage.completion_tokens;
        }

        let Some(choice) = root.choices.into_iter().next() else {
            return ChatResponse::error_text("Error: no choices in response");
        };

        if let Some(finish) = choice.finish_reason {
            resp.stop_reason = map_finish_reason(&finish);
        }
        if let Some(message) = choice.message {
            if let Some(content) = message.content.filter(|c| !c.is_empty()) {
                resp.text = Some(content);
            }
            for tc in message.tool_calls.unwrap_or_default() {
                resp.tool_calls.push(ToolCallRequest {
                    id: tc.id.unwrap_or_default(),
                    name: tc.function.name.unwrap_or_default(),
                    input_json: tc.function.arguments.unwrap_or_default(),
                });
            }
        }

        resp
    }
}

fn map_finish_reason(finish: &str) -> StopReason {
    match finish {
        "stop" => StopReason::EndTurn,
        "tool_calls" => StopReason::ToolUse,
        other => StopReason::Other(other.to_string()),
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, req: ChatRequest<'_>) -> ChatResponse {
        let body = Self::build_body(&req, false);
        let auth = format!("Bearer {}", self.api_key);
        let headers = [("Authorization", auth.as_str())];

        debug!(model = req.model, "openai chat request");
        let hr = self.http.post_json(API_URL, &body, &headers).await;

        if hr.status == 0 || hr.body.is_empty() {
            return ChatResponse::error_text(NO_RESPONSE);
        }
        let resp = Self::parse_response(&hr.body_str());
        if resp.text.is_none() && resp.tool_calls.is_empty() {
            return ChatResponse::error_text(NO_RESPONSE);
        }
        resp
    }

    async fn chat_stream(&self, req: ChatRequest<'_>, on_text: TextSink<'_>) -> ChatResponse {
        let body = Self::build_body(&req, true);
        let auth = format!("Bearer {}", self.api_key);
        let headers = [("Authorization", auth.as_str())];

        debug!(model = req.model, "openai streaming request");

        let mut state = StreamState::default();
        let result = {
            let mut on_data = |data: &str| {
                if state.on_event(data, &mut *on_text) {
                    SseAction::Continue
                } else {
                    SseAction::Stop
                }
            };
            self.http
                .post_stream(API_URL, &body, &headers, &mut on_data)
                .await
        };

        if let Err(e) = result {
            warn!("openai stream failed: {e}");
        }

        let resp = state.finish();
        if resp.text.is_none() && resp.tool_calls.is_empty() {
            return ChatResponse::error_text(NO_RESPONSE);
        }
        resp
    }
}

/// Accumulator for one indexed tool call streamed across many events.
#[derive(Debug, Default, Clone)]
struct ToolCallSlot {
    id: String,
    name: String,
    arguments: String,
}

/// Streaming state for Chat Completions: text concatenates; tool calls are
/// addressed by `index` into a bounded slot table.
#[derive(Debug, Default)]
struct StreamState {
    resp: ChatResponse,
    slots: Vec<Option<ToolCallSlot>>,
}

impl StreamState {
    fn on_event(&mut self, data: &str, on_text: TextSink<'_>) -> bool {
        let event: StreamEvent = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                trace!(data, "ignoring unparsable stream event: {e}");
                return true;
            }
        };

        if let Some(usage) = event.usage {
            self.resp.input_tokens = usage.prompt_tokens;
            self.resp.output_tokens = usage.completion_tokens;
        }

        let Some(choice) = event.choices.into_iter().next() else {
            return true;
        };

        if let Some(finish) = choice.finish_reason {
            self.resp.stop_reason = map_finish_reason(&finish);
        }

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                if !on_text(&content) {
                    return false;
                }
                self.resp.push_text(&content);
            }
        }

        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let idx = delta.index as usize;
            if idx >= MAX_PARALLEL_TOOL_CALLS {
                continue;
            }
            if self.slots.len() <= idx {
                self.slots.resize(idx + 1, None);
            }
            let slot = self.slots[idx].get_or_insert_with(ToolCallSlot::default);

            if let Some(id) = delta.id {
                slot.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    slot.name = name;
                }
                if let Some(args) = function.arguments {
                    slot.arguments.push_str(&args);
                }
            }
        }

        true
    }

    /// Emit accumulated tool calls in index order.
    fn finish(mut self) -> ChatResponse {
        for slot in self.slots.into_iter().flatten() {
            self.resp.tool_calls.push(ToolCallRequest {
                id: slot.id,
                name: slot.name,
                input_json: slot.arguments,
            });
        }
        self.resp
    }
}

// --- wire types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
