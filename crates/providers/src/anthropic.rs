//! Anthropic Messages API adapter.
//!
//! - `x-api-key` header authentication plus the `anthropic-version` header
//! - System prompt as a top-level `system` field
//! - Tool definitions passed through as-is (`{name, description, input_schema}`)
//! - Response content is an array of typed blocks; `text` blocks concatenate
//!   into the reply, `tool_use` blocks become tool calls with their input
//!   re-serialized to a string
//! - Streaming via SSE typed events (`content_block_start` /
//!   `content_block_delta` / `content_block_stop` / `message_delta`), with
//!   tool input assembled from `input_json_delta` fragments

use async_trait::async_trait;
use cclaw_core::{ChatResponse, StopReason, ToolCallRequest};
use cclaw_http::{HttpClient, SseAction};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{ChatRequest, Provider, TextSink, NO_RESPONSE};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

pub struct AnthropicProvider {
    http: Arc<HttpClient>,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(http: Arc<HttpClient>, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn build_body(req: &ChatRequest<'_>, stream: bool) -> String {
        let mut body = serde_json::json!({
            "model": req.model,
            "max_tokens": MAX_TOKENS,
            "temperature": req.temperature,
        });

        if stream {
            body["stream"] = Value::Bool(true);
        }
        if !req.system_prompt.is_empty() {
            body["system"] = Value::String(req.system_prompt.to_string());
        }

        // Messages arrive pre-serialized; fall back to a single user message
        // if the caller handed us something unparsable.
        body["messages"] = serde_json::from_str(req.messages_json).unwrap_or_else(|_| {
            serde_json::json!([{"role": "user", "content": req.messages_json}])
        });

        if !req.tools_json.is_empty() {
            if let Ok(tools) = serde_json::from_str::<Value>(req.tools_json) {
                body["tools"] = tools;
            }
        }

        body.to_string()
    }

    fn parse_response(raw: &str) -> ChatResponse {
        let root: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("unparsable provider response: {e}");
                return ChatResponse::error_text("Error: failed to parse provider response");
            }
        };

        if let Some(err) = root.get("error") {
            let msg = err["message"].as_str().unwrap_or("Unknown API error");
            return ChatResponse::error_text(msg);
        }

        let mut resp = ChatResponse::default();

        if let Some(stop) = root["stop_reason"].as_str() {
            resp.stop_reason = StopReason::from_provider(stop);
        }
        resp.input_tokens = root["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
        resp.output_tokens = root["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

        let mut text = String::new();
        if let Some(blocks) = root["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(t) = block["text"].as_str() {
                            text.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        resp.tool_calls.push(ToolCallRequest {
                            id: block["id"].as_str().unwrap_or("").to_string(),
                            name: block["name"].as_str().unwrap_or("").to_string(),
                            input_json: block["input"].to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }
        if !text.is_empty() {
            resp.text = Some(text);
        }

        resp
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, req: ChatRequest<'_>) -> ChatResponse {
        let body = Self::build_body(&req, false);
        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", API_VERSION),
        ];

        debug!(model = req.model, "anthropic chat request");
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
        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", API_VERSION),
        ];

        debug!(model = req.model, "anthropic streaming request");

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
            warn!("anthropic stream failed: {e}");
        }

        let resp = state.finish();
        if resp.text.is_none() && resp.tool_calls.is_empty() {
            return ChatResponse::error_text(NO_RESPONSE);
        }
        resp
    }
}

/// One in-flight tool call being assembled from streamed fragments.
#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    input_json: String,
}

/// Streaming accumulator for the Messages API. Claude emits tool calls
/// serially, so a single pending slot suffices.
#[derive(Debug, Default)]
struct StreamState {
    resp: ChatResponse,
    pending: Option<PendingToolCall>,
}

impl StreamState {
    /// Process one SSE data payload. Returns `false` to abort the stream.
    fn on_event(&mut self, data: &str, on_text: TextSink<'_>) -> bool {
        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return true, // ignore malformed events
        };

        match event["type"].as_str().unwrap_or("") {
            "message_start" => {
                if let Some(tokens) = event["message"]["usage"]["input_tokens"].as_u64() {
                    self.resp.input_tokens = tokens as u32;
                }
            }
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    self.finalize_pending();
                    self.pending = Some(PendingToolCall {
                        id: block["id"].as_str().unwrap_or("").to_string(),
                        name: block["name"].as_str().unwrap_or("").to_string(),
                        input_json: String::new(),
                    });
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta["text"].as_str() {
                            if !on_text(text) {
                                return false;
                            }
                            self.resp.push_text(text);
                        }
                    }
                    "input_json_delta" => {
                        if let (Some(partial), Some(pending)) =
                            (delta["partial_json"].as_str(), self.pending.as_mut())
                        {
                            pending.input_json.push_str(partial);
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => self.finalize_pending(),
            "message_delta" => {
                if let Some(stop) = event["delta"]["stop_reason"].as_str() {
                    self.resp.stop_reason = StopReason::from_provider(stop);
                }
                if let Some(tokens) = event["usage"]["output_tokens"].as_u64() {
                    self.resp.output_tokens = tokens as u32;
                }
            }
            _ => {}
        }

        true
    }

    fn finalize_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.resp.tool_calls.push(ToolCallRequest {
                id: pending.id,
                name: pending.name,
                input_json: pending.input_json,
            });
        }
    }

    /// Close out the stream, flushing a tool call the server never
    /// terminated with `content_block_stop`.
    fn finish(mut self) -> ChatResponse {
        self.finalize_pending();
        self.resp
    }
}
