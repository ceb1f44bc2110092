//! Provider-unified chat response types.

use serde::{Deserialize, Serialize};

/// A tool invocation extracted from a provider response.
///
/// The input is kept as a JSON-shaped string: providers stream it in
/// fragments, and final parsing happens at tool dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub input_json: String,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The model finished its reply.
    #[default]
    EndTurn,
    /// The model is waiting on tool results.
    ToolUse,
    /// Any other provider-specific reason, passed through verbatim.
    Other(String),
}

impl StopReason {
    pub fn from_provider(s: &str) -> Self {
        match s {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
            StopReason::Other(s) => s,
        }
    }
}

/// The unified result of one provider round trip.
///
/// Every response carries text, tool calls, or both; failures are folded
/// into `text` by the adapters so callers never see a transport error.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub stop_reason: StopReason,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ChatResponse {
    /// A synthetic response carrying an error as reply text.
    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn num_tools(&self) -> usize {
        self.tool_calls.len()
    }

    /// Append a streamed text delta.
    pub fn push_text(&mut self, delta: &str) {
        match &mut self.text {
            Some(t) => t.push_str(delta),
            None => self.text = Some(delta.to_string()),
        }
    }
}
