//! Provider adapters for the CClaw agent runtime.
//!
//! Two back-ends share one surface: the Claude-style Messages API and the
//! OpenAI-style Chat Completions API, both emitting a unified
//! [`ChatResponse`]. The adapter is selected once at startup; the agent
//! loop never inspects provider names per turn.
//!
//! Every failure (transport, parse, API error) is folded into a synthetic
//! text response, so callers are infallible by construction.

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use cclaw_core::ChatResponse;
use cclaw_http::HttpClient;
use std::sync::Arc;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Reply text synthesized when the transport produced nothing.
pub(crate) const NO_RESPONSE: &str = "Error: no response from provider";

/// One provider round trip's worth of inputs. Messages and tool definitions
/// travel as pre-serialized JSON; the adapters parse and reshape them.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub messages_json: &'a str,
    pub tools_json: &'a str,
    pub temperature: f32,
}

/// Callback receiving streamed text deltas. Returning `false` aborts the
/// stream (used to honor the shutdown token mid-reply).
pub type TextSink<'a> = &'a mut (dyn FnMut(&str) -> bool + Send);

/// The capability surface both adapters implement.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Blocking round trip: returns the complete response.
    async fn chat(&self, req: ChatRequest<'_>) -> ChatResponse;

    /// Streaming round trip: invokes `on_text` as model text arrives, then
    /// returns the fully assembled response (tool calls included).
    async fn chat_stream(&self, req: ChatRequest<'_>, on_text: TextSink<'_>) -> ChatResponse;
}

/// Select the adapter named in configuration. Anything other than `openai`
/// resolves to the Anthropic adapter.
pub fn select(provider: &str, http: Arc<HttpClient>, api_key: String) -> Arc<dyn Provider> {
    if provider == "openai" {
        Arc::new(OpenAiProvider::new(http, api_key))
    } else {
        Arc::new(AnthropicProvider::new(http, api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_name() {
        let http = Arc::new(HttpClient::new().unwrap());
        assert_eq!(select("openai", http.clone(), "k".into()).name(), "openai");
        assert_eq!(select("anthropic", http.clone(), "k".into()).name(), "anthropic");
        // Unknown names fall back to the default adapter.
        assert_eq!(select("something", http, "k".into()).name(), "anthropic");
    }
}
