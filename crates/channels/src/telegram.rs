//! Telegram bot channel via long-polling.
//!
//! Protocol: HTTPS to `https://api.telegram.org/bot<token>/<method>`.
//! `getUpdates?timeout=30&offset=<n>` polls; updates are acknowledged by
//! advancing the offset to `max(update_id) + 1`. Replies go out as
//! Markdown `sendMessage` calls, preceded by a typing indicator.

use cclaw_agent::AgentContext;
use cclaw_core::Shutdown;
use cclaw_http::HttpClient;
use cclaw_session::Session;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const API_BASE: &str = "https://api.telegram.org/bot";
const RETRY_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    /// Comma-separated ids and/or usernames. Empty or `*` allows all.
    pub allowed: String,
}

/// One inbound text message extracted from an update batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub from_id: i64,
    pub username: String,
    pub text: String,
}

// --- getUpdates wire types ---

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    #[serde(default)]
    text: Option<String>,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

/// Allow-list check: empty list or `*` allows everyone; otherwise the
/// sender's numeric id or username must appear.
pub fn is_user_allowed(allowed: &str, from_id: i64, username: &str) -> bool {
    if allowed.trim().is_empty() {
        return true;
    }
    let id_str = from_id.to_string();
    allowed
        .split(',')
        .map(str::trim)
        .any(|entry| entry == "*" || entry == id_str || (!username.is_empty() && entry == username))
}

/// Parse a getUpdates body: returns the advanced offset and the extracted
/// text messages. A malformed or `ok:false` body leaves the offset alone.
pub fn parse_updates(body: &str, offset: i64) -> (i64, Vec<IncomingMessage>) {
    let parsed: UpdatesResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            warn!("unparsable Telegram response: {e}");
            return (offset, Vec::new());
        }
    };
    if !parsed.ok {
        warn!("Telegram API returned ok=false");
        return (offset, Vec::new());
    }

    let mut next_offset = offset;
    let mut messages = Vec::new();

    for update in parsed.result {
        if update.update_id + 1 > next_offset {
            next_offset = update.update_id + 1;
        }
        let Some(message) = update.message else { continue };
        let Some(text) = message.text else { continue };

        let (from_id, username) = message
            .from
            .map(|f| (f.id, f.username.unwrap_or_default()))
            .unwrap_or((0, String::new()));

        messages.push(IncomingMessage {
            chat_id: message.chat.id,
            from_id,
            username,
            text,
        });
    }

    (next_offset, messages)
}

pub struct TelegramChannel {
    http: Arc<HttpClient>,
    config: TelegramConfig,
}

impl TelegramChannel {
    pub fn new(http: Arc<HttpClient>, config: TelegramConfig) -> Self {
        Self { http, config }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}{}/{method}", self.config.token)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> bool {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        })
        .to_string();

        let resp = self
            .http
            .post_json(&self.method_url("sendMessage"), &body, &[])
            .await;
        if !resp.is_ok() {
            warn!(status = resp.status, "Telegram send failed");
        }
        resp.is_ok()
    }

    pub async fn send_typing(&self, chat_id: i64) {
        let body = serde_json::json!({"chat_id": chat_id, "action": "typing"}).to_string();
        let _ = self
            .http
            .post_json(&self.method_url("sendChatAction"), &body, &[])
            .await;
    }

    /// Long-poll loop: each allowed text message runs a non-streaming agent
    /// turn against the chat's own session, and the reply is sent back as
    /// Markdown. Runs until the shutdown token fires.
    pub async fn poll_loop(&self, agent: &AgentContext, shutdown: Shutdown) {
        info!("Telegram long-polling started");
        let mut offset: i64 = 0;

        while !shutdown.is_shutdown() {
            let url = format!(
                "{}?timeout=30&offset={offset}",
                self.method_url("getUpdates")
            );

            let resp = tokio::select! {
                resp = self.http.get(&url, &[]) => resp,
                _ = shutdown.cancelled() => break,
            };

            if resp.status == 0 || resp.body.is_empty() {
                warn!("Telegram poll: no response, retrying");
                tokio::time::sleep(RETRY_PAUSE).await;
                continue;
            }

            let (next_offset, messages) = parse_updates(&resp.body_str(), offset);
            offset = next_offset;

            for msg in messages {
                if !is_user_allowed(&self.config.allowed, msg.from_id, &msg.username) {
                    warn!(from_id = msg.from_id, username = %msg.username, "blocked Telegram user");
                    continue;
                }

                info!(
                    username = %if msg.username.is_empty() { "unknown" } else { msg.username.as_str() },
                    chars = msg.text.len(),
                    "Telegram message"
                );

                self.send_typing(msg.chat_id).await;

                let key = format!("tg_{}", msg.chat_id);
                let mut session = Session::open(&agent.workspace, Some(&key));
                let reply = agent.run_turn(&mut session, &msg.text, None).await;

                if !reply.is_empty() {
                    self.send_message(msg.chat_id, &reply).await;
                }
            }
        }

        info!("Telegram long-polling stopped");
    }
}
