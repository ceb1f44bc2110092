//! HTTPS client for the CClaw agent runtime.
//!
//! Three entry points: [`HttpClient::post_json`], [`HttpClient::get`], and
//! [`HttpClient::post_stream`] for Server-Sent-Events. TLS uses rustls with
//! certificate verification against the system trust store and SNI from the
//! URL host. Each request owns its connection for its lifetime.
//!
//! Failure convention: the non-streaming calls are infallible at the
//! signature level: transport and TLS failures yield a response with
//! `status == 0` and an empty body, which callers treat as "no response
//! from provider". The streaming call returns an error instead.

pub mod sse;

use cclaw_core::HttpError;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, error};

pub use sse::{SseAction, SseLineBuffer};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Bounds a silent peer; generous enough for slow model output between events.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// A parsed HTTP response. `status == 0` means the request never completed.
#[derive(Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: String,
}

impl HttpResponse {
    fn failed() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Build the client and its TLS configuration. Failure here is a fatal
    /// startup condition for the process.
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| HttpError::TlsInit(e.to_string()))?;
        Ok(Self { client })
    }

    /// Only `https://host[:port]/path` is accepted.
    fn validate_url(url: &str) -> Result<(), HttpError> {
        let rest = url
            .strip_prefix("https://")
            .ok_or_else(|| HttpError::InvalidUrl(url.to_string()))?;
        let host = rest.split(['/', '?']).next().unwrap_or("");
        if host.is_empty() {
            return Err(HttpError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&str>,
        headers: &[(&str, &str)],
    ) -> HttpResponse {
        if let Err(e) = Self::validate_url(url) {
            error!("{e}");
            return HttpResponse::failed();
        }

        let mut req = self.client.request(method, url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        if let Some(body) = body {
            req = req
                .header("Content-Type", "application/json")
                .body(body.to_string());
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                error!(url, "request failed: {e}");
                return HttpResponse::failed();
            }
        };

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| format!("{}: {}\r\n", k, v.to_str().unwrap_or("")))
            .collect();

        match resp.bytes().await {
            Ok(body) => {
                debug!(url, status, bytes = body.len(), "response");
                HttpResponse {
                    status,
                    body: body.to_vec(),
                    headers,
                }
            }
            Err(e) => {
                error!(url, "failed to read response body: {e}");
                HttpResponse::failed()
            }
        }
    }

    /// Send an HTTPS POST with a JSON body and read the entire response.
    pub async fn post_json(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> HttpResponse {
        self.request(reqwest::Method::POST, url, Some(body), headers)
            .await
    }

    /// Send an HTTPS GET and read the entire response.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> HttpResponse {
        self.request(reqwest::Method::GET, url, None, headers).await
    }

    /// Stream a Server-Sent-Events response.
    ///
    /// `on_data` is invoked with the payload of every `data: ` line, in byte
    /// arrival order. The stream ends when the callback returns
    /// [`SseAction::Stop`], when the `[DONE]` sentinel arrives, or when the
    /// server closes the connection.
    pub async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
        on_data: &mut (dyn FnMut(&str) -> SseAction + Send),
    ) -> Result<(), HttpError> {
        Self::validate_url(url)?;

        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .body(body.to_string());
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let mut byte_stream = resp.bytes_stream();
        let mut lines = SseLineBuffer::new();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| HttpError::Stream(e.to_string()))?;
            let action = lines.push(&bytes, |data| {
                if data == "[DONE]" {
                    return SseAction::Stop;
                }
                on_data(data)
            });
            if action == SseAction::Stop {
                break;
            }
        }

        Ok(())
    }
}
