//! RFC 6455 opening handshake.
//!
//! Reads one HTTP upgrade request off the accepted socket, optionally
//! enforces a bearer token (header or `?token=` query parameter), and
//! replies `101 Switching Protocols` with the computed accept key.

use base64::Engine;
use sha1::{Digest, Sha1};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_REQUEST: usize = 8 * 1024;

/// The handshake accept derivation: `base64(SHA1(key || GUID))`.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Case-insensitive header lookup in a raw request.
fn header_value<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    for line in request.lines().skip(1) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(name) {
            return Some(value.trim());
        }
    }
    None
}

fn query_token(request: &str) -> Option<&str> {
    let request_line = request.lines().next()?;
    let target = request_line.split_whitespace().nth(1)?;
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
}

fn is_authorized(request: &str, auth_token: Option<&str>) -> bool {
    let Some(expected) = auth_token.filter(|t| !t.is_empty()) else {
        return true;
    };

    if let Some(auth) = header_value(request, "Authorization") {
        if auth.strip_prefix("Bearer ") == Some(expected) {
            return true;
        }
    }
    query_token(request) == Some(expected)
}

/// Perform the server side of the handshake. On success the socket is ready
/// for frame traffic; on failure the caller should drop the connection.
pub async fn handshake<S>(stream: &mut S, auth_token: Option<&str>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed during handshake",
            ));
        }
        raw.extend_from_slice(&chunk[..n]);
        if raw.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if raw.len() > MAX_REQUEST {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "handshake request too large"));
        }
    }

    let request = String::from_utf8_lossy(&raw);

    let upgrade = header_value(&request, "Upgrade").unwrap_or("");
    if !upgrade.eq_ignore_ascii_case("websocket") {
        warn!("handshake rejected: not a WebSocket upgrade");
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a WebSocket upgrade"));
    }

    if !is_authorized(&request, auth_token) {
        let _ = stream.write_all(b"HTTP/1.1 401 Unauthorized\r\n\r\n").await;
        warn!("handshake rejected: bad or missing auth token");
        return Err(io::Error::new(io::ErrorKind::PermissionDenied, "unauthorized"));
    }

    let Some(client_key) = header_value(&request, "Sec-WebSocket-Key") else {
        warn!("handshake rejected: no Sec-WebSocket-Key");
        return Err(io::Error::new(io::ErrorKind::InvalidData, "missing Sec-WebSocket-Key"));
    };

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(client_key)
    );
    stream.write_all(response.as_bytes()).await
}
