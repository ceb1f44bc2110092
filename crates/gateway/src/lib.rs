//! WebSocket gateway for the CClaw agent runtime.
//!
//! Server side of RFC 6455, sufficient for single-frame text messages: an
//! accept loop plus one task per connection, capped at 64 live clients.
//! Each inbound text frame is handed to the application handler; its reply
//! (if any) goes back as one outbound text frame. PING is answered with
//! PONG, CLOSE is echoed and tears the connection down, BINARY and
//! fragmentation are ignored in v1.

pub mod frame;
pub mod handshake;

use async_trait::async_trait;
use cclaw_core::Shutdown;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

pub use frame::{read_frame, write_frame, Frame, Opcode};
pub use handshake::{accept_key, handshake};

pub const MAX_CLIENTS: usize = 64;

/// Application callbacks. Connections are identified by a monotonically
/// increasing id, which channel code uses as the session key suffix.
#[async_trait]
pub trait WsHandler: Send + Sync {
    /// Handle one inbound text message; the returned string (if any) is
    /// sent back as a single text frame.
    async fn on_message(&self, conn_id: u64, text: &str) -> Option<String>;

    fn on_disconnect(&self, _conn_id: u64) {}
}

#[derive(Debug, Clone)]
pub struct WsServerConfig {
    pub port: u16,
    pub auth_token: Option<String>,
}

/// Bind and serve until shutdown.
pub async fn serve(
    cfg: WsServerConfig,
    handler: Arc<dyn WsHandler>,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    info!(port = cfg.port, "WebSocket gateway listening");
    serve_listener(listener, cfg.auth_token, handler, shutdown).await
}

/// Accept loop over an already-bound listener (separated for tests).
pub async fn serve_listener(
    listener: TcpListener,
    auth_token: Option<String>,
    handler: Arc<dyn WsHandler>,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let client_count = Arc::new(AtomicUsize::new(0));
    let next_conn_id = AtomicU64::new(1);

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            },
            _ = shutdown.cancelled() => break,
        };

        if client_count.load(Ordering::SeqCst) >= MAX_CLIENTS {
            warn!("max clients reached, rejecting connection");
            continue; // dropped before handshake
        }

        let conn_id = next_conn_id.fetch_add(1, Ordering::SeqCst);
        let count = client_count.clone();
        let handler = handler.clone();
        let auth = auth_token.clone();
        let shutdown = shutdown.clone();

        count.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            connection_task(stream, conn_id, auth, handler.as_ref(), shutdown).await;
            count.fetch_sub(1, Ordering::SeqCst);
            handler.on_disconnect(conn_id);
        });
    }

    info!("WebSocket gateway stopped");
    Ok(())
}

async fn connection_task(
    mut stream: TcpStream,
    conn_id: u64,
    auth_token: Option<String>,
    handler: &dyn WsHandler,
    shutdown: Shutdown,
) {
    if let Err(e) = handshake(&mut stream, auth_token.as_deref()).await {
        warn!(conn_id, "handshake failed: {e}");
        return;
    }
    info!(conn_id, "client connected");

    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut stream) => frame,
            _ = shutdown.cancelled() => {
                let _ = write_frame(&mut stream, Opcode::Close, &[]).await;
                break;
            }
        };

        let frame = match frame {
            Ok(f) => f,
            Err(_) => break, // EOF or protocol error
        };

        match frame.opcode {
            Opcode::Text => {
                let text = String::from_utf8_lossy(&frame.payload);
                if let Some(reply) = handler.on_message(conn_id, &text).await {
                    if write_frame(&mut stream, Opcode::Text, reply.as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            Opcode::Ping => {
                if write_frame(&mut stream, Opcode::Pong, &frame.payload)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Opcode::Close => {
                let _ = write_frame(&mut stream, Opcode::Close, &[]).await;
                break;
            }
            _ => {} // binary and fragmentation unsupported in v1
        }
    }

    info!(conn_id, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct UppercaseHandler;

    #[async_trait]
    impl WsHandler for UppercaseHandler {
        async fn on_message(&self, _conn_id: u64, text: &str) -> Option<String> {
            Some(text.to_uppercase())
        }
    }

    /// Client-side masked text frame (servers must accept masked input).
    fn masked_text_frame(payload: &[u8]) -> Vec<u8> {
        let mask = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut raw = vec![0x81];
        assert!(payload.len() < 126);
        raw.push(0x80 | payload.len() as u8);
        raw.extend_from_slice(&mask);
        raw.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        raw
    }

    async fn client_handshake(stream: &mut TcpStream) {
        stream
            .write_all(
                b"GET / HTTP/1.1\r\n\
                  Host: localhost\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
            )
            .await
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.starts_with("HTTP/1.1 101"));
    }

    #[tokio::test]
    async fn text_message_roundtrip_through_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();

        let server = tokio::spawn(serve_listener(
            listener,
            None,
            Arc::new(UppercaseHandler),
            shutdown.clone(),
        ));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client_handshake(&mut client).await;

        client.write_all(&masked_text_frame(b"hello")).await.unwrap();
        let reply = read_frame(&mut client).await.unwrap();
        assert_eq!(reply.opcode, Opcode::Text);
        assert_eq!(reply.payload, b"HELLO");

        // Ping is answered with an echoing pong.
        let mut ping = masked_text_frame(b"pp");
        ping[0] = 0x89;
        client.write_all(&ping).await.unwrap();
        let pong = read_frame(&mut client).await.unwrap();
        assert_eq!(pong.opcode, Opcode::Pong);
        assert_eq!(pong.payload, b"pp");

        // Close is echoed back.
        let mut close = masked_text_frame(b"");
        close[0] = 0x88;
        client.write_all(&close).await.unwrap();
        let closed = read_frame(&mut client).await.unwrap();
        assert_eq!(closed.opcode, Opcode::Close);

        shutdown.trigger();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn server_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();
        shutdown.trigger();
        serve_listener(listener, None, Arc::new(UppercaseHandler), shutdown)
            .await
            .unwrap();
    }
}
