//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the board protocol's text frames over a
//! single WebSocket connection, the transport the game server actually
//! speaks. Both `ws://` and `wss://` URLs work; TLS is handled
//! transparently via [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! The handshake completing is the "connection became open" moment the
//! client waits for: [`connect`](WebSocketTransport::connect) resolves only
//! once frames can actually be sent, and
//! [`connect_with_timeout`](WebSocketTransport::connect_with_timeout) puts
//! a bound on that wait.
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (enabled by
//! default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), playbook_client::PlaybookError> {
//! use playbook_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:8080/quiet-lobster").await?;
//! transport.send("play".to_string()).await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("received: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::PlaybookError;
use crate::transport::Transport;

/// Type alias for the underlying WebSocket stream.
///
/// Public so callers can build a [`WebSocketTransport`] from an existing
/// stream via [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// Translates between the board protocol's whole-string frames and
/// WebSocket text messages. Binary frames are not part of this protocol
/// and are skipped with a warning; ping/pong bookkeeping stays inside
/// tungstenite.
///
/// # Construction
///
/// [`WebSocketTransport::connect`] establishes a new connection. For
/// custom TLS, proxies, or extra headers, build the stream yourself and
/// wrap it with [`WebSocketTransport::from_stream`].
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before
/// completion loses no frames, so it is safe inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establishes a new WebSocket connection to `url`.
    ///
    /// Resolves once the opening handshake has completed, i.e. once the
    /// connection is genuinely open for frames.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::Io`] when the URL is invalid or the
    /// connection cannot be established. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); anything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, PlaybookError> {
        tracing::debug!(url = %url, "connecting to board server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            PlaybookError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "connection open");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Wraps an already-established WebSocket stream.
    ///
    /// Useful when the connection needs setup that
    /// [`connect`](Self::connect) does not expose (custom TLS
    /// configuration, proxy headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), but bounded: gives up with
    /// [`PlaybookError::Timeout`] when the handshake does not complete
    /// within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::Timeout`] when the deadline elapses, or
    /// any error [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, PlaybookError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| PlaybookError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), PlaybookError> {
        if self.closed {
            return Err(PlaybookError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| PlaybookError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PlaybookError>> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Some(Err(PlaybookError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match message {
                // `Utf8Bytes` does not hand out the inner buffer by value,
                // so this copies the payload into a `String`.
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Ping(_) => {
                    // tungstenite queues the pong itself.
                    tracing::debug!("received WebSocket ping");
                }
                Message::Pong(_) => {
                    tracing::debug!("received WebSocket pong (ignored)");
                }
                Message::Binary(_) => {
                    tracing::warn!("skipping binary WebSocket frame; this protocol is text-only");
                }
                Message::Frame(_) => {
                    // Never produced by the read half; the arm only keeps
                    // the match exhaustive.
                    tracing::debug!("skipping raw WebSocket frame");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), PlaybookError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| PlaybookError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    /// Starts a throwaway board server that runs `handler` on the first
    /// accepted connection, returning a `ws://` URL for it.
    async fn spawn_board_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[test]
    fn transport_is_send_and_debug() {
        fn assert_send<T: Send>() {}
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_send::<WebSocketTransport>();
        assert_debug::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_rejects_a_garbage_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Io(_)));
    }

    #[tokio::test]
    async fn connect_surfaces_unreachable_hosts() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Io(_)));
    }

    #[tokio::test]
    async fn recv_yields_pushed_frames_in_order() {
        let url = spawn_board_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"cmd":"COMPLETE"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"cmd":"LEAVE"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"cmd":"COMPLETE"}"#
        );
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"cmd":"LEAVE"}"#
        );
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn client_frames_reach_the_server_verbatim() {
        let url = spawn_board_server(|mut ws| async move {
            // Echo the first text frame back, prefixed, then hang up.
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(format!("echo:{text}").into()))
                    .await
                    .unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("PLAY:X:4".to_string()).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            "echo:PLAY:X:4"
        );
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = spawn_board_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"cmd":"LEAVE"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"cmd":"LEAVE"}"#
        );
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = spawn_board_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("LEAVE:X".to_string()).await.unwrap_err();
        assert!(matches!(err, PlaybookError::TransportClosed));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let url = spawn_board_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn connect_with_timeout_surfaces_a_typed_timeout() {
        // Non-routable test address; the handshake can never complete.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            std::time::Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PlaybookError::Timeout));
    }

    #[tokio::test]
    async fn from_stream_wraps_an_existing_connection() {
        let url = spawn_board_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"cmd":"COMPLETE"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let mut transport = WebSocketTransport::from_stream(ws_stream);
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"cmd":"COMPLETE"}"#
        );
    }
}
