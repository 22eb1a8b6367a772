//! Transport abstraction for the board protocol.
//!
//! The [`Transport`] trait defines a bidirectional text-frame channel
//! between client and server. Frames are opaque strings at this layer; the
//! actual encodings (outbound colon-delimited commands, inbound JSON
//! records) live in [`protocol`](crate::protocol). Every implementation
//! must handle frame boundaries internally (WebSocket frames,
//! length-prefixed TCP, and so on).
//!
//! # Connection Setup
//!
//! Connection setup is intentionally NOT part of this trait — different
//! transports have fundamentally different connection parameters. Construct
//! a connected transport externally and pass it to
//! `PlaybookClient::start`, or use `PlaybookClient::connect` for the
//! built-in WebSocket backend.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use playbook_client::error::PlaybookError;
//! use playbook_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), PlaybookError> {
//!         // Transmit one complete text frame
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, PlaybookError>> {
//!         // Produce the next text frame
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), PlaybookError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::PlaybookError;

/// A bidirectional text-frame transport for the board protocol.
///
/// Implementors shuttle whole frames between client and server. Each call
/// to [`send`](Transport::send) transmits one complete frame; each call to
/// [`recv`](Transport::recv) yields one complete frame. The client relies
/// on frames arriving in the order they were sent, which any
/// single-connection stream transport provides.
///
/// # Object Safety
///
/// The trait is object-safe, so `Box<dyn Transport>` works for dynamic
/// dispatch. `PlaybookClient::start` accepts `impl Transport`
/// (monomorphized) for the common case.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the client
/// polls it inside `tokio::select!`. If `recv` is cancelled before
/// completion, calling it again must not lose a frame. Channel-based
/// implementations (wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::TransportSend`] if the frame could not be
    /// sent (connection broken, write failed).
    async fn send(&mut self, frame: String) -> Result<(), PlaybookError>;

    /// Receive the next text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(frame))` — a complete frame was received
    /// - `Some(Err(e))` — a transport error occurred
    ///   (e.g. [`PlaybookError::TransportReceive`])
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait docs](Transport)).
    async fn recv(&mut self) -> Option<Result<String, PlaybookError>>;

    /// Close the transport connection gracefully.
    ///
    /// After this, further [`send`](Transport::send) calls may error and
    /// [`recv`](Transport::recv) may return `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when the graceful shutdown fails. Implementations
    /// should still release resources if the close handshake fails.
    async fn close(&mut self) -> Result<(), PlaybookError>;
}
