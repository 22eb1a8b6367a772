//! Transport implementations for the board protocol.
//!
//! Concrete [`Transport`](crate::Transport) implementations live here
//! behind feature gates. Enable the corresponding Cargo feature to pull
//! one in:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), playbook_client::PlaybookError> {
//! use playbook_client::{Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect("ws://localhost:8080/quiet-lobster").await?;
//! ws.send("play".to_string()).await?;
//!
//! if let Some(Ok(frame)) = ws.recv().await {
//!     println!("server said: {frame}");
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;
