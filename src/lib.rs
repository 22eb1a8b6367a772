//! # Playbook Client
//!
//! Transport-agnostic Rust client for a server-hosted two-player
//! tic-tac-toe board.
//!
//! The server owns the game; this crate keeps a live local mirror of it.
//! A background task reads authoritative JSON pushes off the connection
//! and feeds them through a [`GameSession`]; the consumer drives a UI
//! from the resulting [`GameEvent`] stream and queues moves through the
//! [`PlaybookClient`] handle. Local moves are applied optimistically and
//! reconciled against the server's next snapshot, which always wins.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **Wire-compatible** — outbound colon frames and inbound JSON records match the board server exactly
//! - **WebSocket built-in** — default `transport-websocket` feature provides `WebSocketTransport`
//! - **Event-driven** — receive typed `GameEvent`s via a channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use playbook_client::{GameEvent, PlaybookClient, PlaybookConfig};
//!
//! let config = PlaybookConfig::new("wss://play.example/board/42");
//! let (client, mut events) = PlaybookClient::connect(config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameEvent::StatusChanged(status) => println!("{status}"),
//!         GameEvent::BoardUpdated { board, .. } => print!("{board}"),
//!         GameEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod board;
pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use board::{Board, Cell, Line, Outcome, Player};
pub use client::{PlaybookClient, PlaybookConfig};
pub use error::PlaybookError;
pub use event::{GameEvent, GameStatus};
pub use protocol::{ClientCommand, ServerCommand};
pub use session::{GameSession, SessionPhase};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
