#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Playbook Client integration tests.
//!
//! Provides a channel-based [`MockTransport`] and helper functions for
//! constructing server frames and board snapshots.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use playbook_client::{Board, Cell, PlaybookError, Player, ServerCommand, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted server frames are consumed in order by `recv()`.
/// All frames sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server frames (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, PlaybookError>>>,
    /// Recorded outgoing frames from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming frames.
    ///
    /// Returns the transport plus shared handles for inspecting sent frames
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, PlaybookError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), PlaybookError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, PlaybookError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted frames; hang forever so the transport loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), PlaybookError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Board and frame helpers ─────────────────────────────────────────

/// Builds a board from nine glyphs: `X`, `O`, or `.` for empty.
pub fn snapshot(pattern: &str) -> Board {
    assert_eq!(pattern.len(), 9, "pattern must cover all nine cells");
    let mut cells = [Cell::Empty; 9];
    for (index, glyph) in pattern.chars().enumerate() {
        cells[index] = match glyph {
            'X' => Cell::Taken(Player::X),
            'O' => Cell::Taken(Player::O),
            '.' => Cell::Empty,
            other => panic!("unexpected glyph {other:?}"),
        };
    }
    Board::from(cells)
}

/// Returns the JSON string for an `INIT` frame with default values.
pub fn init_json() -> String {
    init_json_with("seat-1", Player::X, ".........")
}

/// Returns the JSON string for an `INIT` frame with custom values.
pub fn init_json_with(client_id: &str, player: Player, pattern: &str) -> String {
    serde_json::to_string(&ServerCommand::Init {
        client_id: client_id.into(),
        player,
        play_book: snapshot(pattern),
    })
    .expect("init_json serialization")
}

/// Returns the JSON string for a `STATE` frame carrying the given snapshot.
pub fn state_json(pattern: &str) -> String {
    serde_json::to_string(&ServerCommand::State {
        play_book: snapshot(pattern),
    })
    .expect("state_json serialization")
}

/// Returns the JSON string for a `RESET` frame (the board comes back empty).
pub fn reset_json() -> String {
    serde_json::to_string(&ServerCommand::Reset {
        play_book: Board::empty(),
    })
    .expect("reset_json serialization")
}

/// Returns the JSON string for a `COMPLETE` frame.
pub fn complete_json() -> String {
    serde_json::to_string(&ServerCommand::Complete).expect("complete_json serialization")
}

/// Returns the JSON string for a `LEAVE` frame.
pub fn leave_json() -> String {
    serde_json::to_string(&ServerCommand::Leave).expect("leave_json serialization")
}
