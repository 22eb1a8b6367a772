//! Wire types for the board protocol.
//!
//! The two directions use different encodings, matching the server exactly:
//!
//! - **Outbound** (client to server): bare colon-delimited UTF-8 text
//!   frames, e.g. `PLAY:X:4`. [`ClientCommand::to_frame`] is the encoder.
//! - **Inbound** (server to client): one JSON record per text frame with a
//!   `cmd` discriminator, e.g. `{"cmd":"STATE","play_book":["","X",...]}`.
//!   [`ServerCommand`] derives the decoder.
//!
//! Inbound parsing is strict where it matters: a `play_book` must hold
//! exactly nine cells and every cell must be `""`, `"X"`, or `"O"`. Extra
//! fields on otherwise well-formed records are ignored.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Player};

// ── Outbound commands ───────────────────────────────────────────────

/// Commands sent from client to server.
///
/// These never carry JSON; the server consumes the colon format directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Announce this connection so the server seats it. Sent exactly once
    /// per connection, before any game command.
    Join,
    /// Claim a cell.
    Play {
        /// The claiming symbol.
        player: Player,
        /// Target slot, 0-8 row-major.
        cell: usize,
    },
    /// Ask the server to clear the board, attributed to `player`.
    Reset {
        /// The requesting symbol.
        player: Player,
    },
    /// Announce a voluntary departure.
    Leave {
        /// The departing symbol.
        player: Player,
    },
}

impl ClientCommand {
    /// Encodes the command as its wire text frame.
    #[must_use]
    pub fn to_frame(&self) -> String {
        match self {
            ClientCommand::Join => "play".to_owned(),
            ClientCommand::Play { player, cell } => format!("PLAY:{player}:{cell}"),
            ClientCommand::Reset { player } => format!("RESET:{player}"),
            ClientCommand::Leave { player } => format!("LEAVE:{player}"),
        }
    }
}

// ── Inbound commands ────────────────────────────────────────────────

/// Commands pushed from server to client.
///
/// Every variant carrying a `play_book` is a full authoritative snapshot;
/// the session overwrites its board with it wholesale, never merges. The
/// dispatcher additionally requires these to arrive in delivery order,
/// which the single underlying connection guarantees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum ServerCommand {
    /// Seat assignment, pushed once per (re)connection.
    Init {
        /// Opaque seat token; hand it back on reconnect to resume the seat.
        client_id: String,
        /// The symbol this client controls, fixed for the session.
        player: Player,
        /// Board snapshot at the time of seating.
        play_book: Board,
    },
    /// Authoritative board snapshot after any accepted move.
    State {
        /// The full board; replaces local state.
        play_book: Board,
    },
    /// The board was cleared, by either seat.
    Reset {
        /// The post-reset (empty) board.
        play_book: Board,
    },
    /// The board cannot be joined or continued; terminal for the session.
    Complete,
    /// The peer left the board.
    Leave,
}
