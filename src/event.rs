//! Events delivered to the consumer.
//!
//! This is the render adapter's whole input surface: everything a UI needs
//! to mirror the session without reading protocol frames itself. Events
//! arrive on the bounded channel handed out at client construction; see
//! [`PlaybookClient`](crate::client::PlaybookClient) for delivery semantics
//! (a slow consumer loses intermediate events, `Disconnected` is always
//! delivered and always last).

use std::fmt;

use crate::board::{Board, Line, Player};

// ── Status line ─────────────────────────────────────────────────────

/// Typed session phase for the status line.
///
/// The `Display` form is the human-readable status text, ready to show
/// verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    /// Connected but not yet seated.
    Initializing,
    /// Game underway with `current` to move. `you` is absent until the
    /// server assigns this client a seat.
    Turn {
        /// The symbol whose turn it is.
        current: Player,
        /// The local symbol, when known.
        you: Option<Player>,
    },
    /// A win line is complete.
    Won {
        /// The winning symbol.
        player: Player,
    },
    /// The board filled with no winner.
    Draw,
    /// The server declared the board complete.
    Complete,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Initializing => f.write_str("Initializing..."),
            GameStatus::Turn {
                current,
                you: Some(you),
            } => write!(f, "It's {current}'s turn. (You are {you})"),
            GameStatus::Turn { current, you: None } => write!(f, "It's {current}'s turn."),
            GameStatus::Won { player } => write!(f, "Player {player} has won!"),
            GameStatus::Draw => f.write_str("Game ended in a draw!"),
            GameStatus::Complete => f.write_str("Board complete! Create or join another board."),
        }
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The transport link is up; the join frame is about to go out.
    Connected,
    /// The server seated this client.
    Joined {
        /// Opaque seat token; keep it to resume the seat after a drop.
        client_id: String,
        /// The symbol this client controls.
        player: Player,
    },
    /// The board changed; redraw. `win_line` names the completed triple
    /// when the change ended the game, so the consumer can highlight
    /// exactly those three cells.
    BoardUpdated {
        /// Full authoritative (or optimistic) board.
        board: Board,
        /// The winning triple, if any.
        win_line: Option<Line>,
    },
    /// The status line changed.
    StatusChanged(GameStatus),
    /// The peer cleared the board. Fires only for resets this client did
    /// not request.
    PeerReset,
    /// The peer left the board.
    PeerLeft,
    /// The server declared the board complete; moves and the restart
    /// affordance stay disabled for the rest of the session.
    BoardComplete,
    /// Show or hide the restart affordance.
    RestartVisible {
        /// False exactly when the affordance must be hidden.
        visible: bool,
    },
    /// An inbound frame could not be understood. The session ends rather
    /// than risk a corrupt board; `Disconnected` follows.
    ProtocolError {
        /// Parser diagnostic for logs and bug reports.
        detail: String,
    },
    /// The session ended. Always the final event.
    Disconnected {
        /// Why, when known ("client shut down", transport errors, ...);
        /// `None` when the server simply closed the connection.
        reason: Option<String>,
    },
}
