//! Session state machine: the single owner of everything the server can
//! change on this client.
//!
//! [`GameSession`] interprets every inbound [`ServerCommand`] through one
//! entry point ([`apply`](GameSession::apply)) and every local click
//! through another ([`play_local`](GameSession::play_local)), returning
//! the [`GameEvent`]s a renderer needs, in order. It holds no transport,
//! no channels, and nothing async, so protocol behavior is testable with
//! plain function calls; at runtime the transport loop in
//! [`client`](crate::client) is its only writer.
//!
//! Precondition: commands must be fed in delivery order. The single
//! underlying connection guarantees that; there is no sequence numbering
//! or reorder buffering here.
//!
//! Reconciliation rule: every snapshot-bearing command replaces the board
//! wholesale. A locally optimistic mark lives only until the next
//! authoritative snapshot, which wins all conflicts.

use tracing::debug;

use crate::board::{Board, Cell, Outcome, Player};
use crate::event::{GameEvent, GameStatus};
use crate::protocol::{ClientCommand, ServerCommand};

/// Coarse lifecycle stage of a session, distinct from the connection's
/// open/closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Connected (or not yet connected) but no seat assigned.
    #[default]
    Uninitialized,
    /// Seated; the board is live.
    Active,
    /// Win, draw, or server-declared completion reached.
    Terminal,
    /// This client departed voluntarily; nothing is processed afterwards.
    Left,
}

/// Client-side game session.
///
/// Tracks the board, the seat, turn state, and reset provenance. Turn
/// state is always derived from the board (fill parity), never stored
/// independently, so an overwritten board can never disagree with "whose
/// turn it is".
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    phase: SessionPhase,
    board: Board,
    client_id: Option<String>,
    local_player: Option<Player>,
    game_active: bool,
    reset_requested: bool,
    completed: bool,
}

impl GameSession {
    /// A fresh session with no seat and an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session that will try to resume the seat previously issued
    /// as `client_id`. The token is provisional until the server's `INIT`
    /// confirms or replaces it.
    #[must_use]
    pub fn resuming(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }

    // ── Read access ─────────────────────────────────────────────────

    /// Current lifecycle stage.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The current board.
    #[must_use]
    pub fn board(&self) -> Board {
        self.board
    }

    /// The seat token, once issued (or carried over for resumption).
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The symbol this client controls, once seated.
    #[must_use]
    pub fn local_player(&self) -> Option<Player> {
        self.local_player
    }

    /// Whose turn the board says it is.
    #[must_use]
    pub fn current_player(&self) -> Player {
        self.board.current_player()
    }

    /// True iff it is the local player's turn and no terminal condition
    /// has been reached. Gates every local move.
    #[must_use]
    pub fn game_active(&self) -> bool {
        self.game_active
    }

    /// True between a local reset request and the server's `RESET` push;
    /// decides whether that push surfaces a peer notice.
    #[must_use]
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// True once the server has declared the board complete. Sticky for
    /// the rest of the session.
    #[must_use]
    pub fn is_board_complete(&self) -> bool {
        self.completed
    }

    // ── Server-driven mutation ──────────────────────────────────────

    /// Applies one inbound command and returns the render events it
    /// produced, in emit order. The only entry point for server-driven
    /// state changes.
    pub fn apply(&mut self, command: ServerCommand) -> Vec<GameEvent> {
        if self.phase == SessionPhase::Left {
            debug!("ignoring server command after departure");
            return Vec::new();
        }
        match command {
            ServerCommand::Init {
                client_id,
                player,
                play_book,
            } => self.handle_init(client_id, player, play_book),
            ServerCommand::State { play_book } => self.handle_state(play_book),
            ServerCommand::Reset { play_book } => self.handle_reset(play_book),
            ServerCommand::Complete => self.handle_complete(),
            ServerCommand::Leave => {
                debug!("peer left the board");
                vec![GameEvent::PeerLeft]
            }
        }
    }

    fn handle_init(
        &mut self,
        client_id: String,
        player: Player,
        play_book: Board,
    ) -> Vec<GameEvent> {
        debug!(client_id = %client_id, player = %player, "seat assigned");
        self.client_id = Some(client_id.clone());
        self.local_player = Some(player);
        self.board = play_book;
        self.completed = false;
        self.reset_requested = false;
        self.phase = SessionPhase::Active;
        // Seating computes turn state but runs no terminal scan; the next
        // snapshot push settles a board that was already finished.
        let status = self.recompute_turn();
        vec![
            GameEvent::Joined { client_id, player },
            GameEvent::BoardUpdated {
                board: self.board,
                win_line: None,
            },
            GameEvent::StatusChanged(status),
        ]
    }

    fn handle_state(&mut self, play_book: Board) -> Vec<GameEvent> {
        self.board = play_book;
        if self.completed {
            // The server already declared this board complete; redraw the
            // snapshot but run no further local evaluation.
            return vec![GameEvent::BoardUpdated {
                board: self.board,
                win_line: None,
            }];
        }
        self.settle()
    }

    fn handle_reset(&mut self, play_book: Board) -> Vec<GameEvent> {
        let peer_initiated = !self.reset_requested;
        self.reset_requested = false;
        self.board = play_book;
        if self.completed {
            return vec![GameEvent::BoardUpdated {
                board: self.board,
                win_line: None,
            }];
        }
        debug!(peer_initiated, "board reset");
        let status = self.recompute_turn();
        if self.local_player.is_some() {
            self.phase = SessionPhase::Active;
        }
        let mut events = Vec::with_capacity(3);
        if peer_initiated {
            events.push(GameEvent::PeerReset);
        }
        events.push(GameEvent::BoardUpdated {
            board: self.board,
            win_line: None,
        });
        events.push(GameEvent::StatusChanged(status));
        events
    }

    fn handle_complete(&mut self) -> Vec<GameEvent> {
        debug!("server declared the board complete");
        self.completed = true;
        self.game_active = false;
        self.phase = SessionPhase::Terminal;
        vec![
            GameEvent::BoardComplete,
            GameEvent::StatusChanged(GameStatus::Complete),
            GameEvent::RestartVisible { visible: false },
        ]
    }

    // ── Click-driven mutation ───────────────────────────────────────

    /// Attempts a local move at `cell`.
    ///
    /// Legality is advisory (empty cell, our turn); the server remains
    /// authoritative and its next snapshot can override the mark. On an
    /// accepted move the cell is marked optimistically, further local
    /// moves are disabled until the server answers, and the returned
    /// frame must be transmitted. A rejected move changes nothing and
    /// returns `None` (logged at debug level).
    pub fn play_local(&mut self, cell: usize) -> Option<(ClientCommand, Vec<GameEvent>)> {
        if !self.game_active {
            debug!(cell, "move rejected: game not active for this client");
            return None;
        }
        let player = self.local_player?;
        match self.board.cell(cell) {
            Some(slot) if slot.is_empty() => {}
            Some(_) => {
                debug!(cell, "move rejected: cell already taken");
                return None;
            }
            None => {
                debug!(cell, "move rejected: no such cell");
                return None;
            }
        }

        // game_active only holds on our turn, so the optimistic mark and
        // the frame attribution are the same symbol.
        self.board.set(cell, Cell::Taken(player));
        self.game_active = false;

        let events = match self.board.outcome() {
            Outcome::Win {
                player: winner,
                line,
            } => {
                self.phase = SessionPhase::Terminal;
                vec![
                    GameEvent::BoardUpdated {
                        board: self.board,
                        win_line: Some(line),
                    },
                    GameEvent::StatusChanged(GameStatus::Won { player: winner }),
                ]
            }
            Outcome::Draw => {
                self.phase = SessionPhase::Terminal;
                vec![
                    GameEvent::BoardUpdated {
                        board: self.board,
                        win_line: None,
                    },
                    GameEvent::StatusChanged(GameStatus::Draw),
                ]
            }
            // No status change yet: the turn passes only when the server
            // echoes the move back.
            Outcome::InProgress => vec![GameEvent::BoardUpdated {
                board: self.board,
                win_line: None,
            }],
        };
        Some((ClientCommand::Play { player, cell }, events))
    }

    /// Requests a board reset. Returns the frame to transmit, or `None`
    /// when no seat is held or the board was declared complete (the
    /// restart affordance is disabled then).
    pub fn begin_reset(&mut self) -> Option<ClientCommand> {
        if self.completed || self.phase == SessionPhase::Left {
            debug!("reset rejected: session is over");
            return None;
        }
        let player = self.local_player?;
        self.reset_requested = true;
        Some(ClientCommand::Reset { player })
    }

    /// Marks this client as departed and returns the goodbye frame to
    /// transmit, or `None` when no seat is held or the departure already
    /// happened. After this, every further command is ignored.
    pub fn leave(&mut self) -> Option<ClientCommand> {
        if self.phase == SessionPhase::Left {
            return None;
        }
        let player = self.local_player?;
        self.phase = SessionPhase::Left;
        self.game_active = false;
        Some(ClientCommand::Leave { player })
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Terminal evaluation first, turn recomputation only when the game
    /// is still open. The fixed order means `game_active` never flips on
    /// for a board that has already ended.
    fn settle(&mut self) -> Vec<GameEvent> {
        match self.board.outcome() {
            Outcome::Win { player, line } => {
                self.game_active = false;
                self.phase = SessionPhase::Terminal;
                vec![
                    GameEvent::BoardUpdated {
                        board: self.board,
                        win_line: Some(line),
                    },
                    GameEvent::StatusChanged(GameStatus::Won { player }),
                ]
            }
            Outcome::Draw => {
                self.game_active = false;
                self.phase = SessionPhase::Terminal;
                vec![
                    GameEvent::BoardUpdated {
                        board: self.board,
                        win_line: None,
                    },
                    GameEvent::StatusChanged(GameStatus::Draw),
                ]
            }
            Outcome::InProgress => {
                let status = self.recompute_turn();
                if self.local_player.is_some() {
                    self.phase = SessionPhase::Active;
                }
                vec![
                    GameEvent::BoardUpdated {
                        board: self.board,
                        win_line: None,
                    },
                    GameEvent::StatusChanged(status),
                ]
            }
        }
    }

    fn recompute_turn(&mut self) -> GameStatus {
        let current = self.board.current_player();
        self.game_active = self.local_player == Some(current);
        GameStatus::Turn {
            current,
            you: self.local_player,
        }
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

    /// Builds a board from nine glyphs: `X`, `O`, or `.` for empty.
    fn snapshot(pattern: &str) -> Board {
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

    fn seated(player: Player) -> GameSession {
        let mut session = GameSession::new();
        session.apply(ServerCommand::Init {
            client_id: "seat-1".to_owned(),
            player,
            play_book: Board::empty(),
        });
        session
    }

    fn seated_on(player: Player, pattern: &str) -> GameSession {
        let mut session = GameSession::new();
        session.apply(ServerCommand::Init {
            client_id: "seat-1".to_owned(),
            player,
            play_book: snapshot(pattern),
        });
        session
    }

    #[test]
    fn init_assigns_seat_and_announces_it() {
        let mut session = GameSession::new();
        let events = session.apply(ServerCommand::Init {
            client_id: "tok-42".to_owned(),
            player: Player::X,
            play_book: Board::empty(),
        });

        assert_eq!(
            events,
            vec![
                GameEvent::Joined {
                    client_id: "tok-42".to_owned(),
                    player: Player::X,
                },
                GameEvent::BoardUpdated {
                    board: Board::empty(),
                    win_line: None,
                },
                GameEvent::StatusChanged(GameStatus::Turn {
                    current: Player::X,
                    you: Some(Player::X),
                }),
            ]
        );
        assert_eq!(session.client_id(), Some("tok-42"));
        assert_eq!(session.local_player(), Some(Player::X));
        assert_eq!(session.phase(), SessionPhase::Active);
        assert!(session.game_active());
    }

    #[test]
    fn init_as_o_on_empty_board_waits_for_x() {
        let session = seated(Player::O);
        assert!(!session.game_active(), "X opens; O must wait");
        assert_eq!(session.current_player(), Player::X);
    }

    #[test]
    fn state_overwrites_wholesale() {
        let mut session = seated(Player::X);
        session.play_local(0).unwrap();

        // The authoritative snapshot has someone else's idea of cell 0.
        let events = session.apply(ServerCommand::State {
            play_book: snapshot("O........"),
        });

        assert_eq!(session.board(), snapshot("O........"));
        assert_eq!(
            events,
            vec![
                GameEvent::BoardUpdated {
                    board: snapshot("O........"),
                    win_line: None,
                },
                GameEvent::StatusChanged(GameStatus::Turn {
                    current: Player::O,
                    you: Some(Player::X),
                }),
            ]
        );
    }

    #[test]
    fn state_is_idempotent() {
        let mut session = seated(Player::X);
        let push = ServerCommand::State {
            play_book: snapshot("XO......."),
        };

        let first = session.apply(push.clone());
        let board_after_first = session.board();
        let active_after_first = session.game_active();
        let phase_after_first = session.phase();

        let second = session.apply(push);
        assert_eq!(first, second);
        assert_eq!(session.board(), board_after_first);
        assert_eq!(session.game_active(), active_after_first);
        assert_eq!(session.phase(), phase_after_first);
    }

    #[test]
    fn state_with_win_skips_turn_recomputation() {
        // Fill parity alone would hand the turn to X (6 cells filled);
        // the terminal scan must run first and keep moves disabled.
        let mut session = seated(Player::X);
        let events = session.apply(ServerCommand::State {
            play_book: snapshot("XXXOOO..."),
        });

        assert_eq!(
            events,
            vec![
                GameEvent::BoardUpdated {
                    board: snapshot("XXXOOO..."),
                    win_line: Some([0, 1, 2]),
                },
                GameEvent::StatusChanged(GameStatus::Won { player: Player::X }),
            ]
        );
        assert!(!session.game_active());
        assert_eq!(session.phase(), SessionPhase::Terminal);
    }

    #[test]
    fn state_with_full_board_and_no_line_is_a_draw() {
        let mut session = seated(Player::X);
        let events = session.apply(ServerCommand::State {
            play_book: snapshot("XOXXOOOXX"),
        });

        assert_eq!(
            events.last(),
            Some(&GameEvent::StatusChanged(GameStatus::Draw))
        );
        assert!(!session.game_active());
        assert_eq!(session.phase(), SessionPhase::Terminal);
    }

    #[test]
    fn state_before_init_updates_board_but_not_seat() {
        let mut session = GameSession::new();
        let events = session.apply(ServerCommand::State {
            play_book: snapshot("X........"),
        });

        assert_eq!(session.board(), snapshot("X........"));
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        assert!(!session.game_active());
        assert_eq!(
            events.last(),
            Some(&GameEvent::StatusChanged(GameStatus::Turn {
                current: Player::O,
                you: None,
            }))
        );
    }

    #[test]
    fn accepted_move_marks_cell_and_suspends_play() {
        let mut session = seated(Player::X);
        let (frame, events) = session.play_local(4).unwrap();

        assert_eq!(
            frame,
            ClientCommand::Play {
                player: Player::X,
                cell: 4,
            }
        );
        assert_eq!(
            events,
            vec![GameEvent::BoardUpdated {
                board: snapshot("....X...."),
                win_line: None,
            }]
        );
        assert!(!session.game_active(), "one move per server round-trip");
        assert!(session.play_local(5).is_none());
    }

    #[test]
    fn authoritative_echo_beats_optimistic_mark() {
        let mut session = seated(Player::X);
        session.play_local(4).unwrap();

        // Simulated race: the server saw the peer claim cell 4 first.
        session.apply(ServerCommand::State {
            play_book: snapshot("....O...."),
        });
        assert_eq!(session.board().cell(4), Some(Cell::Taken(Player::O)));
    }

    #[test]
    fn rejected_moves_change_nothing() {
        let mut session = seated_on(Player::O, "X........");
        assert!(session.game_active());

        // Occupied cell.
        assert!(session.play_local(0).is_none());
        // Out of range.
        assert!(session.play_local(9).is_none());
        assert_eq!(session.board(), snapshot("X........"));
        assert!(session.game_active(), "rejections must not burn the turn");

        // Not our turn: a fresh X-seated session after one local move.
        let mut waiting = seated(Player::X);
        waiting.play_local(0).unwrap();
        assert!(waiting.play_local(1).is_none());
    }

    #[test]
    fn moves_before_init_are_rejected() {
        let mut session = GameSession::new();
        assert!(session.play_local(0).is_none());
        assert_eq!(session.board(), Board::empty());
    }

    #[test]
    fn local_winning_move_reports_immediately() {
        let mut session = seated_on(Player::X, "XX.OO....");
        let (frame, events) = session.play_local(2).unwrap();

        assert_eq!(
            frame,
            ClientCommand::Play {
                player: Player::X,
                cell: 2,
            }
        );
        assert_eq!(
            events,
            vec![
                GameEvent::BoardUpdated {
                    board: snapshot("XXXOO...."),
                    win_line: Some([0, 1, 2]),
                },
                GameEvent::StatusChanged(GameStatus::Won { player: Player::X }),
            ]
        );
        assert_eq!(session.phase(), SessionPhase::Terminal);
    }

    #[test]
    fn local_drawing_move_reports_immediately() {
        let mut session = seated_on(Player::X, "XOXXOOOX.");
        let (_, events) = session.play_local(8).unwrap();
        assert_eq!(
            events.last(),
            Some(&GameEvent::StatusChanged(GameStatus::Draw))
        );
        assert_eq!(session.phase(), SessionPhase::Terminal);
    }

    #[test]
    fn peer_reset_surfaces_a_notice() {
        let mut session = seated(Player::X);
        let events = session.apply(ServerCommand::Reset {
            play_book: Board::empty(),
        });

        assert_eq!(events.first(), Some(&GameEvent::PeerReset));
        assert_eq!(session.board(), Board::empty());
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[test]
    fn own_reset_is_silent_and_clears_the_flag() {
        let mut session = seated(Player::O);
        let frame = session.begin_reset().unwrap();
        assert_eq!(
            frame,
            ClientCommand::Reset {
                player: Player::O,
            }
        );
        assert!(session.reset_requested());

        let events = session.apply(ServerCommand::Reset {
            play_book: Board::empty(),
        });
        assert!(
            !events.contains(&GameEvent::PeerReset),
            "own reset must not read as a peer notice"
        );
        assert!(!session.reset_requested(), "provenance is one-shot");
    }

    #[test]
    fn reset_after_win_reactivates_the_board() {
        let mut session = seated(Player::X);
        session.apply(ServerCommand::State {
            play_book: snapshot("XXXOO...."),
        });
        assert_eq!(session.phase(), SessionPhase::Terminal);

        session.begin_reset().unwrap();
        session.apply(ServerCommand::Reset {
            play_book: Board::empty(),
        });
        assert_eq!(session.phase(), SessionPhase::Active);
        assert!(session.game_active(), "X opens after a reset");
    }

    #[test]
    fn complete_disables_moves_and_restart() {
        let mut session = seated(Player::X);
        let events = session.apply(ServerCommand::Complete);

        assert_eq!(
            events,
            vec![
                GameEvent::BoardComplete,
                GameEvent::StatusChanged(GameStatus::Complete),
                GameEvent::RestartVisible { visible: false },
            ]
        );
        assert!(!session.game_active());
        assert!(session.is_board_complete());
        assert_eq!(session.phase(), SessionPhase::Terminal);
        assert!(session.play_local(0).is_none());
        assert!(session.begin_reset().is_none());
    }

    #[test]
    fn complete_outlives_later_snapshots() {
        let mut session = seated(Player::X);
        session.apply(ServerCommand::Complete);

        // Later pushes still redraw but never re-enable anything or run
        // another terminal scan.
        let state_events = session.apply(ServerCommand::State {
            play_book: snapshot("XXXOOO..."),
        });
        assert_eq!(
            state_events,
            vec![GameEvent::BoardUpdated {
                board: snapshot("XXXOOO..."),
                win_line: None,
            }]
        );

        let reset_events = session.apply(ServerCommand::Reset {
            play_book: Board::empty(),
        });
        assert_eq!(
            reset_events,
            vec![GameEvent::BoardUpdated {
                board: Board::empty(),
                win_line: None,
            }]
        );
        assert!(!session.game_active());
        assert_eq!(session.phase(), SessionPhase::Terminal);
    }

    #[test]
    fn init_reseats_a_completed_session() {
        let mut session = seated(Player::X);
        session.apply(ServerCommand::Complete);

        session.apply(ServerCommand::Init {
            client_id: "seat-2".to_owned(),
            player: Player::O,
            play_book: snapshot("X........"),
        });
        assert!(!session.is_board_complete());
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.local_player(), Some(Player::O));
        assert!(session.game_active(), "one cell filled, O to move");
    }

    #[test]
    fn peer_leave_is_notice_only() {
        let mut session = seated_on(Player::X, "XO.......");
        let before = session.board();
        let phase_before = session.phase();

        let events = session.apply(ServerCommand::Leave);
        assert_eq!(events, vec![GameEvent::PeerLeft]);
        assert_eq!(session.board(), before);
        assert_eq!(session.phase(), phase_before);
    }

    #[test]
    fn leave_marks_departure_exactly_once() {
        let mut session = seated(Player::X);
        assert_eq!(
            session.leave(),
            Some(ClientCommand::Leave { player: Player::X })
        );
        assert_eq!(session.phase(), SessionPhase::Left);
        assert!(!session.game_active());
        assert_eq!(session.leave(), None);

        // Departed sessions ignore the server entirely.
        assert_eq!(
            session.apply(ServerCommand::State {
                play_book: snapshot("XXXOO...."),
            }),
            Vec::new()
        );
    }

    #[test]
    fn requests_without_a_seat_produce_no_frames() {
        let mut session = GameSession::new();
        assert!(session.begin_reset().is_none());
        assert!(session.leave().is_none());
    }

    #[test]
    fn resuming_carries_the_token_until_init() {
        let mut session = GameSession::resuming("tok-old");
        assert_eq!(session.client_id(), Some("tok-old"));

        session.apply(ServerCommand::Init {
            client_id: "tok-new".to_owned(),
            player: Player::O,
            play_book: Board::empty(),
        });
        assert_eq!(session.client_id(), Some("tok-new"));
    }

    #[test]
    fn status_lines_read_like_the_original() {
        assert_eq!(GameStatus::Initializing.to_string(), "Initializing...");
        assert_eq!(
            GameStatus::Turn {
                current: Player::X,
                you: Some(Player::O),
            }
            .to_string(),
            "It's X's turn. (You are O)"
        );
        assert_eq!(
            GameStatus::Turn {
                current: Player::O,
                you: None,
            }
            .to_string(),
            "It's O's turn."
        );
        assert_eq!(
            GameStatus::Won { player: Player::X }.to_string(),
            "Player X has won!"
        );
        assert_eq!(GameStatus::Draw.to_string(), "Game ended in a draw!");
        assert_eq!(
            GameStatus::Complete.to_string(),
            "Board complete! Create or join another board."
        );
    }
}
