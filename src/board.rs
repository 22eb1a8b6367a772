//! Board representation and the turn/result rules.
//!
//! The board is the unit of truth the server pushes around: a flat 9-slot
//! grid in row-major order, serialized on the wire as a JSON array of nine
//! strings (`""`, `"X"`, `"O"`). Everything derived from it lives here too,
//! because both values are pure functions of the grid:
//!
//! - whose turn it is (fill-count parity, X always opens), and
//! - whether the game has ended (win-line scan, then draw check).

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Players and cells ───────────────────────────────────────────────

/// One of the two seats on a board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Player {
    /// The opening player.
    X,
    /// The responding player.
    O,
}

impl Player {
    /// Wire and display form (`"X"` or `"O"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Player::X => "X",
            Player::O => "O",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single board slot.
///
/// Serialized as `""` when empty, otherwise as the occupying player's
/// symbol, matching the server's `play_book` array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    /// No symbol placed yet.
    #[default]
    Empty,
    /// Claimed by a player. Cells never revert except on a full reset.
    Taken(Player),
}

impl Cell {
    /// Wire form of this cell (`""`, `"X"`, or `"O"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Cell::Empty => "",
            Cell::Taken(player) => player.as_str(),
        }
    }

    /// True when no symbol has been placed.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CellVisitor;

        impl Visitor<'_> for CellVisitor {
            type Value = Cell;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(r#"one of "", "X", "O""#)
            }

            fn visit_str<E>(self, value: &str) -> Result<Cell, E>
            where
                E: de::Error,
            {
                match value {
                    "" => Ok(Cell::Empty),
                    "X" => Ok(Cell::Taken(Player::X)),
                    "O" => Ok(Cell::Taken(Player::O)),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_str(CellVisitor)
    }
}

// ── Win lines ───────────────────────────────────────────────────────

/// An index triple over the board.
pub type Line = [usize; 3];

/// The canonical win conditions, scanned in this exact order: three rows,
/// three columns, two diagonals. The fixed order makes the reported line
/// deterministic on (unreachable by legal play) boards with two complete
/// lines.
pub const WIN_LINES: [Line; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of a terminal-condition scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No win and at least one empty cell; play continues.
    InProgress,
    /// A win line is complete.
    Win {
        /// The winning symbol.
        player: Player,
        /// The completed index triple, first in [`WIN_LINES`] order.
        line: Line,
    },
    /// Every cell is filled and no line is complete.
    Draw,
}

// ── Board ───────────────────────────────────────────────────────────

/// The 9-slot grid, row-major.
///
/// Always replaced wholesale from server snapshots, never diffed. The
/// wire form is a JSON array of exactly nine cell strings; any other
/// length fails to deserialize.
///
/// # Examples
///
/// ```
/// use playbook_client::{Board, Cell, Outcome, Player};
///
/// let mut board = Board::empty();
/// assert_eq!(board.current_player(), Player::X);
///
/// board.set(0, Cell::Taken(Player::X));
/// assert_eq!(board.current_player(), Player::O);
/// assert_eq!(board.outcome(), Outcome::InProgress);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Board([Cell; 9]);

impl Board {
    /// Number of slots on the board.
    pub const SLOTS: usize = 9;

    /// A board with all nine cells empty.
    #[must_use]
    pub const fn empty() -> Self {
        Board([Cell::Empty; 9])
    }

    /// The cell at `index`, or `None` when the index is out of range.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<Cell> {
        self.0.get(index).copied()
    }

    /// All nine cells in row-major order.
    #[must_use]
    pub const fn cells(&self) -> &[Cell; 9] {
        &self.0
    }

    /// Overwrites the cell at `index`. Returns false (and changes nothing)
    /// when the index is out of range.
    pub fn set(&mut self, index: usize, cell: Cell) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.0.iter().filter(|cell| !cell.is_empty()).count()
    }

    /// True when no cell is empty.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.0.iter().all(|cell| !cell.is_empty())
    }

    /// Whose turn the board says it is: even fill count means `X` (X always
    /// opens), odd means `O`. Pure; turn state is never stored separately
    /// from the grid.
    #[must_use]
    pub fn current_player(&self) -> Player {
        if self.filled() % 2 == 0 {
            Player::X
        } else {
            Player::O
        }
    }

    /// Scans for a terminal condition: the first complete line in
    /// [`WIN_LINES`] order wins, otherwise a full board is a draw.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        for line in WIN_LINES {
            let [a, b, c] = line;
            if let (
                Some(Cell::Taken(first)),
                Some(Cell::Taken(second)),
                Some(Cell::Taken(third)),
            ) = (self.cell(a), self.cell(b), self.cell(c))
            {
                if first == second && second == third {
                    return Outcome::Win {
                        player: first,
                        line,
                    };
                }
            }
        }
        if self.is_full() {
            Outcome::Draw
        } else {
            Outcome::InProgress
        }
    }
}

impl From<[Cell; 9]> for Board {
    fn from(cells: [Cell; 9]) -> Self {
        Board(cells)
    }
}

/// Renders the grid as three rows of `X`/`O`/`.` glyphs.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, cell) in self.0.iter().enumerate() {
            let glyph = match cell {
                Cell::Empty => '.',
                Cell::Taken(player) => match player {
                    Player::X => 'X',
                    Player::O => 'O',
                },
            };
            write!(f, "{glyph}")?;
            if index % 3 == 2 {
                if index < 8 {
                    writeln!(f)?;
                }
            } else {
                write!(f, " ")?;
            }
        }
        Ok(())
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
    fn board(pattern: &str) -> Board {
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

    #[test]
    fn empty_board_is_xs_turn() {
        assert_eq!(Board::empty().current_player(), Player::X);
    }

    #[test]
    fn turn_follows_fill_parity() {
        let mut current = Board::empty();
        let mut expected = [Player::X, Player::O].iter().cycle().copied();
        for index in 0..9 {
            assert_eq!(
                current.current_player(),
                expected.next().unwrap(),
                "wrong turn with {index} cells filled"
            );
            current.set(index, Cell::Taken(current.current_player()));
        }
    }

    #[test]
    fn empty_board_is_in_progress() {
        assert_eq!(Board::empty().outcome(), Outcome::InProgress);
    }

    #[test]
    fn every_win_line_is_detected() {
        for expected_line in WIN_LINES {
            for player in [Player::X, Player::O] {
                let mut filled = Board::empty();
                for index in expected_line {
                    filled.set(index, Cell::Taken(player));
                }
                assert_eq!(
                    filled.outcome(),
                    Outcome::Win {
                        player,
                        line: expected_line
                    },
                    "line {expected_line:?} for {player} not reported"
                );
            }
        }
    }

    #[test]
    fn win_beats_draw_on_full_board() {
        // Row 0 completes exactly as the board fills up.
        let full = board("XXXOOXXOO");
        assert_eq!(
            full.outcome(),
            Outcome::Win {
                player: Player::X,
                line: [0, 1, 2]
            }
        );
    }

    #[test]
    fn first_line_in_table_order_wins_ties() {
        // Rows 0 and 2 are both complete; the scan must report row 0.
        let pathological = board("XXXOO.XXX");
        assert_eq!(
            pathological.outcome(),
            Outcome::Win {
                player: Player::X,
                line: [0, 1, 2]
            }
        );
    }

    #[test]
    fn full_board_without_a_line_is_a_draw() {
        assert_eq!(board("XOXXOOOXX").outcome(), Outcome::Draw);
    }

    #[test]
    fn near_miss_board_stays_in_progress_until_column_completes() {
        // Column [1,4,7] is O,O,_ and diagonal [2,4,6] is X,O,O; neither
        // is a win yet.
        let mut near_miss = board("XOXXOOO.X");
        assert_eq!(near_miss.outcome(), Outcome::InProgress);

        near_miss.set(7, Cell::Taken(Player::O));
        assert_eq!(
            near_miss.outcome(),
            Outcome::Win {
                player: Player::O,
                line: [1, 4, 7]
            }
        );
    }

    #[test]
    fn filled_counts_non_empty_cells() {
        assert_eq!(Board::empty().filled(), 0);
        assert_eq!(board("XO.......").filled(), 2);
        assert_eq!(board("XOXXOOOXX").filled(), 9);
        assert!(board("XOXXOOOXX").is_full());
        assert!(!board("XOXXOOO.X").is_full());
    }

    #[test]
    fn out_of_range_access_is_safe() {
        let mut grid = Board::empty();
        assert_eq!(grid.cell(9), None);
        assert!(!grid.set(9, Cell::Taken(Player::X)));
        assert_eq!(grid, Board::empty());
    }

    #[test]
    fn display_renders_three_rows() {
        let rendered = board("XOXXOOO.X").to_string();
        assert_eq!(rendered, "X O X\nX O O\nO . X");
    }
}
