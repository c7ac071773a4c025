//! Core domain types for Othello.

use serde::{Deserialize, Serialize};

/// Side length of the board.
pub const BOARD_SIZE: usize = 8;

/// Number of cells on the board.
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// A side in the game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Player {
    /// Black (moves first).
    Black,
    /// White.
    White,
}

impl Player {
    /// Returns the opponent player.
    pub fn opponent(self) -> Self {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }
}

/// Contents of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// No disk.
    #[default]
    Empty,
    /// Black disk.
    Black,
    /// White disk.
    White,
}

impl Cell {
    /// Returns the player owning this cell, if any.
    pub fn player(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::Black => Some(Player::Black),
            Cell::White => Some(Player::White),
        }
    }

    /// Checks if the cell holds no disk.
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        match player {
            Player::Black => Cell::Black,
            Player::White => Cell::White,
        }
    }
}

/// A coordinate on the board. Always in bounds once constructed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("({}, {})", row, col)]
pub struct Position {
    row: u8,
    col: u8,
}

impl Position {
    /// Creates a position, returning `None` when outside the 8×8 grid.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Self {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    /// Row index (0-7, top to bottom).
    pub fn row(self) -> usize {
        self.row as usize
    }

    /// Column index (0-7, left to right).
    pub fn col(self) -> usize {
        self.col as usize
    }

    /// Steps one cell in the given direction, or `None` at the edge.
    pub fn step(self, (dr, dc): (i8, i8)) -> Option<Self> {
        let row = self.row as i8 + dr;
        let col = self.col as i8 + dc;
        if row < 0 || col < 0 {
            return None;
        }
        Self::new(row as usize, col as usize)
    }

    /// All 64 positions in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE).flat_map(|row| {
            (0..BOARD_SIZE).map(move |col| Position {
                row: row as u8,
                col: col as u8,
            })
        })
    }
}

/// 8×8 Othello board.
///
/// Cells are only changed by the move rules in [`crate::rules`]; callers get
/// read-only access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates a board in the canonical starting position.
    ///
    /// Black on (3,3) and (4,4), White on (3,4) and (4,3).
    pub fn new() -> Self {
        let mut board = Self::empty();
        board.cells[3][3] = Cell::Black;
        board.cells[4][4] = Cell::Black;
        board.cells[3][4] = Cell::White;
        board.cells[4][3] = Cell::White;
        board
    }

    /// Creates a board with no disks.
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Restores a board from a stored snapshot.
    pub fn from_rows(cells: [[Cell; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    /// Gets the cell at a position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.row()][pos.col()]
    }

    /// Bounds-checked lookup by raw coordinates.
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        Position::new(row, col).map(|pos| self.get(pos))
    }

    /// Checks if a position holds no disk.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos).is_empty()
    }

    /// Returns the grid as rows.
    pub fn rows(&self) -> &[[Cell; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    /// Counts cells holding the given value.
    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().flatten().filter(|&&c| c == cell).count()
    }

    /// Number of disks owned by a player.
    pub fn disks(&self, player: Player) -> usize {
        self.count(player.into())
    }

    /// Number of empty cells.
    pub fn empty_cells(&self) -> usize {
        self.count(Cell::Empty)
    }

    pub(crate) fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.row()][pos.col()] = cell;
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_is_involution() {
        assert_eq!(Player::Black.opponent(), Player::White);
        assert_eq!(Player::White.opponent().opponent(), Player::White);
    }

    #[test]
    fn test_starting_position() {
        let board = Board::new();
        assert_eq!(board.disks(Player::Black), 2);
        assert_eq!(board.disks(Player::White), 2);
        assert_eq!(board.empty_cells(), 60);
        assert_eq!(board.cell(3, 3), Some(Cell::Black));
        assert_eq!(board.cell(4, 4), Some(Cell::Black));
        assert_eq!(board.cell(3, 4), Some(Cell::White));
        assert_eq!(board.cell(4, 3), Some(Cell::White));
    }

    #[test]
    fn test_out_of_bounds_lookup() {
        let board = Board::new();
        assert_eq!(board.cell(8, 0), None);
        assert_eq!(board.cell(0, 8), None);
        assert!(Position::new(7, 7).is_some());
    }

    #[test]
    fn test_step_stops_at_edge() {
        let corner = Position::new(0, 0).unwrap();
        assert_eq!(corner.step((-1, 0)), None);
        assert_eq!(corner.step((0, -1)), None);
        assert_eq!(corner.step((1, 1)), Position::new(1, 1));
        let far = Position::new(7, 7).unwrap();
        assert_eq!(far.step((1, 0)), None);
    }

    #[test]
    fn test_all_positions_row_major() {
        let all: Vec<_> = Position::all().collect();
        assert_eq!(all.len(), CELL_COUNT);
        assert_eq!(all[0], Position::new(0, 0).unwrap());
        assert_eq!(all[9], Position::new(1, 1).unwrap());
        assert_eq!(all[63], Position::new(7, 7).unwrap());
    }

    #[test]
    fn test_player_string_round_trip() {
        let name: &'static str = Player::White.into();
        assert_eq!(name, "white");
        assert_eq!("black".parse::<Player>().ok(), Some(Player::Black));
    }
}
