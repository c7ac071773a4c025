//! First-class action types for Othello.
//!
//! A move is a player's intent to place a disk. It can be validated against
//! a board before anything is changed.

use super::{Player, Position};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A player placing a disk at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{} -> {}", player, position)]
pub struct Move {
    /// The player making the move.
    pub player: Player,
    /// Where the disk is placed.
    pub position: Position,
}

impl Move {
    /// Creates a new move.
    #[instrument]
    pub fn new(player: Player, position: Position) -> Self {
        Self { player, position }
    }
}

/// Why a move was refused by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// Coordinates outside the 8×8 grid.
    #[display("Position ({}, {}) is off the board", _0, _1)]
    OutOfBounds(usize, usize),

    /// The target cell already holds a disk.
    #[display("Cell {} is already occupied", _0)]
    Occupied(Position),

    /// No direction from the target captures an opponent disk.
    #[display("Placing at {} captures nothing", _0)]
    NoCapture(Position),

    /// The game has already ended.
    #[display("Game is already over")]
    GameOver,

    /// The mover is not the player whose turn it is.
    #[display("It is not {}'s turn", _0)]
    WrongPlayer(Player),
}

impl std::error::Error for MoveError {}
