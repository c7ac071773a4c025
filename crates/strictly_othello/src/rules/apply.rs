//! Move application: placing a disk and flipping captured runs.

use super::capture::{capture_run, DIRECTIONS};
use crate::{Board, Cell, MoveError, Player, Position};
use tracing::{debug, instrument};

/// Places a disk for `player` at `pos` and flips every captured run.
///
/// Returns the number of flipped disks. Runs are collected from the
/// unmodified board before anything is written, so a refused move leaves the
/// board untouched.
///
/// # Errors
///
/// [`MoveError::Occupied`] when the cell holds a disk, [`MoveError::NoCapture`]
/// when no direction captures.
#[instrument(skip(board))]
pub fn place(board: &mut Board, player: Player, pos: Position) -> Result<usize, MoveError> {
    if !board.is_empty(pos) {
        return Err(MoveError::Occupied(pos));
    }

    let captured: Vec<Position> = DIRECTIONS
        .iter()
        .flat_map(|&dir| capture_run(board, player, pos, dir))
        .collect();

    if captured.is_empty() {
        return Err(MoveError::NoCapture(pos));
    }

    let disk = Cell::from(player);
    board.set(pos, disk);
    for &flip in &captured {
        board.set(flip, disk);
    }

    debug!(%player, %pos, flipped = captured.len(), "Disk placed");
    Ok(captured.len())
}

/// Applies a move if legal. Returns `false` and leaves the board unchanged
/// otherwise.
pub fn apply_move(board: &mut Board, player: Player, pos: Position) -> bool {
    place(board, player, pos).is_ok()
}
