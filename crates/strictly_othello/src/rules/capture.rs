//! Legal move detection.

use crate::{Board, Cell, Player, Position};
use tracing::instrument;

/// The eight directions radiating from a cell: two axes and two diagonals.
pub const DIRECTIONS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Returns the opponent disks captured in one direction by placing at `pos`.
///
/// The run must start right next to `pos`, contain only opponent disks, and
/// end on one of `player`'s disks. Anything else captures nothing.
pub(crate) fn capture_run(
    board: &Board,
    player: Player,
    pos: Position,
    direction: (i8, i8),
) -> Vec<Position> {
    let own = Cell::from(player);
    let theirs = Cell::from(player.opponent());
    let mut run = Vec::new();
    let mut cursor = pos.step(direction);

    while let Some(next) = cursor {
        let cell = board.get(next);
        if cell == theirs {
            run.push(next);
            cursor = next.step(direction);
        } else if cell == own {
            return run;
        } else {
            break;
        }
    }

    Vec::new()
}

/// Checks whether `player` may place a disk at `pos`.
///
/// The cell must be empty and at least one direction must hold a bounded run
/// of opponent disks.
#[instrument(level = "trace", skip(board))]
pub fn is_legal(board: &Board, player: Player, pos: Position) -> bool {
    board.is_empty(pos)
        && DIRECTIONS
            .iter()
            .any(|&dir| !capture_run(board, player, pos, dir).is_empty())
}

/// All legal placements for `player`, scanned row by row then column.
#[instrument(level = "trace", skip(board))]
pub fn legal_moves(board: &Board, player: Player) -> Vec<Position> {
    Position::all()
        .filter(|&pos| is_legal(board, player, pos))
        .collect()
}
