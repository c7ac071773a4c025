//! Turn passing, termination and scoring.

use super::capture::is_legal;
use crate::{Board, Outcome, Player, Position};
use tracing::{debug, instrument};

/// Who moves after a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// This player moves next.
    Next(Player),
    /// Neither player can move; the game is over.
    Terminal,
}

/// Works out who moves after `just_moved` placed a disk.
///
/// The opponent moves if it can. If it cannot but `just_moved` can, the
/// opponent passes and `just_moved` goes again. If neither can, the game is
/// over no matter how many cells are still empty.
#[instrument(skip(board))]
pub fn advance(board: &Board, just_moved: Player) -> Turn {
    let candidate = just_moved.opponent();
    if has_move(board, candidate) {
        Turn::Next(candidate)
    } else if has_move(board, just_moved) {
        debug!(passing = %candidate, "Forced pass");
        Turn::Next(just_moved)
    } else {
        Turn::Terminal
    }
}

/// Checks that neither player has a legal move.
pub fn is_terminal(board: &Board) -> bool {
    !has_move(board, Player::Black) && !has_move(board, Player::White)
}

/// Disk counts as `(black, white)`.
pub fn score(board: &Board) -> (usize, usize) {
    (board.disks(Player::Black), board.disks(Player::White))
}

/// The side with more disks, or a draw on equal counts.
pub fn winner(board: &Board) -> Outcome {
    let (black, white) = score(board);
    match black.cmp(&white) {
        std::cmp::Ordering::Greater => Outcome::Winner(Player::Black),
        std::cmp::Ordering::Less => Outcome::Winner(Player::White),
        std::cmp::Ordering::Equal => Outcome::Draw,
    }
}

fn has_move(board: &Board, player: Player) -> bool {
    Position::all().any(|pos| is_legal(board, player, pos))
}
