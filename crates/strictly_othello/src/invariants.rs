//! First-class invariants for Othello.
//!
//! Invariants are properties that hold for every reachable state. They are
//! checked after each move in debug builds and tested on their own.

use crate::rules;
use crate::{Board, GameState, GameStatus, CELL_COUNT};

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

impl<S, I1, I2, I3> InvariantSet<S> for (I1, I2, I3)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let violations: Vec<_> = [
            (I1::holds(state), I1::description()),
            (I2::holds(state), I2::description()),
            (I3::holds(state), I3::description()),
        ]
        .into_iter()
        .filter(|(holds, _)| !holds)
        .map(|(_, description)| InvariantViolation::new(description))
        .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Black, White and Empty cells always add up to 64.
pub struct DiskConservation;

impl Invariant<Board> for DiskConservation {
    fn holds(board: &Board) -> bool {
        use crate::Cell;
        board.count(Cell::Black) + board.count(Cell::White) + board.count(Cell::Empty) == CELL_COUNT
    }

    fn description() -> &'static str {
        "Black + White + Empty cells equal 64"
    }
}

impl Invariant<GameState> for DiskConservation {
    fn holds(game: &GameState) -> bool {
        <Self as Invariant<Board>>::holds(game.board())
    }

    fn description() -> &'static str {
        <Self as Invariant<Board>>::description()
    }
}

/// A game in progress always has a side to move that can actually move.
pub struct TurnHolderCanMove;

impl Invariant<GameState> for TurnHolderCanMove {
    fn holds(game: &GameState) -> bool {
        match game.status() {
            GameStatus::InProgress => {
                !rules::legal_moves(game.board(), game.current_player()).is_empty()
            }
            GameStatus::Ended { .. } => true,
        }
    }

    fn description() -> &'static str {
        "The player to move has a legal move while the game is in progress"
    }
}

/// A game ended by exhaustion really has no moves left.
pub struct ExhaustedMeansTerminal;

impl Invariant<GameState> for ExhaustedMeansTerminal {
    fn holds(game: &GameState) -> bool {
        match game.status() {
            GameStatus::Ended {
                reason: crate::EndReason::NoLegalMoves,
                ..
            } => rules::is_terminal(game.board()),
            _ => true,
        }
    }

    fn description() -> &'static str {
        "Games ended for lack of moves are terminal"
    }
}

/// All game-level invariants.
pub type GameInvariants = (DiskConservation, TurnHolderCanMove, ExhaustedMeansTerminal);

/// Checks every game-level invariant.
pub fn check_game(game: &GameState) -> Result<(), Vec<InvariantViolation>> {
    GameInvariants::check_all(game)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Move, Player, Position};

    #[test]
    fn test_new_game_holds() {
        assert!(check_game(&GameState::new()).is_ok());
    }

    #[test]
    fn test_conservation_over_a_played_game() {
        let mut game = GameState::new();
        while let Some(&target) = game.legal_moves().first() {
            let mover = game.current_player();
            game.play(Move::new(mover, target)).expect("legal move");
            assert!(<DiskConservation as Invariant<Board>>::holds(game.board()));
            assert!(check_game(&game).is_ok());
        }
        assert!(game.is_over());
    }

    #[test]
    fn test_restored_game_holds() {
        let mut board = Board::empty();
        board.set(Position::new(0, 0).unwrap(), crate::Cell::Black);
        board.set(Position::new(0, 1).unwrap(), crate::Cell::White);
        let game = GameState::restore(board, Player::Black);
        assert!(TurnHolderCanMove::holds(&game));
        assert!(check_game(&game).is_ok());
    }
}
