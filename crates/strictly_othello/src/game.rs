//! Game state: board, side to move, and status.

use crate::rules::{self, Turn};
use crate::{Board, Move, MoveError, Player, Position};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Player won the game.
    Winner(Player),
    /// Game ended in a draw.
    Draw,
}

impl Outcome {
    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Player> {
        match self {
            Outcome::Winner(player) => Some(*player),
            Outcome::Draw => None,
        }
    }

    /// Returns true if the game was a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Winner(player) => write!(f, "{} wins", player),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

/// How a game came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Neither side had a legal move.
    NoLegalMoves,
    /// This player resigned.
    Resigned(Player),
}

/// Current status of the game.
///
/// An ended game always carries its outcome, so there is no way to be
/// ended without one or in progress with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Game is ongoing.
    InProgress,
    /// Game is over.
    Ended {
        /// Final result.
        outcome: Outcome,
        /// Why it ended.
        reason: EndReason,
    },
}

impl GameStatus {
    /// Returns the outcome of an ended game.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            GameStatus::InProgress => None,
            GameStatus::Ended { outcome, .. } => Some(*outcome),
        }
    }

    /// Checks if the game is over.
    pub fn is_ended(&self) -> bool {
        matches!(self, GameStatus::Ended { .. })
    }
}

/// What happened when a move was played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    /// The move that was played.
    pub mv: Move,
    /// Opponent disks turned over.
    pub flipped: usize,
    /// Who moves next, or terminal.
    pub turn: Turn,
}

impl MoveReport {
    /// The player forced to pass by this move, if any.
    pub fn passed(&self) -> Option<Player> {
        match self.turn {
            Turn::Next(next) if next == self.mv.player => Some(next.opponent()),
            _ => None,
        }
    }
}

/// Complete Othello game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    current_player: Player,
    status: GameStatus,
}

impl GameState {
    /// Creates a game in the starting position with Black to move.
    #[instrument]
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            current_player: Player::Black,
            status: GameStatus::InProgress,
        }
    }

    /// Rebuilds a game from a stored board and side to move.
    ///
    /// Status is derived from the board: a position where nobody can move is
    /// ended with the disk-count outcome.
    #[instrument(skip(board))]
    pub fn restore(board: Board, current_player: Player) -> Self {
        let status = if rules::is_terminal(&board) {
            GameStatus::Ended {
                outcome: rules::winner(&board),
                reason: EndReason::NoLegalMoves,
            }
        } else {
            GameStatus::InProgress
        };
        let mut game = Self {
            board,
            current_player,
            status,
        };
        // A snapshot taken on a stuck side is advanced past the pass.
        if !game.status.is_ended() && rules::legal_moves(&game.board, current_player).is_empty() {
            warn!(%current_player, "Restored side has no move, passing");
            game.current_player = current_player.opponent();
        }
        game
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the player to move. After the game ends this is the last side
    /// that held the turn.
    pub fn current_player(&self) -> Player {
        self.current_player
    }

    /// Returns the game status.
    pub fn status(&self) -> &GameStatus {
        &self.status
    }

    /// Checks if the game is over.
    pub fn is_over(&self) -> bool {
        self.status.is_ended()
    }

    /// Legal moves for the side to move; empty once the game has ended.
    #[instrument(skip(self))]
    pub fn legal_moves(&self) -> Vec<Position> {
        if self.is_over() {
            Vec::new()
        } else {
            rules::legal_moves(&self.board, self.current_player)
        }
    }

    /// Plays a move, advancing the turn and ending the game when nobody can
    /// move.
    ///
    /// # Errors
    ///
    /// Refuses the move without touching the state when the game is over,
    /// the mover does not hold the turn, or the placement is illegal.
    #[instrument(skip(self), fields(current = %self.current_player))]
    pub fn play(&mut self, mv: Move) -> Result<MoveReport, MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }
        if mv.player != self.current_player {
            return Err(MoveError::WrongPlayer(mv.player));
        }

        let flipped = rules::place(&mut self.board, mv.player, mv.position)?;
        let turn = rules::advance(&self.board, mv.player);

        match turn {
            Turn::Next(next) => self.current_player = next,
            Turn::Terminal => {
                let outcome = rules::winner(&self.board);
                info!(%outcome, "Game over, no legal moves remain");
                self.status = GameStatus::Ended {
                    outcome,
                    reason: EndReason::NoLegalMoves,
                };
            }
        }

        #[cfg(debug_assertions)]
        if let Err(violations) = crate::invariants::check_game(self) {
            for violation in &violations {
                warn!(description = %violation.description, "Invariant violated");
            }
            debug_assert!(violations.is_empty(), "game invariants violated after {mv}");
        }

        let report = MoveReport { mv, flipped, turn };
        if let Some(passer) = report.passed() {
            debug!(%passer, "Player has no move and passes");
        }
        Ok(report)
    }

    /// Ends the game immediately with the opponent of `player` as winner.
    ///
    /// # Errors
    ///
    /// [`MoveError::GameOver`] if the game has already ended.
    #[instrument(skip(self))]
    pub fn resign(&mut self, player: Player) -> Result<Outcome, MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }
        let outcome = Outcome::Winner(player.opponent());
        info!(%player, %outcome, "Player resigned");
        self.status = GameStatus::Ended {
            outcome,
            reason: EndReason::Resigned(player),
        };
        Ok(outcome)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
