//! Pure Othello game logic.
//!
//! Board representation, legal-move computation, disk flipping, the
//! forced-pass and termination rules, and pluggable move selection for
//! automated players. Nothing here knows about sessions, storage or
//! presentation.
//!
//! # Example
//!
//! ```
//! use strictly_othello::{GameState, Move, Player, Position};
//!
//! let mut game = GameState::new();
//! let opening = Position::new(2, 4).unwrap();
//! let report = game.play(Move::new(Player::Black, opening)).unwrap();
//! assert_eq!(report.flipped, 1);
//! assert_eq!(game.current_player(), Player::White);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod game;
pub mod invariants;
mod policy;
pub mod rules;
mod types;

pub use action::{Move, MoveError};
pub use game::{EndReason, GameState, GameStatus, MoveReport, Outcome};
pub use policy::{FirstLegalPolicy, GreedyPolicy, MoveSelectionPolicy, PolicyKind, RandomPolicy};
pub use rules::Turn;
pub use types::{Board, Cell, Player, Position, BOARD_SIZE, CELL_COUNT};
