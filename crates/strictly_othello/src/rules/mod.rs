//! Game rules for Othello.
//!
//! Pure functions over a [`Board`](crate::Board). Legality, flipping and turn
//! passing are kept apart from board storage so each can be tested alone.

pub mod apply;
pub mod capture;
pub mod turn;

pub use apply::{apply_move, place};
pub use capture::{is_legal, legal_moves, DIRECTIONS};
pub use turn::{advance, is_terminal, score, winner, Turn};
