//! SQLite persistence for users, invites, sessions and the move log.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::{DbError, DbErrorKind};
pub use models::{GameRow, Invite, MoveRow, User};
pub use repository::{GameRepository, MIGRATIONS};
