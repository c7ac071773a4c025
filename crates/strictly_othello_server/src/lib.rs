//! Othello session orchestration for chat front ends.
//!
//! # Architecture
//!
//! - **Orchestrator**: serializes requests per session and drives automated replies
//! - **Registry**: process-wide map of live sessions
//! - **Persistence**: storage trait with in-memory and SQLite implementations
//! - **Stats**: per-player results over finished games
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_othello::{Player, PolicyKind};
//! use strictly_othello_server::{InMemoryPersistence, SessionOrchestrator, UserRecord};
//!
//! # async fn example() -> Result<(), strictly_othello_server::SessionError> {
//! let orchestrator = SessionOrchestrator::new(Arc::new(InMemoryPersistence::new()));
//! orchestrator
//!     .register_user(UserRecord::new(1, Some("ana".to_string()), "Ana".to_string()))
//!     .await?;
//! let view = orchestrator
//!     .start_vs_automated(1, Player::Black, Some(PolicyKind::Greedy))
//!     .await?;
//! orchestrator.submit_move(view.id, 1, 2, 4).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
pub mod db;
mod error;
mod orchestrator;
mod participant;
mod persistence;
mod registry;
mod session;
mod stats;
mod view;

pub use config::{ConfigError, ServerConfig};
pub use db::{DbError, DbErrorKind, GameRepository, MIGRATIONS};
pub use error::SessionError;
pub use orchestrator::{MAX_AUTOMATED_CHAIN, SessionOrchestrator};
pub use participant::Participant;
pub use persistence::{
    InMemoryPersistence, InviteId, InviteRecord, InviteStatus, Persistence, SeatRecord, SessionId,
    SessionSnapshot, UserId, UserRecord,
};
pub use registry::{SessionEntry, SessionHandle, SessionRegistry};
pub use session::GameSession;
pub use stats::{AggregatedStats, OpponentRecord, PlayerStats};
pub use view::{SeatView, SessionEvent, SessionPhase, SessionView};
