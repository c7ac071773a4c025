//! Typed views handed to the presentation layer.
//!
//! Views carry data only; rendering belongs to whoever consumes them.

use crate::persistence::SessionId;
use serde::{Deserialize, Serialize};
use strictly_othello::{Cell, EndReason, Move, Outcome, Player, Position, BOARD_SIZE};

/// Seat information shown with a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    /// Display name.
    pub name: String,
    /// Whether a policy plays this seat.
    pub automated: bool,
}

/// Lifecycle phase visible from outside the session guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "player")]
pub enum SessionPhase {
    /// Waiting for a human holding this color.
    AwaitingHuman(Player),
    /// Waiting for the automated reply of this color.
    AwaitingAutomated(Player),
    /// Finished.
    Ended,
}

/// Snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session id.
    pub id: SessionId,
    /// Board cells, row-major.
    pub board: [[Cell; BOARD_SIZE]; BOARD_SIZE],
    /// Side to move (last mover's opponent once ended).
    pub current_player: Player,
    /// Legal moves for the side to move.
    pub legal_moves: Vec<Position>,
    /// Black disks.
    pub black_score: usize,
    /// White disks.
    pub white_score: usize,
    /// Phase of the turn loop.
    pub phase: SessionPhase,
    /// Outcome once ended.
    pub outcome: Option<Outcome>,
    /// Why it ended.
    pub end_reason: Option<EndReason>,
    /// Black seat.
    pub black: SeatView,
    /// White seat.
    pub white: SeatView,
    /// Moves applied since the session was loaded.
    pub moves_played: usize,
}

impl SessionView {
    /// Checks if the session is over.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Notification published when a session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was created.
    Started(SessionView),
    /// A move was applied.
    MoveApplied {
        /// The move.
        mv: Move,
        /// Disks turned over.
        flipped: usize,
        /// Player forced to pass by it.
        passed: Option<Player>,
        /// State after the move.
        view: SessionView,
    },
    /// An automated reply has been scheduled.
    AutomatedThinking {
        /// Session id.
        session: SessionId,
        /// Color about to move.
        player: Player,
    },
    /// The session finished.
    Ended(SessionView),
    /// An automated turn could not be played and is waiting for a retry.
    Stalled {
        /// Session id.
        session: SessionId,
        /// Color whose turn stalled.
        player: Player,
        /// What went wrong.
        reason: String,
    },
}

impl SessionEvent {
    /// Session the event is about.
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::Started(view) | SessionEvent::Ended(view) => view.id,
            SessionEvent::MoveApplied { view, .. } => view.id,
            SessionEvent::AutomatedThinking { session, .. }
            | SessionEvent::Stalled { session, .. } => *session,
        }
    }
}
