//! Durable storage as seen by the orchestrator.
//!
//! The orchestrator keeps the live session in memory and writes checkpoints
//! through [`Persistence`]. [`InMemoryPersistence`] backs tests and runs
//! without a database; [`GameRepository`](crate::GameRepository) backs the
//! binary with SQLite.

use crate::db::DbError;
use derive_getters::Getters;
use derive_new::new;
use std::collections::HashMap;
use std::sync::Mutex;
use strictly_othello::{Board, EndReason, GameStatus, Move, Outcome, Player, PolicyKind};
use tracing::{debug, info, instrument};

/// Chat-platform user identity.
pub type UserId = i64;

/// Game session identifier.
pub type SessionId = i32;

/// Invite identifier.
pub type InviteId = i32;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct UserRecord {
    id: UserId,
    username: Option<String>,
    display_name: String,
}

/// Lifecycle of an invite.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum InviteStatus {
    /// Waiting for the invited user.
    Pending,
    /// Accepted; a session was started.
    Accepted,
    /// Declined.
    Rejected,
}

/// An invitation from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct InviteRecord {
    id: InviteId,
    from_user: UserId,
    to_user: UserId,
    status: InviteStatus,
}

/// Who sits on one color, in storable form.
///
/// Humans carry a user id, automated seats carry the policy they play with.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct SeatRecord {
    user_id: Option<UserId>,
    name: String,
    policy: Option<PolicyKind>,
}

/// Stored state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct SessionSnapshot {
    id: SessionId,
    black: SeatRecord,
    white: SeatRecord,
    board: Board,
    current_player: Player,
    status: GameStatus,
}

impl SessionSnapshot {
    /// The seat belonging to a color.
    pub fn seat(&self, player: Player) -> &SeatRecord {
        match player {
            Player::Black => &self.black,
            Player::White => &self.white,
        }
    }

    /// Checks if `user` sits on either color.
    pub fn involves(&self, user: UserId) -> bool {
        self.black.user_id == Some(user) || self.white.user_id == Some(user)
    }
}

/// Storage collaborator for sessions, users, invites and the move log.
pub trait Persistence: Send + Sync + std::fmt::Debug {
    /// Creates or refreshes a user.
    fn register_user(&self, user: &UserRecord) -> Result<(), DbError>;

    /// Looks up a user by id.
    fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, DbError>;

    /// Looks up a user by username, case-insensitively and without a leading `@`.
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError>;

    /// Stores a pending invite and returns its id.
    fn create_invite(&self, from_user: UserId, to_user: UserId) -> Result<InviteId, DbError>;

    /// Looks up an invite.
    fn get_invite(&self, id: InviteId) -> Result<Option<InviteRecord>, DbError>;

    /// Changes an invite's status.
    fn update_invite_status(&self, id: InviteId, status: InviteStatus) -> Result<(), DbError>;

    /// Stores a new session in the starting position and returns its id.
    fn create_session(&self, black: &SeatRecord, white: &SeatRecord) -> Result<SessionId, DbError>;

    /// Loads a session snapshot.
    fn load_session(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DbError>;

    /// Checkpoints the board and the side to move.
    fn save_board_and_turn(&self, id: SessionId, board: &Board, current_player: Player) -> Result<(), DbError>;

    /// Marks a session ended with its outcome.
    fn finalize_session(&self, id: SessionId, outcome: Outcome, reason: EndReason) -> Result<(), DbError>;

    /// The active session a user takes part in, if any.
    fn find_active_session_for(&self, user: UserId) -> Result<Option<SessionId>, DbError>;

    /// Appends a move to the session's log.
    fn record_move(&self, id: SessionId, mv: &Move, flipped: usize) -> Result<(), DbError>;

    /// All ended sessions a user took part in, oldest first.
    fn ended_sessions_for(&self, user: UserId) -> Result<Vec<SessionSnapshot>, DbError>;
}

/// Converts an outcome to the string stored in the database.
pub(crate) fn outcome_to_db(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Winner(Player::Black) => "black",
        Outcome::Winner(Player::White) => "white",
        Outcome::Draw => "draw",
    }
}

/// Parses an outcome from the string stored in the database.
#[track_caller]
pub(crate) fn outcome_from_db(s: &str) -> Result<Outcome, DbError> {
    match s {
        "black" => Ok(Outcome::Winner(Player::Black)),
        "white" => Ok(Outcome::Winner(Player::White)),
        "draw" => Ok(Outcome::Draw),
        _ => Err(DbError::corrupt(format!("Invalid outcome: '{}'", s))),
    }
}

/// Converts an end reason to the string stored in the database.
pub(crate) fn reason_to_db(reason: EndReason) -> &'static str {
    match reason {
        EndReason::NoLegalMoves => "no_legal_moves",
        EndReason::Resigned(Player::Black) => "resigned_black",
        EndReason::Resigned(Player::White) => "resigned_white",
    }
}

/// Parses an end reason from the string stored in the database.
#[track_caller]
pub(crate) fn reason_from_db(s: &str) -> Result<EndReason, DbError> {
    match s {
        "no_legal_moves" => Ok(EndReason::NoLegalMoves),
        "resigned_black" => Ok(EndReason::Resigned(Player::Black)),
        "resigned_white" => Ok(EndReason::Resigned(Player::White)),
        _ => Err(DbError::corrupt(format!("Invalid end reason: '{}'", s))),
    }
}

/// Lowercases a username and strips a leading `@`.
pub(crate) fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, UserRecord>,
    invites: Vec<InviteRecord>,
    sessions: Vec<SessionSnapshot>,
    moves: HashMap<SessionId, Vec<(Move, usize)>>,
}

/// Volatile [`Persistence`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    state: Mutex<MemoryState>,
}

impl InMemoryPersistence {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory persistence");
        Self::default()
    }

    /// The move log of a session.
    pub fn moves(&self, id: SessionId) -> Vec<(Move, usize)> {
        self.lock().moves.get(&id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[track_caller]
    fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut SessionSnapshot) -> T,
    ) -> Result<T, DbError> {
        let mut state = self.lock();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DbError::not_found("session", id))?;
        Ok(f(session))
    }
}

impl Persistence for InMemoryPersistence {
    #[instrument(skip(self))]
    fn register_user(&self, user: &UserRecord) -> Result<(), DbError> {
        let mut stored = user.clone();
        stored.username = user.username.as_deref().map(normalize_username);
        self.lock().users.insert(user.id, stored);
        debug!(user_id = user.id, "User registered");
        Ok(())
    }

    fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, DbError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError> {
        let wanted = normalize_username(username);
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(wanted.as_str()))
            .cloned())
    }

    #[instrument(skip(self))]
    fn create_invite(&self, from_user: UserId, to_user: UserId) -> Result<InviteId, DbError> {
        let mut state = self.lock();
        let id = state.invites.len() as InviteId + 1;
        state
            .invites
            .push(InviteRecord::new(id, from_user, to_user, InviteStatus::Pending));
        Ok(id)
    }

    fn get_invite(&self, id: InviteId) -> Result<Option<InviteRecord>, DbError> {
        Ok(self.lock().invites.iter().find(|i| i.id == id).cloned())
    }

    #[instrument(skip(self))]
    fn update_invite_status(&self, id: InviteId, status: InviteStatus) -> Result<(), DbError> {
        let mut state = self.lock();
        let invite = state
            .invites
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DbError::not_found("invite", id))?;
        invite.status = status;
        Ok(())
    }

    #[instrument(skip(self))]
    fn create_session(&self, black: &SeatRecord, white: &SeatRecord) -> Result<SessionId, DbError> {
        let mut state = self.lock();
        let id = state.sessions.len() as SessionId + 1;
        state.sessions.push(SessionSnapshot::new(
            id,
            black.clone(),
            white.clone(),
            Board::new(),
            Player::Black,
            GameStatus::InProgress,
        ));
        info!(session_id = id, "Session stored");
        Ok(id)
    }

    fn load_session(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DbError> {
        Ok(self.lock().sessions.iter().find(|s| s.id == id).cloned())
    }

    fn save_board_and_turn(&self, id: SessionId, board: &Board, current_player: Player) -> Result<(), DbError> {
        self.with_session(id, |session| {
            session.board = board.clone();
            session.current_player = current_player;
        })
    }

    #[instrument(skip(self))]
    fn finalize_session(&self, id: SessionId, outcome: Outcome, reason: EndReason) -> Result<(), DbError> {
        self.with_session(id, |session| {
            session.status = GameStatus::Ended { outcome, reason };
        })
    }

    fn find_active_session_for(&self, user: UserId) -> Result<Option<SessionId>, DbError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| !s.status.is_ended() && s.involves(user))
            .map(|s| s.id))
    }

    fn record_move(&self, id: SessionId, mv: &Move, flipped: usize) -> Result<(), DbError> {
        self.lock().moves.entry(id).or_default().push((*mv, flipped));
        Ok(())
    }

    fn ended_sessions_for(&self, user: UserId) -> Result<Vec<SessionSnapshot>, DbError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.status.is_ended() && s.involves(user))
            .cloned()
            .collect())
    }
}
