//! Errors surfaced by session orchestration.

use crate::db::DbError;
use crate::persistence::{InviteId, SessionId, UserId};
use derive_more::Display;
use strictly_othello::{MoveError, Player, PolicyKind, Position};

/// Why a session request was rejected.
///
/// Every variant is produced before the session is mutated, so a rejected
/// request leaves the stored game exactly as it was.
#[derive(Debug, Clone, Display)]
pub enum SessionError {
    /// The engine refused the move.
    #[display("Illegal move: {}", _0)]
    IllegalMove(MoveError),

    /// The requester holds a seat but the other color is to move.
    #[display("Not your turn: {} to move", _0)]
    NotYourTurn(Player),

    /// No active or stored session has this id.
    #[display("Session {} not found", _0)]
    SessionNotFound(SessionId),

    /// The session has already finished.
    #[display("Session {} has already ended", _0)]
    SessionAlreadyEnded(SessionId),

    /// An automated policy broke its contract.
    #[display(
        "Policy {} returned {:?} for {} in session {}",
        policy,
        returned,
        player,
        session
    )]
    PolicyContractViolation {
        /// Session the policy was playing in.
        session: SessionId,
        /// Color the policy was playing.
        player: Player,
        /// Which policy misbehaved.
        policy: PolicyKind,
        /// What it returned.
        returned: Option<Position>,
    },

    /// The requester does not sit at this session.
    #[display("User {} is not a participant of session {}", user, session)]
    NotAParticipant {
        /// Session addressed.
        session: SessionId,
        /// Requester.
        user: UserId,
    },

    /// The user is already playing elsewhere.
    #[display("User {} is already in session {}", user, session)]
    AlreadyInGame {
        /// User in question.
        user: UserId,
        /// Their active session.
        session: SessionId,
    },

    /// No invite has this id.
    #[display("Invite {} not found", _0)]
    InviteNotFound(InviteId),

    /// The invite was already accepted or rejected, or addressed to someone else.
    #[display("Invite {} cannot be answered by this user", _0)]
    InviteNotPending(InviteId),

    /// A user tried to invite themselves.
    #[display("Cannot invite yourself")]
    SelfInvite,

    /// Both seats were given to the same user.
    #[display("User {} cannot hold both seats", _0)]
    SameUserBothSeats(UserId),

    /// No registered user matches.
    #[display("User '{}' not found", _0)]
    UserNotFound(String),

    /// Storage failed.
    #[display("{}", _0)]
    Persistence(DbError),
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::IllegalMove(e) => Some(e),
            SessionError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MoveError> for SessionError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::WrongPlayer(player) => SessionError::NotYourTurn(player.opponent()),
            other => SessionError::IllegalMove(other),
        }
    }
}

impl From<DbError> for SessionError {
    fn from(err: DbError) -> Self {
        SessionError::Persistence(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_player_maps_to_not_your_turn() {
        let err = SessionError::from(MoveError::WrongPlayer(Player::White));
        assert!(matches!(err, SessionError::NotYourTurn(Player::Black)));
    }

    #[test]
    fn test_illegal_move_keeps_source() {
        use std::error::Error;
        let err = SessionError::from(MoveError::GameOver);
        assert!(matches!(err, SessionError::IllegalMove(MoveError::GameOver)));
        assert!(err.source().is_some());
    }
}
