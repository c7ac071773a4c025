//! Who sits on a color.

use crate::persistence::{SeatRecord, UserId};
use std::sync::Arc;
use strictly_othello::{MoveSelectionPolicy, PolicyKind};
use tracing::instrument;

/// A participant bound to one color of a session.
#[derive(Debug, Clone)]
pub enum Participant {
    /// A chat user.
    Human {
        /// Chat-platform identity.
        id: UserId,
        /// Display name.
        name: String,
    },
    /// A move selection policy.
    Automated {
        /// Display name.
        name: String,
        /// The policy choosing its moves.
        policy: Arc<dyn MoveSelectionPolicy>,
    },
}

impl Participant {
    /// Creates a human participant.
    pub fn human(id: UserId, name: impl Into<String>) -> Self {
        Participant::Human {
            id,
            name: name.into(),
        }
    }

    /// Creates an automated participant playing a built-in policy.
    pub fn automated(name: impl Into<String>, kind: PolicyKind) -> Self {
        Participant::Automated {
            name: name.into(),
            policy: kind.build(),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            Participant::Human { name, .. } | Participant::Automated { name, .. } => name,
        }
    }

    /// User id for humans.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Participant::Human { id, .. } => Some(*id),
            Participant::Automated { .. } => None,
        }
    }

    /// Checks whether this seat is played by a policy.
    pub fn is_automated(&self) -> bool {
        matches!(self, Participant::Automated { .. })
    }

    /// The storable form of this seat.
    pub fn seat(&self) -> SeatRecord {
        match self {
            Participant::Human { id, name } => SeatRecord::new(Some(*id), name.clone(), None),
            Participant::Automated { name, policy } => {
                SeatRecord::new(None, name.clone(), Some(policy.kind()))
            }
        }
    }

    /// Rebuilds a participant from its stored seat.
    ///
    /// Seats without a user id are automated; a missing policy falls back to
    /// the default one.
    #[instrument(skip(seat), fields(name = %seat.name()))]
    pub fn from_seat(seat: &SeatRecord) -> Self {
        match seat.user_id() {
            Some(id) => Participant::human(*id, seat.name().clone()),
            None => Participant::automated(seat.name().clone(), seat.policy().unwrap_or_default()),
        }
    }
}
