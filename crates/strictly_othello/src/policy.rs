//! Move selection for automated participants.
//!
//! A policy only picks one entry from the legal moves it is handed; turn
//! order, validation and application stay with the caller. New strategies
//! plug in by implementing [`MoveSelectionPolicy`].

use crate::rules;
use crate::{Board, Player, Position};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Strategy that chooses a move for an automated participant.
pub trait MoveSelectionPolicy: Send + Sync + std::fmt::Debug {
    /// Which built-in policy this is.
    fn kind(&self) -> PolicyKind;

    /// Picks one of `legal_moves`.
    ///
    /// Must return a member of `legal_moves`, and `None` only when it is
    /// empty. Callers treat anything else as a contract violation.
    fn select_move(&self, board: &Board, player: Player, legal_moves: &[Position]) -> Option<Position>;
}

/// The built-in policies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolicyKind {
    /// Uniformly random legal move.
    #[default]
    Random,
    /// First legal move in row-major order.
    FirstLegal,
    /// Move flipping the most disks.
    Greedy,
}

impl PolicyKind {
    /// Builds a fresh instance of this policy.
    #[instrument]
    pub fn build(self) -> Arc<dyn MoveSelectionPolicy> {
        match self {
            PolicyKind::Random => Arc::new(RandomPolicy::new()),
            PolicyKind::FirstLegal => Arc::new(FirstLegalPolicy),
            PolicyKind::Greedy => Arc::new(GreedyPolicy),
        }
    }
}

/// Picks a legal move uniformly at random.
#[derive(Debug, Default)]
pub struct RandomPolicy {
    seeded: Option<Mutex<StdRng>>,
}

impl RandomPolicy {
    /// Creates a policy drawing from the thread-local generator.
    pub fn new() -> Self {
        Self { seeded: None }
    }

    /// Creates a reproducible policy from a seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl MoveSelectionPolicy for RandomPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Random
    }

    fn select_move(&self, _board: &Board, player: Player, legal_moves: &[Position]) -> Option<Position> {
        let choice = match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                legal_moves.choose(&mut *rng).copied()
            }
            None => legal_moves.choose(&mut rand::rng()).copied(),
        };
        debug!(%player, options = legal_moves.len(), ?choice, "Random policy chose");
        choice
    }
}

/// Picks the first legal move.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstLegalPolicy;

impl MoveSelectionPolicy for FirstLegalPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::FirstLegal
    }

    fn select_move(&self, _board: &Board, _player: Player, legal_moves: &[Position]) -> Option<Position> {
        legal_moves.first().copied()
    }
}

/// Picks the move that turns over the most disks; ties go to the earlier move.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPolicy;

impl MoveSelectionPolicy for GreedyPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Greedy
    }

    fn select_move(&self, board: &Board, player: Player, legal_moves: &[Position]) -> Option<Position> {
        let mut best: Option<(usize, Position)> = None;
        for &candidate in legal_moves {
            let mut scratch = board.clone();
            let Ok(flipped) = rules::place(&mut scratch, player, candidate) else {
                continue;
            };
            if best.is_none_or(|(most, _)| flipped > most) {
                best = Some((flipped, candidate));
            }
        }
        best.map(|(_, pos)| pos)
    }
}
