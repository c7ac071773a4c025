//! Win/loss statistics computed from finished games.

use crate::persistence::{SessionSnapshot, UserId};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strictly_othello::{Player, PolicyKind};
use tracing::{debug, instrument};

/// Aggregated game statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct AggregatedStats {
    total_games: u32,
    wins: u32,
    losses: u32,
    draws: u32,
}

impl AggregatedStats {
    /// Creates new aggregated statistics.
    pub fn new(total_games: u32, wins: u32, losses: u32, draws: u32) -> Self {
        Self {
            total_games,
            wins,
            losses,
            draws,
        }
    }

    /// Calculates win rate as a percentage (0.0–100.0).
    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            0.0
        } else {
            (self.wins as f64 / self.total_games as f64) * 100.0
        }
    }

    fn record(&mut self, result: GameResult) {
        self.total_games += 1;
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Loss => self.losses += 1,
            GameResult::Draw => self.draws += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameResult {
    Win,
    Loss,
    Draw,
}

/// Results against one opponent.
///
/// Humans are told apart by user id and automated seats by policy, so two
/// opponents sharing a display name get separate records.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct OpponentRecord {
    opponent: String,
    opponent_id: Option<UserId>,
    policy: Option<PolicyKind>,
    stats: AggregatedStats,
}

type OpponentKey = (String, Option<UserId>, Option<PolicyKind>);

/// A player's statistics, overall and per opponent.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PlayerStats {
    user: UserId,
    overall: AggregatedStats,
    as_black: AggregatedStats,
    as_white: AggregatedStats,
    opponents: Vec<OpponentRecord>,
}

impl PlayerStats {
    /// Tallies the ended games `user` took part in.
    ///
    /// Games the user did not sit at, and games still in progress, are
    /// skipped. Opponents are listed by name, then user id, then policy.
    #[instrument(skip(games), fields(games = games.len()))]
    pub fn compute(user: UserId, games: &[SessionSnapshot]) -> Self {
        let mut overall = AggregatedStats::default();
        let mut as_black = AggregatedStats::default();
        let mut as_white = AggregatedStats::default();
        let mut by_opponent: BTreeMap<OpponentKey, AggregatedStats> = BTreeMap::new();

        for game in games {
            let Some(outcome) = game.status().outcome() else {
                continue;
            };
            let color = if *game.black().user_id() == Some(user) {
                Player::Black
            } else if *game.white().user_id() == Some(user) {
                Player::White
            } else {
                continue;
            };
            let result = match outcome.winner() {
                Some(winner) if winner == color => GameResult::Win,
                Some(_) => GameResult::Loss,
                None => GameResult::Draw,
            };

            overall.record(result);
            match color {
                Player::Black => as_black.record(result),
                Player::White => as_white.record(result),
            }
            let seat = game.seat(color.opponent());
            by_opponent
                .entry((seat.name().clone(), *seat.user_id(), *seat.policy()))
                .or_default()
                .record(result);
        }

        debug!(
            total = overall.total_games,
            wins = overall.wins,
            "Stats computed"
        );
        Self {
            user,
            overall,
            as_black,
            as_white,
            opponents: by_opponent
                .into_iter()
                .map(|((opponent, opponent_id, policy), stats)| OpponentRecord {
                    opponent,
                    opponent_id,
                    policy,
                    stats,
                })
                .collect(),
        }
    }
}
