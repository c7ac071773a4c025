//! Database models and their conversion to domain records.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use strictly_othello::{Board, GameStatus, Player, PolicyKind};
use tracing::instrument;

use crate::db::{DbError, schema};
use crate::persistence::{
    InviteRecord, InviteStatus, SeatRecord, SessionSnapshot, UserRecord, outcome_from_db,
    reason_from_db,
};

/// User database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
#[diesel(primary_key(user_id))]
pub struct User {
    user_id: i64,
    username: Option<String>,
    display_name: String,
    created_at: NaiveDateTime,
}

impl From<User> for UserRecord {
    fn from(user: User) -> Self {
        UserRecord::new(user.user_id, user.username, user.display_name)
    }
}

/// Insertable user model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    user_id: i64,
    username: Option<String>,
    display_name: String,
}

/// Invite database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::invites)]
pub struct Invite {
    id: i32,
    from_user: i64,
    to_user: i64,
    status: String,
    created_at: NaiveDateTime,
}

impl Invite {
    /// Converts to the domain record, parsing the stored status.
    #[instrument(skip(self), fields(invite_id = self.id))]
    pub fn to_record(&self) -> Result<InviteRecord, DbError> {
        let status: InviteStatus = self
            .status
            .parse()
            .map_err(|_| DbError::corrupt(format!("Invalid invite status: '{}'", self.status)))?;
        Ok(InviteRecord::new(self.id, self.from_user, self.to_user, status))
    }
}

/// Insertable invite model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::invites)]
pub struct NewInvite {
    from_user: i64,
    to_user: i64,
    status: String,
}

/// Game database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRow {
    id: i32,
    black_user: Option<i64>,
    black_name: String,
    black_policy: Option<String>,
    white_user: Option<i64>,
    white_name: String,
    white_policy: Option<String>,
    board_state: String,
    current_player: String,
    status: String,
    winner: Option<String>,
    end_reason: Option<String>,
    created_at: NaiveDateTime,
}

#[track_caller]
fn parse_seat(user: Option<i64>, name: &str, policy: Option<&str>) -> Result<SeatRecord, DbError> {
    let policy = policy
        .map(|p| {
            p.parse::<PolicyKind>()
                .map_err(|_| DbError::corrupt(format!("Invalid policy: '{}'", p)))
        })
        .transpose()?;
    Ok(SeatRecord::new(user, name.to_string(), policy))
}

impl GameRow {
    /// Converts the stored row into a session snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the board JSON, side to move, policy or outcome
    /// columns hold values that do not parse.
    #[instrument(skip(self), fields(game_id = self.id))]
    pub fn to_snapshot(&self) -> Result<SessionSnapshot, DbError> {
        let board: Board = serde_json::from_str(&self.board_state)?;
        let current_player: Player = self.current_player.parse().map_err(|_| {
            DbError::corrupt(format!("Invalid current player: '{}'", self.current_player))
        })?;

        let status = match self.status.as_str() {
            "active" => GameStatus::InProgress,
            "ended" => {
                let winner = self
                    .winner
                    .as_deref()
                    .ok_or_else(|| DbError::corrupt("Ended game without winner"))?;
                let reason = self
                    .end_reason
                    .as_deref()
                    .ok_or_else(|| DbError::corrupt("Ended game without end reason"))?;
                GameStatus::Ended {
                    outcome: outcome_from_db(winner)?,
                    reason: reason_from_db(reason)?,
                }
            }
            other => return Err(DbError::corrupt(format!("Invalid game status: '{}'", other))),
        };

        Ok(SessionSnapshot::new(
            self.id,
            parse_seat(self.black_user, &self.black_name, self.black_policy.as_deref())?,
            parse_seat(self.white_user, &self.white_name, self.white_policy.as_deref())?,
            board,
            current_player,
            status,
        ))
    }
}

/// Insertable game model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGameRow {
    black_user: Option<i64>,
    black_name: String,
    black_policy: Option<String>,
    white_user: Option<i64>,
    white_name: String,
    white_policy: Option<String>,
    board_state: String,
}

/// Move log database model.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::moves)]
#[diesel(belongs_to(GameRow, foreign_key = game_id))]
pub struct MoveRow {
    id: i32,
    game_id: i32,
    player: String,
    row: i32,
    col: i32,
    flipped: i32,
    created_at: NaiveDateTime,
}

/// Insertable move log model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::moves)]
pub struct NewMoveRow {
    game_id: i32,
    player: String,
    row: i32,
    col: i32,
    flipped: i32,
}
