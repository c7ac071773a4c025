//! SQLite-backed [`Persistence`].

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use strictly_othello::{Board, EndReason, Move, Outcome, Player};
use tracing::{debug, info, instrument, warn};

use crate::db::models::{NewGameRow, NewInvite, NewMoveRow, NewUser};
use crate::db::{DbError, DbErrorKind, GameRow, Invite, MoveRow, User, schema};
use crate::persistence::{
    InviteId, InviteRecord, InviteStatus, Persistence, SeatRecord, SessionId, SessionSnapshot,
    UserId, UserRecord, normalize_username, outcome_to_db, reason_to_db,
};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database repository for users, invites, games and moves.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository for the database at the given path.
    ///
    /// Use `":memory:"` only for throwaway checks: every call opens a fresh
    /// connection, so an in-memory database does not survive between calls.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new(DbErrorKind::Config, "Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if connecting or migrating fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(DbErrorKind::Migration, e.to_string()))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| {
                DbError::new(
                    DbErrorKind::Connection,
                    format!("Failed to connect to '{}': {}", self.db_path, e),
                )
            })
    }

    /// Loads the logged moves of a game in play order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn moves_for(&self, id: SessionId) -> Result<Vec<MoveRow>, DbError> {
        let mut conn = self.connection()?;
        let moves = schema::moves::table
            .filter(schema::moves::game_id.eq(id))
            .order(schema::moves::id.asc())
            .load::<MoveRow>(&mut conn)?;
        debug!(count = moves.len(), "Moves loaded");
        Ok(moves)
    }

    fn games_for_user(
        &self,
        user: UserId,
        status: &str,
    ) -> Result<Vec<GameRow>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::games::table
            .filter(
                schema::games::black_user
                    .eq(user)
                    .or(schema::games::white_user.eq(user)),
            )
            .filter(schema::games::status.eq(status))
            .order(schema::games::id.asc())
            .load::<GameRow>(&mut conn)?;
        Ok(rows)
    }
}

fn seat_columns(seat: &SeatRecord) -> (Option<i64>, String, Option<String>) {
    (
        *seat.user_id(),
        seat.name().clone(),
        seat.policy().map(|p| p.to_string()),
    )
}

#[track_caller]
fn expect_one_row(updated: usize, what: &str, id: i32) -> Result<(), DbError> {
    if updated == 0 {
        warn!(id, what, "Update matched no rows");
        return Err(DbError::not_found(what, id));
    }
    Ok(())
}

impl Persistence for GameRepository {
    #[instrument(skip(self, user), fields(user_id = user.id()))]
    fn register_user(&self, user: &UserRecord) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let row = NewUser::new(
            *user.id(),
            user.username().as_deref().map(normalize_username),
            user.display_name().clone(),
        );
        diesel::replace_into(schema::users::table)
            .values(&row)
            .execute(&mut conn)?;
        info!("User registered");
        Ok(())
    }

    #[instrument(skip(self))]
    fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, DbError> {
        let mut conn = self.connection()?;
        let user = schema::users::table
            .find(id)
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user.map(UserRecord::from))
    }

    #[instrument(skip(self))]
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError> {
        let mut conn = self.connection()?;
        let user = schema::users::table
            .filter(schema::users::username.eq(normalize_username(username)))
            .first::<User>(&mut conn)
            .optional()?;
        if user.is_none() {
            debug!("User not found");
        }
        Ok(user.map(UserRecord::from))
    }

    #[instrument(skip(self))]
    fn create_invite(&self, from_user: UserId, to_user: UserId) -> Result<InviteId, DbError> {
        let mut conn = self.connection()?;
        let invite = diesel::insert_into(schema::invites::table)
            .values(&NewInvite::new(
                from_user,
                to_user,
                InviteStatus::Pending.to_string(),
            ))
            .returning(Invite::as_returning())
            .get_result(&mut conn)?;
        info!(invite_id = invite.id(), "Invite created");
        Ok(*invite.id())
    }

    #[instrument(skip(self))]
    fn get_invite(&self, id: InviteId) -> Result<Option<InviteRecord>, DbError> {
        let mut conn = self.connection()?;
        schema::invites::table
            .find(id)
            .first::<Invite>(&mut conn)
            .optional()?
            .map(|invite| invite.to_record())
            .transpose()
    }

    #[instrument(skip(self))]
    fn update_invite_status(&self, id: InviteId, status: InviteStatus) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let updated = diesel::update(schema::invites::table.find(id))
            .set(schema::invites::status.eq(status.to_string()))
            .execute(&mut conn)?;
        expect_one_row(updated, "invite", id)
    }

    #[instrument(skip(self, black, white), fields(black = %black.name(), white = %white.name()))]
    fn create_session(&self, black: &SeatRecord, white: &SeatRecord) -> Result<SessionId, DbError> {
        let mut conn = self.connection()?;
        let (black_user, black_name, black_policy) = seat_columns(black);
        let (white_user, white_name, white_policy) = seat_columns(white);
        let row = NewGameRow::new(
            black_user,
            black_name,
            black_policy,
            white_user,
            white_name,
            white_policy,
            serde_json::to_string(&Board::new())?,
        );
        let game = diesel::insert_into(schema::games::table)
            .values(&row)
            .returning(GameRow::as_returning())
            .get_result(&mut conn)?;
        info!(game_id = game.id(), "Game created");
        Ok(*game.id())
    }

    #[instrument(skip(self))]
    fn load_session(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DbError> {
        let mut conn = self.connection()?;
        schema::games::table
            .find(id)
            .first::<GameRow>(&mut conn)
            .optional()?
            .map(|row| row.to_snapshot())
            .transpose()
    }

    #[instrument(skip(self, board))]
    fn save_board_and_turn(&self, id: SessionId, board: &Board, current_player: Player) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let player: &'static str = current_player.into();
        let updated = diesel::update(schema::games::table.find(id))
            .set((
                schema::games::board_state.eq(serde_json::to_string(board)?),
                schema::games::current_player.eq(player),
            ))
            .execute(&mut conn)?;
        debug!("Board checkpoint saved");
        expect_one_row(updated, "game", id)
    }

    #[instrument(skip(self))]
    fn finalize_session(&self, id: SessionId, outcome: Outcome, reason: EndReason) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let updated = diesel::update(schema::games::table.find(id))
            .set((
                schema::games::status.eq("ended"),
                schema::games::winner.eq(Some(outcome_to_db(outcome))),
                schema::games::end_reason.eq(Some(reason_to_db(reason))),
            ))
            .execute(&mut conn)?;
        info!(%outcome, "Game finalized");
        expect_one_row(updated, "game", id)
    }

    #[instrument(skip(self))]
    fn find_active_session_for(&self, user: UserId) -> Result<Option<SessionId>, DbError> {
        Ok(self
            .games_for_user(user, "active")?
            .first()
            .map(|row| *row.id()))
    }

    #[instrument(skip(self, mv), fields(mv = %mv))]
    fn record_move(&self, id: SessionId, mv: &Move, flipped: usize) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let player: &'static str = mv.player.into();
        diesel::insert_into(schema::moves::table)
            .values(&NewMoveRow::new(
                id,
                player.to_string(),
                mv.position.row() as i32,
                mv.position.col() as i32,
                flipped as i32,
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn ended_sessions_for(&self, user: UserId) -> Result<Vec<SessionSnapshot>, DbError> {
        let snapshots = self
            .games_for_user(user, "ended")?
            .iter()
            .map(GameRow::to_snapshot)
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = snapshots.len(), "Ended games loaded");
        Ok(snapshots)
    }
}
