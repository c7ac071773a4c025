//! Turn orchestration across concurrent sessions.
//!
//! Every request for a session runs under that session's guard. A move is
//! applied to a copy of the session, checkpointed through [`Persistence`],
//! and only then committed to the live entry, so a failed write leaves the
//! live game as it was. When the side to move is automated, a spawned task
//! plays its replies one at a time after the thinking delay until a human
//! holds the turn or the game ends. Seating users in a new session is
//! serialized by one orchestrator-wide guard so the "one active game per
//! user" check and the session insert cannot interleave.

use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::participant::Participant;
use crate::persistence::{
    InviteId, InviteRecord, InviteStatus, Persistence, SessionId, UserId, UserRecord,
};
use crate::registry::{SessionEntry, SessionHandle, SessionRegistry};
use crate::session::GameSession;
use crate::stats::PlayerStats;
use crate::view::{SessionEvent, SessionView};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strictly_othello::{
    CELL_COUNT, EndReason, GameStatus, MoveError, MoveReport, Player, PolicyKind, Position,
};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on automated moves played by one scheduled task.
///
/// A game has at most 60 placements; anything beyond that is a bug.
pub const MAX_AUTOMATED_CHAIN: usize = CELL_COUNT + 4;

/// Entry point for every session request.
#[derive(Debug, Clone)]
pub struct SessionOrchestrator {
    registry: SessionRegistry,
    persistence: Arc<dyn Persistence>,
    thinking_delay: Duration,
    automated_name: String,
    automated_policy: PolicyKind,
    events: Option<UnboundedSender<SessionEvent>>,
    seating: Arc<Mutex<()>>,
}

impl SessionOrchestrator {
    /// Creates an orchestrator over the given storage with default settings.
    #[instrument(skip(persistence))]
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self::from_config(&ServerConfig::default(), persistence)
    }

    /// Creates an orchestrator using the delay and automated-opponent
    /// settings of `config`.
    #[instrument(skip(config, persistence))]
    pub fn from_config(config: &ServerConfig, persistence: Arc<dyn Persistence>) -> Self {
        info!(
            thinking_delay_ms = config.thinking_delay_ms(),
            policy = %config.automated_policy(),
            "Creating session orchestrator"
        );
        Self {
            registry: SessionRegistry::new(),
            persistence,
            thinking_delay: config.thinking_delay(),
            automated_name: config.automated_name().clone(),
            automated_policy: *config.automated_policy(),
            events: None,
            seating: Arc::new(Mutex::new(())),
        }
    }

    /// Publishes [`SessionEvent`]s to `sender`.
    pub fn with_events(mut self, sender: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Overrides the pause before automated moves.
    pub fn with_thinking_delay(mut self, delay: Duration) -> Self {
        self.thinking_delay = delay;
        self
    }

    /// The live session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The storage collaborator.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sender) = &self.events
            && sender.send(event).is_err()
        {
            debug!("No event listener");
        }
    }

    /// Creates or refreshes a user.
    ///
    /// # Errors
    ///
    /// [`SessionError::Persistence`] if storage fails.
    #[instrument(skip(self, user), fields(user_id = user.id()))]
    pub async fn register_user(&self, user: UserRecord) -> Result<(), SessionError> {
        self.persistence.register_user(&user)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn ensure_free(&self, user: UserId) -> Result<(), SessionError> {
        if let Some(session) = self.persistence.find_active_session_for(user)? {
            warn!(session_id = session, "User already in a game");
            return Err(SessionError::AlreadyInGame { user, session });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn user(&self, id: UserId) -> Result<UserRecord, SessionError> {
        self.persistence
            .get_user(id)?
            .ok_or_else(|| SessionError::UserNotFound(id.to_string()))
    }

    /// Starts a session between two participants, Black first.
    ///
    /// If Black is automated its opening move is scheduled right away.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyInGame`] if a human participant is already in
    /// an active session, [`SessionError::SameUserBothSeats`] if one user is
    /// given both colors, [`SessionError::Persistence`] if storage fails.
    #[instrument(skip(self, black, white), fields(black = %black.name(), white = %white.name()))]
    pub async fn start_session(
        &self,
        black: Participant,
        white: Participant,
    ) -> Result<SessionView, SessionError> {
        let _seating = self.seating.lock().await;
        self.open_session(black, white).await
    }

    /// Creates and registers a session. Callers hold the seating guard.
    #[instrument(skip(self, black, white))]
    async fn open_session(
        &self,
        black: Participant,
        white: Participant,
    ) -> Result<SessionView, SessionError> {
        if let (Some(b), Some(w)) = (black.user_id(), white.user_id())
            && b == w
        {
            warn!(user = b, "Same user on both seats");
            return Err(SessionError::SameUserBothSeats(b));
        }
        for user in [black.user_id(), white.user_id()].into_iter().flatten() {
            self.ensure_free(user)?;
        }
        let id = self.persistence.create_session(&black.seat(), &white.seat())?;
        let handle = self.registry.insert(GameSession::new(id, black, white));

        let mut entry = handle.lock().await;
        let view = entry.session.view();
        info!(session_id = id, "Session started");
        self.emit(SessionEvent::Started(view.clone()));
        self.schedule_automated(&mut entry);
        Ok(view)
    }

    /// Starts a game between a registered user and an automated opponent.
    ///
    /// `policy` falls back to the configured automated policy.
    ///
    /// # Errors
    ///
    /// [`SessionError::UserNotFound`] for unknown users, plus the errors of
    /// [`start_session`](Self::start_session).
    #[instrument(skip(self))]
    pub async fn start_vs_automated(
        &self,
        user: UserId,
        color: Player,
        policy: Option<PolicyKind>,
    ) -> Result<SessionView, SessionError> {
        let record = self.user(user)?;
        let human = Participant::human(user, record.display_name().clone());
        let bot = Participant::automated(
            self.automated_name.clone(),
            policy.unwrap_or(self.automated_policy),
        );
        match color {
            Player::Black => self.start_session(human, bot).await,
            Player::White => self.start_session(bot, human).await,
        }
    }

    /// Invites the user named `to_username` to a game.
    ///
    /// # Errors
    ///
    /// [`SessionError::UserNotFound`], [`SessionError::SelfInvite`], or
    /// [`SessionError::AlreadyInGame`] for the inviter.
    #[instrument(skip(self))]
    pub async fn invite(&self, from: UserId, to_username: &str) -> Result<InviteId, SessionError> {
        self.user(from)?;
        let to = self
            .persistence
            .find_user_by_username(to_username)?
            .ok_or_else(|| SessionError::UserNotFound(to_username.to_string()))?;
        if *to.id() == from {
            warn!("Self invite rejected");
            return Err(SessionError::SelfInvite);
        }
        self.ensure_free(from)?;
        let invite = self.persistence.create_invite(from, *to.id())?;
        info!(invite_id = invite, to = to.id(), "Invite sent");
        Ok(invite)
    }

    #[instrument(skip(self))]
    fn pending_invite_for(
        &self,
        invite_id: InviteId,
        acting: UserId,
    ) -> Result<InviteRecord, SessionError> {
        let invite = self
            .persistence
            .get_invite(invite_id)?
            .ok_or(SessionError::InviteNotFound(invite_id))?;
        if *invite.status() != InviteStatus::Pending || *invite.to_user() != acting {
            warn!(status = %invite.status(), "Invite cannot be answered");
            return Err(SessionError::InviteNotPending(invite_id));
        }
        Ok(invite)
    }

    /// Accepts an invite, starting a session with the inviter as Black.
    ///
    /// # Errors
    ///
    /// [`SessionError::InviteNotFound`], [`SessionError::InviteNotPending`]
    /// when already answered or addressed to someone else, and the errors of
    /// [`start_session`](Self::start_session).
    #[instrument(skip(self))]
    pub async fn accept_invite(
        &self,
        invite_id: InviteId,
        acting: UserId,
    ) -> Result<SessionView, SessionError> {
        let _seating = self.seating.lock().await;
        let invite = self.pending_invite_for(invite_id, acting)?;
        let inviter = self.user(*invite.from_user())?;
        let invitee = self.user(acting)?;
        let view = self
            .open_session(
                Participant::human(*inviter.id(), inviter.display_name().clone()),
                Participant::human(*invitee.id(), invitee.display_name().clone()),
            )
            .await?;
        self.persistence
            .update_invite_status(invite_id, InviteStatus::Accepted)?;
        Ok(view)
    }

    /// Declines an invite.
    ///
    /// # Errors
    ///
    /// [`SessionError::InviteNotFound`] or [`SessionError::InviteNotPending`].
    #[instrument(skip(self))]
    pub async fn reject_invite(&self, invite_id: InviteId, acting: UserId) -> Result<(), SessionError> {
        self.pending_invite_for(invite_id, acting)?;
        self.persistence
            .update_invite_status(invite_id, InviteStatus::Rejected)?;
        info!("Invite rejected");
        Ok(())
    }

    /// Finds the live handle for a session, rehydrating it from storage on a
    /// registry miss.
    #[instrument(skip(self))]
    async fn handle(&self, id: SessionId) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.registry.get(id) {
            return Ok(handle);
        }
        let snapshot = self.persistence.load_session(id)?.ok_or_else(|| {
            warn!("Session not found");
            SessionError::SessionNotFound(id)
        })?;
        if snapshot.status().is_ended() {
            warn!("Session already ended");
            return Err(SessionError::SessionAlreadyEnded(id));
        }

        let handle = self
            .registry
            .get_or_insert(id, || GameSession::from_snapshot(&snapshot));
        let mut entry = handle.lock().await;
        // A checkpoint can hold a finished board if the process stopped
        // before the game was finalized.
        if entry.session.is_over() {
            self.finalize(&mut entry)?;
            return Err(SessionError::SessionAlreadyEnded(id));
        }
        self.schedule_automated(&mut entry);
        drop(entry);
        Ok(handle)
    }

    /// Plays a human move.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`], [`SessionError::SessionAlreadyEnded`],
    /// [`SessionError::NotAParticipant`], [`SessionError::NotYourTurn`] or
    /// [`SessionError::IllegalMove`], checked in that order. None of them
    /// changes the session.
    #[instrument(skip(self))]
    pub async fn submit_move(
        &self,
        id: SessionId,
        user: UserId,
        row: usize,
        col: usize,
    ) -> Result<SessionView, SessionError> {
        let handle = self.handle(id).await?;
        let mut entry = handle.lock().await;
        if entry.session.is_over() {
            warn!("Move on ended session");
            return Err(SessionError::SessionAlreadyEnded(id));
        }
        let color = entry.session.color_of(user).ok_or_else(|| {
            warn!("Move from non-participant");
            SessionError::NotAParticipant { session: id, user }
        })?;
        let current = entry.session.game().current_player();
        if color != current {
            warn!(%color, %current, "Move out of turn");
            return Err(SessionError::NotYourTurn(current));
        }
        let position = Position::new(row, col)
            .ok_or(SessionError::IllegalMove(MoveError::OutOfBounds(row, col)))?;

        self.commit_move(&mut entry, color, position)?;
        Ok(entry.session.view())
    }

    /// Current view of a session, live or stored.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`] if no such session exists.
    #[instrument(skip(self))]
    pub async fn request_status(&self, id: SessionId) -> Result<SessionView, SessionError> {
        if let Some(handle) = self.registry.get(id) {
            return Ok(handle.lock().await.session.view());
        }
        match self.persistence.load_session(id)? {
            Some(snapshot) if snapshot.status().is_ended() => {
                Ok(GameSession::from_snapshot(&snapshot).view())
            }
            Some(_) => Ok(self.handle(id).await?.lock().await.session.view()),
            None => Err(SessionError::SessionNotFound(id)),
        }
    }

    /// Resigns for `user`; the opponent wins.
    ///
    /// Any automated reply still pending is cancelled.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`], [`SessionError::SessionAlreadyEnded`]
    /// or [`SessionError::NotAParticipant`].
    #[instrument(skip(self))]
    pub async fn resign(&self, id: SessionId, user: UserId) -> Result<SessionView, SessionError> {
        let handle = self.handle(id).await?;
        let mut entry = handle.lock().await;
        if entry.session.is_over() {
            return Err(SessionError::SessionAlreadyEnded(id));
        }
        let color = entry
            .session
            .color_of(user)
            .ok_or(SessionError::NotAParticipant { session: id, user })?;

        let mut next = entry.session.clone();
        let outcome = next.resign(color)?;
        self.persistence
            .finalize_session(id, outcome, EndReason::Resigned(color))?;
        entry.session = next;
        self.retire(&mut entry);
        Ok(entry.session.view())
    }

    /// Reschedules a stalled automated turn.
    ///
    /// Does nothing when a reply is already pending or a human holds the turn.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`] or [`SessionError::SessionAlreadyEnded`].
    #[instrument(skip(self))]
    pub async fn resume_automated(&self, id: SessionId) -> Result<SessionView, SessionError> {
        let handle = self.handle(id).await?;
        let mut entry = handle.lock().await;
        if entry.session.is_over() {
            return Err(SessionError::SessionAlreadyEnded(id));
        }
        self.schedule_automated(&mut entry);
        Ok(entry.session.view())
    }

    /// Remembers the front-end message showing this session to `user`.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`], [`SessionError::SessionAlreadyEnded`]
    /// or [`SessionError::NotAParticipant`].
    #[instrument(skip(self))]
    pub async fn register_message_handle(
        &self,
        id: SessionId,
        user: UserId,
        message: i64,
    ) -> Result<(), SessionError> {
        let handle = self.handle(id).await?;
        let mut entry = handle.lock().await;
        if entry.session.color_of(user).is_none() {
            return Err(SessionError::NotAParticipant { session: id, user });
        }
        entry.message_handles.insert(user, message);
        debug!("Message handle registered");
        Ok(())
    }

    /// Front-end message ids of a live session.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`] when the session is not live.
    #[instrument(skip(self))]
    pub async fn message_handles(&self, id: SessionId) -> Result<HashMap<UserId, i64>, SessionError> {
        let handle = self
            .registry
            .get(id)
            .ok_or(SessionError::SessionNotFound(id))?;
        let entry = handle.lock().await;
        Ok(entry.message_handles.clone())
    }

    /// Statistics over a user's finished games.
    ///
    /// # Errors
    ///
    /// [`SessionError::Persistence`] if storage fails.
    #[instrument(skip(self))]
    pub async fn player_stats(&self, user: UserId) -> Result<PlayerStats, SessionError> {
        let games = self.persistence.ended_sessions_for(user)?;
        Ok(PlayerStats::compute(user, &games))
    }

    /// Applies a move and checkpoints it before touching the live entry.
    ///
    /// Ends the session when nobody can move, otherwise schedules the
    /// automated reply if one is due.
    #[instrument(skip(self, entry), fields(session_id = entry.session.id()))]
    fn commit_move(
        &self,
        entry: &mut SessionEntry,
        player: Player,
        position: Position,
    ) -> Result<MoveReport, SessionError> {
        let id = entry.session.id();
        let mut next = entry.session.clone();
        let report = next.play(player, position)?;

        let game = next.game();
        self.persistence
            .save_board_and_turn(id, game.board(), game.current_player())?;
        if let GameStatus::Ended { outcome, reason } = game.status() {
            self.persistence.finalize_session(id, *outcome, *reason)?;
        }
        if let Err(e) = self.persistence.record_move(id, &report.mv, report.flipped) {
            warn!(error = %e, "Failed to log move");
        }

        entry.session = next;
        info!(mv = %report.mv, flipped = report.flipped, "Move committed");
        self.emit(SessionEvent::MoveApplied {
            mv: report.mv,
            flipped: report.flipped,
            passed: report.passed(),
            view: entry.session.view(),
        });

        if entry.session.is_over() {
            self.retire(entry);
        } else {
            self.schedule_automated(entry);
        }
        Ok(report)
    }

    /// Finalizes a session whose board became terminal outside a move.
    fn finalize(&self, entry: &mut SessionEntry) -> Result<(), SessionError> {
        if let GameStatus::Ended { outcome, reason } = entry.session.game().status() {
            self.persistence
                .finalize_session(entry.session.id(), *outcome, *reason)?;
        }
        self.retire(entry);
        Ok(())
    }

    /// Drops the bookkeeping of an ended session and removes it from the
    /// registry.
    #[instrument(skip(self, entry), fields(session_id = entry.session.id()))]
    fn retire(&self, entry: &mut SessionEntry) {
        entry.automated_pending = false;
        entry.message_handles.clear();
        self.registry.remove(entry.session.id());
        let view = entry.session.view();
        info!(outcome = ?view.outcome, "Session ended");
        self.emit(SessionEvent::Ended(view));
    }

    /// Spawns the automated reply task if one is due and none is pending.
    fn schedule_automated(&self, entry: &mut SessionEntry) {
        if entry.automated_pending || !entry.session.awaits_automated() {
            return;
        }
        let id = entry.session.id();
        let player = entry.session.game().current_player();
        entry.automated_pending = true;
        debug!(session_id = id, %player, "Scheduling automated move");
        self.emit(SessionEvent::AutomatedThinking {
            session: id,
            player,
        });
        tokio::spawn(self.clone().run_automated(id));
    }

    /// Plays automated moves until a human holds the turn or the game ends.
    #[instrument(skip(self))]
    async fn run_automated(self, id: SessionId) {
        for _ in 0..MAX_AUTOMATED_CHAIN {
            tokio::time::sleep(self.thinking_delay).await;
            let Some(handle) = self.registry.get(id) else {
                debug!("Session gone before automated move");
                return;
            };
            let mut entry = handle.lock().await;
            if !entry.automated_pending {
                debug!("Automated move cancelled");
                return;
            }
            match self.automated_step(&mut entry) {
                Ok(true) => continue,
                Ok(false) => {
                    entry.automated_pending = false;
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Automated move failed");
                    self.stall(&mut entry, e.to_string());
                    return;
                }
            }
        }
        if let Some(handle) = self.registry.get(id) {
            let mut entry = handle.lock().await;
            error!("Automated chain exceeded {} moves", MAX_AUTOMATED_CHAIN);
            self.stall(&mut entry, "automated chain limit reached".to_string());
        }
    }

    fn stall(&self, entry: &mut SessionEntry, reason: String) {
        entry.automated_pending = false;
        self.emit(SessionEvent::Stalled {
            session: entry.session.id(),
            player: entry.session.game().current_player(),
            reason,
        });
    }

    /// Plays one automated move. Returns whether another automated move
    /// follows.
    fn automated_step(&self, entry: &mut SessionEntry) -> Result<bool, SessionError> {
        if !entry.session.awaits_automated() {
            return Ok(false);
        }
        let id = entry.session.id();
        let game = entry.session.game();
        let player = game.current_player();
        let Participant::Automated { policy, .. } = entry.session.participant(player) else {
            return Ok(false);
        };
        let legal = game.legal_moves();
        let choice = policy.select_move(game.board(), player, &legal);
        let position = match choice {
            Some(position) if legal.contains(&position) => position,
            returned => {
                error!(
                    session_id = id,
                    %player,
                    policy = %policy.kind(),
                    ?returned,
                    "Policy returned a move outside the legal set"
                );
                return Err(SessionError::PolicyContractViolation {
                    session: id,
                    player,
                    policy: policy.kind(),
                    returned,
                });
            }
        };

        self.commit_move(entry, player, position)?;
        Ok(entry.session.awaits_automated())
    }
}
