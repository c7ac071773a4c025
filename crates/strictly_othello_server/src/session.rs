//! A live game between two participants.

use crate::error::SessionError;
use crate::participant::Participant;
use crate::persistence::{SessionId, SessionSnapshot, UserId};
use crate::view::{SeatView, SessionPhase, SessionView};
use strictly_othello::{
    EndReason, GameState, GameStatus, Move, MoveReport, Outcome, Player, Position, rules,
};
use tracing::{debug, info, instrument, warn};

/// A game session: the engine state plus who plays each color.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: SessionId,
    game: GameState,
    black: Participant,
    white: Participant,
    moves_played: usize,
}

impl GameSession {
    /// Creates a session in the starting position.
    #[instrument(skip(black, white), fields(black = %black.name(), white = %white.name()))]
    pub fn new(id: SessionId, black: Participant, white: Participant) -> Self {
        info!(session_id = id, "Creating game session");
        Self {
            id,
            game: GameState::new(),
            black,
            white,
            moves_played: 0,
        }
    }

    /// Rebuilds a live session from its stored snapshot.
    #[instrument(skip(snapshot), fields(session_id = snapshot.id()))]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        debug!("Rehydrating session");
        let mut game = GameState::restore(snapshot.board().clone(), *snapshot.current_player());
        // A resignation leaves a live-looking board behind.
        if let GameStatus::Ended {
            reason: EndReason::Resigned(player),
            ..
        } = snapshot.status()
            && !game.is_over()
        {
            game.resign(*player).ok();
        }
        Self {
            id: *snapshot.id(),
            game,
            black: Participant::from_seat(snapshot.black()),
            white: Participant::from_seat(snapshot.white()),
            moves_played: 0,
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Engine state.
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// The participant holding a color.
    pub fn participant(&self, player: Player) -> &Participant {
        match player {
            Player::Black => &self.black,
            Player::White => &self.white,
        }
    }

    /// The color a user plays, if they sit at this session.
    pub fn color_of(&self, user: UserId) -> Option<Player> {
        if self.black.user_id() == Some(user) {
            Some(Player::Black)
        } else if self.white.user_id() == Some(user) {
            Some(Player::White)
        } else {
            None
        }
    }

    /// Human user ids at this session.
    pub fn humans(&self) -> Vec<UserId> {
        [self.black.user_id(), self.white.user_id()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Checks if the session is over.
    pub fn is_over(&self) -> bool {
        self.game.is_over()
    }

    /// Outcome once ended.
    pub fn outcome(&self) -> Option<Outcome> {
        self.game.status().outcome()
    }

    /// Moves applied since this session was created or loaded.
    pub fn moves_played(&self) -> usize {
        self.moves_played
    }

    /// The phase of the turn loop.
    pub fn phase(&self) -> SessionPhase {
        if self.game.is_over() {
            return SessionPhase::Ended;
        }
        let current = self.game.current_player();
        if self.participant(current).is_automated() {
            SessionPhase::AwaitingAutomated(current)
        } else {
            SessionPhase::AwaitingHuman(current)
        }
    }

    /// Checks if the side to move is automated and the game is live.
    pub fn awaits_automated(&self) -> bool {
        matches!(self.phase(), SessionPhase::AwaitingAutomated(_))
    }

    /// Plays a move for `player` after checking the session is live.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionAlreadyEnded`] once over, otherwise the engine
    /// rejection mapped through [`SessionError::from`]. The session is left
    /// untouched on error.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn play(&mut self, player: Player, position: Position) -> Result<MoveReport, SessionError> {
        if self.is_over() {
            warn!("Move on ended session");
            return Err(SessionError::SessionAlreadyEnded(self.id));
        }
        let report = self.game.play(Move::new(player, position)).map_err(|e| {
            warn!(error = %e, "Move rejected");
            SessionError::from(e)
        })?;
        self.moves_played += 1;
        debug!(flipped = report.flipped, turn = ?report.turn, "Move applied");
        Ok(report)
    }

    /// Resigns on behalf of `player`.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionAlreadyEnded`] once over.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn resign(&mut self, player: Player) -> Result<Outcome, SessionError> {
        self.game
            .resign(player)
            .map_err(|_| SessionError::SessionAlreadyEnded(self.id))
    }

    /// The typed view of this session.
    pub fn view(&self) -> SessionView {
        let board = self.game.board();
        let (black_score, white_score) = rules::score(board);
        let (outcome, end_reason) = match self.game.status() {
            GameStatus::Ended { outcome, reason } => (Some(*outcome), Some(*reason)),
            GameStatus::InProgress => (None, None),
        };
        SessionView {
            id: self.id,
            board: *board.rows(),
            current_player: self.game.current_player(),
            legal_moves: self.game.legal_moves(),
            black_score,
            white_score,
            phase: self.phase(),
            outcome,
            end_reason,
            black: seat_view(&self.black),
            white: seat_view(&self.white),
            moves_played: self.moves_played,
        }
    }
}

fn seat_view(participant: &Participant) -> SeatView {
    SeatView {
        name: participant.name().to_string(),
        automated: participant.is_automated(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_othello::{MoveError, PolicyKind};

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col).unwrap()
    }

    fn human_vs_bot() -> GameSession {
        GameSession::new(
            1,
            Participant::human(10, "ana"),
            Participant::automated("Bot", PolicyKind::FirstLegal),
        )
    }

    #[test]
    fn test_new_session_view() {
        let session = human_vs_bot();
        let view = session.view();
        assert_eq!(view.black_score, 2);
        assert_eq!(view.white_score, 2);
        assert_eq!(view.legal_moves.len(), 4);
        assert_eq!(view.phase, SessionPhase::AwaitingHuman(Player::Black));
        assert!(!view.is_terminal());
        assert!(view.white.automated);
    }

    #[test]
    fn test_move_hands_turn_to_bot() {
        let mut session = human_vs_bot();
        let report = session.play(Player::Black, pos(2, 4)).unwrap();
        assert_eq!(report.flipped, 1);
        assert_eq!(session.phase(), SessionPhase::AwaitingAutomated(Player::White));
        assert!(session.awaits_automated());
        assert_eq!(session.moves_played(), 1);
    }

    #[test]
    fn test_rejections_leave_session_untouched() {
        let mut session = human_vs_bot();
        let before = session.view();
        assert!(matches!(
            session.play(Player::White, pos(2, 3)),
            Err(SessionError::NotYourTurn(Player::Black))
        ));
        assert!(matches!(
            session.play(Player::Black, pos(3, 3)),
            Err(SessionError::IllegalMove(MoveError::Occupied(_)))
        ));
        assert!(matches!(
            session.play(Player::Black, pos(0, 0)),
            Err(SessionError::IllegalMove(MoveError::NoCapture(_)))
        ));
        assert_eq!(session.view(), before);
    }

    #[test]
    fn test_resign_ends_session() {
        let mut session = human_vs_bot();
        let outcome = session.resign(Player::Black).unwrap();
        assert_eq!(outcome, Outcome::Winner(Player::White));
        let view = session.view();
        assert_eq!(view.phase, SessionPhase::Ended);
        assert_eq!(view.end_reason, Some(EndReason::Resigned(Player::Black)));
        assert!(view.legal_moves.is_empty());
        assert!(matches!(
            session.resign(Player::White),
            Err(SessionError::SessionAlreadyEnded(1))
        ));
    }

    #[test]
    fn test_color_of() {
        let session = human_vs_bot();
        assert_eq!(session.color_of(10), Some(Player::Black));
        assert_eq!(session.color_of(11), None);
        assert_eq!(session.humans(), vec![10]);
    }
}
