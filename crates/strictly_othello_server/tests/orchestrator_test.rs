//! Integration tests for session orchestration over in-memory storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use strictly_othello::{
    Board, EndReason, Move, MoveError, MoveSelectionPolicy, Outcome, Player, PolicyKind, Position,
};
use strictly_othello_server::{
    DbError, DbErrorKind, InMemoryPersistence, InviteId, InviteRecord, InviteStatus, Participant,
    Persistence, SeatRecord, SessionError, SessionEvent, SessionId, SessionOrchestrator, SessionPhase,
    SessionSnapshot, UserId, UserRecord,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const WAIT: Duration = Duration::from_secs(10);

fn setup(store: Arc<dyn Persistence>) -> (SessionOrchestrator, UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = SessionOrchestrator::new(store)
        .with_thinking_delay(Duration::ZERO)
        .with_events(tx);
    (orchestrator, rx)
}

async fn register(orchestrator: &SessionOrchestrator, id: UserId, name: &str) {
    orchestrator
        .register_user(UserRecord::new(id, Some(name.to_lowercase()), name.to_string()))
        .await
        .expect("Register failed");
}

/// Waits for the first event matching `pred`, skipping the rest.
async fn wait_for(
    rx: &mut UnboundedReceiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("Event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}

fn two_humans() -> (Participant, Participant) {
    (Participant::human(1, "Ana"), Participant::human(2, "Bo"))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_human_vs_human_turns() {
    let (orchestrator, _rx) = setup(Arc::new(InMemoryPersistence::new()));
    let (black, white) = two_humans();
    let view = orchestrator.start_session(black, white).await.unwrap();
    assert_eq!(view.phase, SessionPhase::AwaitingHuman(Player::Black));
    assert_eq!(view.legal_moves.len(), 4);

    let after = orchestrator.submit_move(view.id, 1, 2, 4).await.unwrap();
    assert_eq!((after.black_score, after.white_score), (4, 1));
    assert_eq!(after.phase, SessionPhase::AwaitingHuman(Player::White));

    let err = orchestrator.submit_move(view.id, 1, 2, 3).await.unwrap_err();
    assert!(matches!(err, SessionError::NotYourTurn(Player::White)));

    let after = orchestrator.submit_move(view.id, 2, 2, 3).await.unwrap();
    assert_eq!(after.current_player, Player::Black);
    assert_eq!(after.moves_played, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejections_do_not_mutate() {
    let (orchestrator, _rx) = setup(Arc::new(InMemoryPersistence::new()));
    let (black, white) = two_humans();
    let view = orchestrator.start_session(black, white).await.unwrap();

    let cases = [
        (1, 3, 3, "occupied"),
        (1, 0, 0, "no capture"),
        (1, 8, 0, "off board"),
        (2, 2, 3, "wrong turn"),
        (99, 2, 4, "stranger"),
    ];
    for (user, row, col, label) in cases {
        let err = orchestrator
            .submit_move(view.id, user, row, col)
            .await
            .expect_err(label);
        match label {
            "occupied" => assert!(matches!(err, SessionError::IllegalMove(MoveError::Occupied(_)))),
            "no capture" => {
                assert!(matches!(err, SessionError::IllegalMove(MoveError::NoCapture(_))))
            }
            "off board" => assert!(matches!(
                err,
                SessionError::IllegalMove(MoveError::OutOfBounds(8, 0))
            )),
            "wrong turn" => assert!(matches!(err, SessionError::NotYourTurn(Player::Black))),
            _ => assert!(matches!(err, SessionError::NotAParticipant { user: 99, .. })),
        }
    }
    assert_eq!(orchestrator.request_status(view.id).await.unwrap(), view);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_session() {
    let (orchestrator, _rx) = setup(Arc::new(InMemoryPersistence::new()));
    assert!(matches!(
        orchestrator.submit_move(404, 1, 2, 4).await,
        Err(SessionError::SessionNotFound(404))
    ));
    assert!(matches!(
        orchestrator.request_status(404).await,
        Err(SessionError::SessionNotFound(404))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_submissions_apply_once() {
    let (orchestrator, _rx) = setup(Arc::new(InMemoryPersistence::new()));

    for round in 0..10 {
        let (black, white) = (round * 2 + 1, round * 2 + 2);
        let id = orchestrator
            .start_session(Participant::human(black, "B"), Participant::human(white, "W"))
            .await
            .unwrap()
            .id;

        let a = orchestrator.clone();
        let b = orchestrator.clone();
        let first = tokio::spawn(async move { a.submit_move(id, black, 2, 4).await });
        let second = tokio::spawn(async move { b.submit_move(id, black, 3, 5).await });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(SessionError::NotYourTurn(Player::White))))
        );
        let view = orchestrator.request_status(id).await.unwrap();
        assert_eq!((view.black_score, view.white_score), (4, 1));
        assert_eq!(view.moves_played, 1);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_human_vs_automated_reply() {
    let store = Arc::new(InMemoryPersistence::new());
    let (orchestrator, mut rx) = setup(store.clone());
    register(&orchestrator, 1, "Ana").await;

    let view = orchestrator
        .start_vs_automated(1, Player::Black, Some(PolicyKind::FirstLegal))
        .await
        .unwrap();
    assert!(view.white.automated);
    orchestrator.submit_move(view.id, 1, 2, 4).await.unwrap();

    let reply = wait_for(&mut rx, |e| {
        matches!(e, SessionEvent::MoveApplied { mv, .. } if mv.player == Player::White)
    })
    .await;
    let SessionEvent::MoveApplied { view: after, .. } = reply else {
        unreachable!()
    };
    assert_eq!(after.phase, SessionPhase::AwaitingHuman(Player::Black));
    assert_eq!(after.moves_played, 2);
    assert_eq!(store.moves(view.id).len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_automated_black_opens() {
    let (orchestrator, mut rx) = setup(Arc::new(InMemoryPersistence::new()));
    register(&orchestrator, 1, "Ana").await;

    let view = orchestrator
        .start_vs_automated(1, Player::White, None)
        .await
        .unwrap();
    assert_eq!(view.phase, SessionPhase::AwaitingAutomated(Player::Black));

    wait_for(&mut rx, |e| {
        matches!(e, SessionEvent::MoveApplied { mv, .. } if mv.player == Player::Black)
    })
    .await;
    let status = orchestrator.request_status(view.id).await.unwrap();
    assert_eq!(status.phase, SessionPhase::AwaitingHuman(Player::White));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_automated_game_runs_to_completion() {
    let store = Arc::new(InMemoryPersistence::new());
    let (orchestrator, mut rx) = setup(store.clone());
    let view = orchestrator
        .start_session(
            Participant::automated("Random", PolicyKind::Random),
            Participant::automated("Greedy", PolicyKind::Greedy),
        )
        .await
        .unwrap();

    let SessionEvent::Ended(ended) = wait_for(&mut rx, |e| matches!(e, SessionEvent::Ended(_))).await
    else {
        unreachable!()
    };
    assert_eq!(ended.id, view.id);
    assert_eq!(ended.phase, SessionPhase::Ended);
    assert_eq!(ended.end_reason, Some(EndReason::NoLegalMoves));
    assert!(ended.legal_moves.is_empty());
    assert!(ended.moves_played <= 60);

    let expected = match ended.black_score.cmp(&ended.white_score) {
        std::cmp::Ordering::Greater => Outcome::Winner(Player::Black),
        std::cmp::Ordering::Less => Outcome::Winner(Player::White),
        std::cmp::Ordering::Equal => Outcome::Draw,
    };
    assert_eq!(ended.outcome, Some(expected));

    assert!(orchestrator.registry().get(view.id).is_none());
    let stored = store.load_session(view.id).unwrap().unwrap();
    assert_eq!(stored.status().outcome(), Some(expected));
    assert_eq!(store.moves(view.id).len(), ended.moves_played);

    assert!(matches!(
        orchestrator.submit_move(view.id, 1, 2, 4).await,
        Err(SessionError::SessionAlreadyEnded(_))
    ));
    let status = orchestrator.request_status(view.id).await.unwrap();
    assert_eq!(status.outcome, Some(expected));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resign_cancels_pending_reply() {
    let store = Arc::new(InMemoryPersistence::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = SessionOrchestrator::new(store.clone())
        .with_thinking_delay(Duration::from_millis(200))
        .with_events(tx);
    register(&orchestrator, 1, "Ana").await;

    let view = orchestrator
        .start_vs_automated(1, Player::Black, Some(PolicyKind::FirstLegal))
        .await
        .unwrap();
    orchestrator.submit_move(view.id, 1, 2, 4).await.unwrap();
    let resigned = orchestrator.resign(view.id, 1).await.unwrap();
    assert_eq!(resigned.outcome, Some(Outcome::Winner(Player::White)));
    assert_eq!(resigned.end_reason, Some(EndReason::Resigned(Player::Black)));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.moves(view.id).len(), 1);
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::MoveApplied { mv, .. } = event {
            assert_eq!(mv.player, Player::Black, "automated reply after resignation");
        }
    }

    assert!(matches!(
        orchestrator.resign(view.id, 1).await,
        Err(SessionError::SessionAlreadyEnded(_))
    ));
    let stats = orchestrator.player_stats(1).await.unwrap();
    assert_eq!(*stats.overall().losses(), 1);
    assert_eq!(stats.opponents()[0].opponent(), "Othello Bot");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_message_handles_dropped_at_end() {
    let (orchestrator, _rx) = setup(Arc::new(InMemoryPersistence::new()));
    let (black, white) = two_humans();
    let id = orchestrator.start_session(black, white).await.unwrap().id;

    orchestrator.register_message_handle(id, 1, 100).await.unwrap();
    orchestrator.register_message_handle(id, 2, 200).await.unwrap();
    assert!(matches!(
        orchestrator.register_message_handle(id, 3, 300).await,
        Err(SessionError::NotAParticipant { .. })
    ));
    let handles = orchestrator.message_handles(id).await.unwrap();
    assert_eq!(handles.get(&1), Some(&100));
    assert_eq!(handles.len(), 2);

    orchestrator.resign(id, 2).await.unwrap();
    assert!(matches!(
        orchestrator.message_handles(id).await,
        Err(SessionError::SessionNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invite_flow() {
    let (orchestrator, mut rx) = setup(Arc::new(InMemoryPersistence::new()));
    register(&orchestrator, 1, "Ana").await;
    register(&orchestrator, 2, "Bo").await;
    register(&orchestrator, 3, "Cy").await;

    assert!(matches!(
        orchestrator.invite(1, "@Ana").await,
        Err(SessionError::SelfInvite)
    ));
    assert!(matches!(
        orchestrator.invite(1, "zed").await,
        Err(SessionError::UserNotFound(_))
    ));

    let declined = orchestrator.invite(1, "@cy").await.unwrap();
    orchestrator.reject_invite(declined, 3).await.unwrap();
    assert!(matches!(
        orchestrator.accept_invite(declined, 3).await,
        Err(SessionError::InviteNotPending(_))
    ));

    let invite = orchestrator.invite(1, "@BO").await.unwrap();
    assert!(matches!(
        orchestrator.accept_invite(invite, 3).await,
        Err(SessionError::InviteNotPending(_))
    ));
    let view = orchestrator.accept_invite(invite, 2).await.unwrap();
    assert_eq!(view.black.name, "Ana");
    assert_eq!(view.white.name, "Bo");
    assert!(matches!(
        wait_for(&mut rx, |e| matches!(e, SessionEvent::Started(_))).await,
        SessionEvent::Started(_)
    ));

    assert!(matches!(
        orchestrator.accept_invite(invite, 2).await,
        Err(SessionError::InviteNotPending(_))
    ));
    assert!(matches!(
        orchestrator.accept_invite(9999, 2).await,
        Err(SessionError::InviteNotFound(9999))
    ));
    assert!(matches!(
        orchestrator.invite(1, "cy").await,
        Err(SessionError::AlreadyInGame { user: 1, .. })
    ));
    assert!(matches!(
        orchestrator.start_vs_automated(2, Player::Black, None).await,
        Err(SessionError::AlreadyInGame { user: 2, .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rehydrates_from_storage() {
    let store = Arc::new(InMemoryPersistence::new());
    let (first, _rx) = setup(store.clone());
    let (black, white) = two_humans();
    let id = first.start_session(black, white).await.unwrap().id;
    first.submit_move(id, 1, 2, 4).await.unwrap();

    // A fresh orchestrator has an empty registry.
    let (second, _rx2) = setup(store.clone());
    assert!(second.registry().is_empty());
    let status = second.request_status(id).await.unwrap();
    assert_eq!(status.current_player, Player::White);
    assert_eq!((status.black_score, status.white_score), (4, 1));

    let after = second.submit_move(id, 2, 2, 3).await.unwrap();
    assert_eq!(after.current_player, Player::Black);
    assert_eq!(second.registry().ids(), vec![id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rehydrated_automated_turn_resumes() {
    let store = Arc::new(InMemoryPersistence::new());
    let bot = SeatRecord::new(None, "Bot".to_string(), Some(PolicyKind::FirstLegal));
    let human = SeatRecord::new(Some(1), "Ana".to_string(), None);
    let id = store.create_session(&bot, &human).unwrap();

    let (orchestrator, mut rx) = setup(store.clone());
    let status = orchestrator.request_status(id).await.unwrap();
    assert_eq!(status.black.name, "Bot");
    wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied { .. })).await;
    let status = orchestrator.request_status(id).await.unwrap();
    assert_eq!(status.phase, SessionPhase::AwaitingHuman(Player::White));
}

/// Always answers with a corner, legal or not.
#[derive(Debug)]
struct CornerPolicy;

impl MoveSelectionPolicy for CornerPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::FirstLegal
    }

    fn select_move(&self, _board: &Board, _player: Player, _legal: &[Position]) -> Option<Position> {
        Position::new(0, 0)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_policy_violation_stalls_without_mutation() {
    let (orchestrator, mut rx) = setup(Arc::new(InMemoryPersistence::new()));
    let bot = Participant::Automated {
        name: "Cornered".to_string(),
        policy: Arc::new(CornerPolicy),
    };
    let view = orchestrator
        .start_session(Participant::human(1, "Ana"), bot)
        .await
        .unwrap();
    let after_human = orchestrator.submit_move(view.id, 1, 2, 4).await.unwrap();

    let stalled = wait_for(&mut rx, |e| matches!(e, SessionEvent::Stalled { .. })).await;
    assert_eq!(stalled.session_id(), view.id);

    let status = orchestrator.request_status(view.id).await.unwrap();
    assert_eq!(status.board, after_human.board);
    assert_eq!(status.phase, SessionPhase::AwaitingAutomated(Player::White));
    assert!(matches!(
        orchestrator.submit_move(view.id, 1, 2, 3).await,
        Err(SessionError::NotYourTurn(Player::White))
    ));

    orchestrator.resume_automated(view.id).await.unwrap();
    wait_for(&mut rx, |e| matches!(e, SessionEvent::Stalled { .. })).await;
}

/// In-memory storage whose checkpoint writes can be switched off and whose
/// session inserts can be slowed down.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: InMemoryPersistence,
    failing: AtomicBool,
    slow_create: AtomicBool,
}

impl Persistence for FlakyStore {
    fn register_user(&self, user: &UserRecord) -> Result<(), DbError> {
        self.inner.register_user(user)
    }
    fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, DbError> {
        self.inner.get_user(id)
    }
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError> {
        self.inner.find_user_by_username(username)
    }
    fn create_invite(&self, from_user: UserId, to_user: UserId) -> Result<InviteId, DbError> {
        self.inner.create_invite(from_user, to_user)
    }
    fn get_invite(&self, id: InviteId) -> Result<Option<InviteRecord>, DbError> {
        self.inner.get_invite(id)
    }
    fn update_invite_status(&self, id: InviteId, status: InviteStatus) -> Result<(), DbError> {
        self.inner.update_invite_status(id, status)
    }
    fn create_session(&self, black: &SeatRecord, white: &SeatRecord) -> Result<SessionId, DbError> {
        if self.slow_create.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
        }
        self.inner.create_session(black, white)
    }
    fn load_session(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DbError> {
        self.inner.load_session(id)
    }
    fn save_board_and_turn(&self, id: SessionId, board: &Board, current: Player) -> Result<(), DbError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DbError::new(DbErrorKind::Query, "disk full"));
        }
        self.inner.save_board_and_turn(id, board, current)
    }
    fn finalize_session(&self, id: SessionId, outcome: Outcome, reason: EndReason) -> Result<(), DbError> {
        self.inner.finalize_session(id, outcome, reason)
    }
    fn find_active_session_for(&self, user: UserId) -> Result<Option<SessionId>, DbError> {
        self.inner.find_active_session_for(user)
    }
    fn record_move(&self, id: SessionId, mv: &Move, flipped: usize) -> Result<(), DbError> {
        self.inner.record_move(id, mv, flipped)
    }
    fn ended_sessions_for(&self, user: UserId) -> Result<Vec<SessionSnapshot>, DbError> {
        self.inner.ended_sessions_for(user)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_checkpoint_leaves_session_unchanged() {
    let store = Arc::new(FlakyStore::default());
    let (orchestrator, _rx) = setup(store.clone());
    let (black, white) = two_humans();
    let view = orchestrator.start_session(black, white).await.unwrap();

    store.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        orchestrator.submit_move(view.id, 1, 2, 4).await,
        Err(SessionError::Persistence(_))
    ));
    assert_eq!(orchestrator.request_status(view.id).await.unwrap(), view);

    store.failing.store(false, Ordering::SeqCst);
    let after = orchestrator.submit_move(view.id, 1, 2, 4).await.unwrap();
    assert_eq!(after.moves_played, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_accepts_seat_pair_once() {
    let store = Arc::new(FlakyStore::default());
    store.slow_create.store(true, Ordering::SeqCst);
    let (orchestrator, _rx) = setup(store.clone());
    register(&orchestrator, 1, "Ana").await;
    register(&orchestrator, 2, "Bo").await;
    let invite = orchestrator.invite(1, "bo").await.unwrap();

    let a = orchestrator.clone();
    let b = orchestrator.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.accept_invite(invite, 2).await }),
        tokio::spawn(async move { b.accept_invite(invite, 2).await }),
    );
    let results = [first.unwrap(), second.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(SessionError::InviteNotPending(_))))
    );
    assert_eq!(orchestrator.registry().len(), 1);
    assert!(store.load_session(2).unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_double_start_vs_automated_seats_once() {
    let store = Arc::new(FlakyStore::default());
    store.slow_create.store(true, Ordering::SeqCst);
    let (orchestrator, _rx) = setup(store.clone());
    register(&orchestrator, 1, "Ana").await;

    let a = orchestrator.clone();
    let b = orchestrator.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.start_vs_automated(1, Player::Black, None).await }),
        tokio::spawn(async move { b.start_vs_automated(1, Player::Black, None).await }),
    );
    let results = [first.unwrap(), second.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(SessionError::AlreadyInGame { user: 1, .. })))
    );
    assert_eq!(orchestrator.registry().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_user_on_both_seats_rejected() {
    let store = Arc::new(InMemoryPersistence::new());
    let (orchestrator, _rx) = setup(store.clone());
    assert!(matches!(
        orchestrator
            .start_session(Participant::human(1, "Ana"), Participant::human(1, "Ana"))
            .await,
        Err(SessionError::SameUserBothSeats(1))
    ));
    assert!(orchestrator.registry().is_empty());
    assert_eq!(store.find_active_session_for(1).unwrap(), None);
}
