//! Process-wide map of live sessions.
//!
//! The map lock is held only to insert, look up, or remove a handle. Work on
//! a session happens under that session's own async mutex, so requests for
//! different sessions never wait on each other.

use crate::persistence::{SessionId, UserId};
use crate::session::GameSession;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument};

/// A live session plus the bookkeeping that lives and dies with it.
#[derive(Debug)]
pub struct SessionEntry {
    /// The game.
    pub session: GameSession,
    /// Set while an automated reply is scheduled and not yet played.
    pub automated_pending: bool,
    /// Front-end message ids per user, dropped when the session ends.
    pub message_handles: HashMap<UserId, i64>,
}

impl SessionEntry {
    /// Wraps a session with empty bookkeeping.
    pub fn new(session: GameSession) -> Self {
        Self {
            session,
            automated_pending: false,
            message_handles: HashMap::new(),
        }
    }
}

/// Shared handle to one entry.
pub type SessionHandle = Arc<AsyncMutex<SessionEntry>>;

/// Live sessions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating session registry");
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up a live session.
    #[instrument(skip(self))]
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        let handle = self.lock().get(&id).cloned();
        debug!(found = handle.is_some(), "Registry lookup");
        handle
    }

    /// Inserts a session, replacing any previous one with the same id.
    #[instrument(skip(self, session), fields(session_id = session.id()))]
    pub fn insert(&self, session: GameSession) -> SessionHandle {
        let id = session.id();
        let handle = Arc::new(AsyncMutex::new(SessionEntry::new(session)));
        self.lock().insert(id, Arc::clone(&handle));
        info!("Session registered");
        handle
    }

    /// Returns the live session, or inserts the one built by `make`.
    ///
    /// When two callers race on a miss, the first insert wins and both get
    /// the same handle.
    #[instrument(skip(self, make))]
    pub fn get_or_insert(&self, id: SessionId, make: impl FnOnce() -> GameSession) -> SessionHandle {
        let mut sessions = self.lock();
        Arc::clone(sessions.entry(id).or_insert_with(|| {
            info!("Session rehydrated into registry");
            Arc::new(AsyncMutex::new(SessionEntry::new(make())))
        }))
    }

    /// Drops a session.
    #[instrument(skip(self))]
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            info!("Session removed from registry");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Checks if no session is live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids of live sessions, ascending.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
