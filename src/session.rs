//! Sessions and the store that owns their lifecycle.
//!
//! A session is created on first contact, lives while the user keeps
//! talking, and is evicted when it ends explicitly or sits idle past the
//! configured timeout. Each session is guarded by its own async mutex so a
//! turn has exclusive access to its history; a second input arriving while
//! a turn is in flight is rejected rather than interleaved.

use crate::conversation::ConversationHistory;
use crate::core::error::CinechatError;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    history: ConversationHistory,
    created_at: DateTime<Local>,
    last_active: Instant,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            history: ConversationHistory::new(system_prompt),
            created_at: Local::now(),
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

pub type SessionHandle = Arc<AsyncMutex<Session>>;

/// Exclusive access to a session for the duration of one turn. Releasing it
/// marks the session active, so idle time counts from the end of the turn.
pub struct SessionGuard {
    session: OwnedMutexGuard<Session>,
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.last_active = Instant::now();
    }
}

pub struct SessionStore {
    system_prompt: String,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionStore {
    pub fn new(system_prompt: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates a session with a fresh history and returns its id.
    pub fn open(&self) -> SessionId {
        let session = Session::new(self.system_prompt.clone());
        let id = session.id();
        self.entries().insert(id, Arc::new(AsyncMutex::new(session)));
        info!(session_id = %id, "Session opened");
        id
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.entries().get(&id).cloned()
    }

    /// Locks a session for one turn, rejecting the call if a turn is
    /// already in flight.
    pub fn acquire(&self, id: SessionId) -> Result<SessionGuard, CinechatError> {
        let handle = self
            .get(id)
            .ok_or_else(|| CinechatError::SessionNotFound(id.to_string()))?;

        let mut session = handle
            .try_lock_owned()
            .map_err(|_| CinechatError::SessionBusy(id.to_string()))?;
        session.last_active = Instant::now();
        Ok(SessionGuard { session })
    }

    /// Ends a session explicitly. Returns whether it existed.
    pub fn end(&self, id: SessionId) -> bool {
        let removed = self.entries().remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session ended");
        }
        removed
    }

    /// Drops sessions idle longer than the timeout. Sessions with a turn
    /// in flight are never evicted.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.entries();
        let before = sessions.len();

        sessions.retain(|id, handle| {
            let keep = match handle.try_lock() {
                Ok(session) => now.duration_since(session.last_active) < self.idle_timeout,
                Err(_) => true,
            };
            if !keep {
                debug!(session_id = %id, "Evicting idle session");
            }
            keep
        });

        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
