pub mod dispatcher;
pub mod handler;
pub mod registry;

use crate::providers::GenerationConfig;
use crate::session::{SessionId, SessionStore};
use std::sync::Arc;

pub use dispatcher::create_command_registry;

/// What slash commands can see and change in the REPL.
pub struct ChatState {
    pub sessions: Arc<SessionStore>,
    pub session_id: SessionId,
    pub provider_name: String,
    pub generation: GenerationConfig,
    pub should_continue: bool,
}

impl ChatState {
    pub fn new(
        sessions: Arc<SessionStore>,
        provider_name: &str,
        generation: GenerationConfig,
    ) -> Self {
        let session_id = sessions.open();
        Self {
            sessions,
            session_id,
            provider_name: provider_name.to_string(),
            generation,
            should_continue: true,
        }
    }

    /// Makes sure the current session still exists, opening a fresh one if
    /// it was evicted. Returns whether a new session had to be opened.
    pub fn ensure_session(&mut self) -> bool {
        if self.sessions.get(self.session_id).is_some() {
            return false;
        }
        self.session_id = self.sessions.open();
        true
    }

    /// Ends the current session and starts over with a fresh history.
    pub fn restart_session(&mut self) {
        self.sessions.end(self.session_id);
        self.session_id = self.sessions.open();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state(idle: Duration) -> ChatState {
        let store = Arc::new(SessionStore::new("prompt", idle));
        ChatState::new(store, "anthropic", GenerationConfig::new("claude"))
    }

    #[test]
    fn evicted_session_is_replaced() {
        let mut state = state(Duration::ZERO);
        let first = state.session_id;

        state.sessions.evict_idle();

        assert!(state.ensure_session());
        assert_ne!(state.session_id, first);
        assert!(!state.ensure_session());
    }

    #[test]
    fn restart_drops_the_old_session() {
        let mut state = state(Duration::from_secs(60));
        let first = state.session_id;

        state.restart_session();

        assert!(state.sessions.get(first).is_none());
        assert_eq!(state.sessions.len(), 1);
    }
}
