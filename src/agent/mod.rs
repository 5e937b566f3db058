//! The turn loop: stream a completion, look for a function call, dispatch
//! it, and re-prompt the model until it answers in prose.

pub mod orchestrator;
pub mod sink;

use crate::config::AgentSettings;
use std::time::Duration;
use tracing::debug;

pub use orchestrator::TurnOrchestrator;
pub use sink::OutputSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingUserInput,
    StreamingResponse,
    Dispatching,
    Terminal,
}

impl TurnState {
    pub(crate) fn advance(&mut self, next: TurnState) {
        debug!(from = ?*self, to = ?next, "Turn state");
        *self = next;
    }
}

/// How a successful turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The model replied without a function call.
    Answered,
    /// The model asked for a function nobody registered; the turn stops
    /// with the directive text as the reply.
    UnknownFunction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Text of the last assistant message.
    pub reply: String,
    /// Completions streamed during the turn.
    pub round_trips: usize,
    pub end: TurnEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct TurnLimits {
    pub max_round_trips: usize,
    /// Time allowed for the provider to start streaming.
    pub request_timeout: Duration,
    /// Longest gap allowed between two fragments.
    pub fragment_timeout: Duration,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for TurnLimits {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_round_trips: settings.max_round_trips.max(1),
            request_timeout: settings.request_timeout(),
            fragment_timeout: settings.fragment_timeout(),
        }
    }
}
