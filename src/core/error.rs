use std::io;
use thiserror::Error;

/// Unified error type for cinechat
#[derive(Error, Debug)]
pub enum CinechatError {
    /// The model provider rejected the request (auth, rate limit, bad input)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Network-level failure or timeout while talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// A function-call region was found but its payload could not be parsed
    #[error("Malformed function call: {0}")]
    MalformedDirective(String),

    /// The model asked for a function that is not registered
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A movie function failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// The model kept calling functions past the per-turn cap
    #[error("Turn exceeded {limit} model round trips")]
    LoopLimitExceeded { limit: usize },

    /// The turn was cancelled or the output sink went away
    #[error("Turn cancelled: {0}")]
    Cancelled(String),

    #[error("Session is busy: {0}")]
    SessionBusy(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CinechatError {
    /// Whether the caller may retry the whole turn.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CinechatError::Transport(_))
    }
}

impl From<reqwest::Error> for CinechatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CinechatError::Transport(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            CinechatError::Transport(format!("Connection failed: {}", err))
        } else if err.is_status() {
            CinechatError::Provider(format!("API returned error status: {}", err))
        } else {
            CinechatError::Transport(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for CinechatError {
    fn from(err: serde_json::Error) -> Self {
        CinechatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for CinechatError {
    fn from(err: serde_yml::Error) -> Self {
        CinechatError::Serialization(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(CinechatError::Transport("reset".into()).is_retryable());
        assert!(!CinechatError::Provider("401".into()).is_retryable());
        assert!(!CinechatError::MalformedDirective("bad json".into()).is_retryable());
    }

    #[test]
    fn loop_limit_message_names_the_cap() {
        let err = CinechatError::LoopLimitExceeded { limit: 5 };
        assert_eq!(err.to_string(), "Turn exceeded 5 model round trips");
    }
}
