use crate::core::error::CinechatError;
use crate::session::SessionId;
use async_trait::async_trait;

/// Where streamed assistant text goes (a terminal, a socket, a test buffer).
///
/// Fragments of one message arrive in order, followed by one `finalize`.
/// An error from either method means the consumer is gone and the turn is
/// cancelled.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn send_fragment(&self, session_id: SessionId, text: &str) -> Result<(), CinechatError>;

    async fn finalize(&self, session_id: SessionId) -> Result<(), CinechatError>;
}
