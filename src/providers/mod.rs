use crate::core::error::CinechatError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod base_client;
pub mod factory;
pub mod openai_compatible;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every completion request.
///
/// Fixed per deployment; a session never changes them mid-conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model_identifier: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;

    pub fn new(model_identifier: impl Into<String>) -> Self {
        Self {
            model_identifier: model_identifier.into(),
            temperature: Self::DEFAULT_TEMPERATURE,
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

pub type FragmentStream = BoxStream<'static, Result<String, CinechatError>>;

/// A language-model backend that streams its answer as text fragments.
///
/// The returned stream is finite and single-use: each completion needs a
/// fresh call. Dropping the stream abandons the underlying request.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_response_stream(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<FragmentStream, CinechatError>;
}
