use crate::core::error::CinechatError;
use crate::providers::base_client::HttpClient;
use crate::providers::{FragmentStream, GenerationConfig, LLMProvider, Message};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

/// Common parser for OpenAI-Compatible streaming responses
pub fn openai_stream_parser(data: String) -> Result<Option<String>, CinechatError> {
    let mut content = String::new();

    for line in data.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }

        let parsed: serde_json::Value = serde_json::from_str(data).map_err(|e| {
            CinechatError::Serialization(format!("Failed to parse stream data: {}", e))
        })?;

        if let Some(message) = parsed.pointer("/error/message").and_then(|m| m.as_str()) {
            return Err(CinechatError::Provider(format!("Stream error: {}", message)));
        }

        if let Some(text) = parsed
            .pointer("/choices/0/delta/content")
            .and_then(|c| c.as_str())
        {
            content.push_str(text);
        }
    }

    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Provider for any endpoint that speaks the OpenAI chat completions protocol
/// (OpenAI, OpenRouter, Fireworks).
#[derive(Clone)]
pub struct OpenAICompatibleProvider {
    name: String,
    client: HttpClient,
}

impl OpenAICompatibleProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: String,
        api_key: String,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        // Use Bearer token authentication
        let auth_header = Some(("Authorization".to_string(), format!("Bearer {}", api_key)));

        Self {
            name: name.into(),
            client: HttpClient::new(base_url, auth_header, extra_headers),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_response_stream(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<FragmentStream, CinechatError> {
        let payload = ChatCompletionRequest {
            model: &config.model_identifier,
            messages: messages
                .iter()
                .map(|m| ChatCompletionMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            stream: true,
        };

        let response = self.client.post("chat/completions", &payload).await?;
        Ok(self.client.stream_response(response, openai_stream_parser))
    }
}
