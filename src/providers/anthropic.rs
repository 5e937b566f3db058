use crate::core::error::CinechatError;
use crate::providers::base_client::HttpClient;
use crate::providers::{FragmentStream, GenerationConfig, LLMProvider, Message, Role};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Parser for Anthropic's streaming response
pub fn anthropic_stream_parser(data: String) -> Result<Option<String>, CinechatError> {
    let mut content = String::new();
    for line in data.lines() {
        let Some(data_json) = line.strip_prefix("data:") else {
            continue;
        };
        let data_json = data_json.trim();
        if data_json.is_empty() {
            continue;
        }
        let parsed: Value = match serde_json::from_str(data_json) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if parsed["type"] == "content_block_delta" && parsed["delta"]["type"] == "text_delta" {
            if let Some(text) = parsed["delta"]["text"].as_str() {
                content.push_str(text);
            }
        } else if parsed["type"] == "error" {
            let message = parsed["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error");
            return Err(CinechatError::Provider(format!(
                "Anthropic stream error: {}",
                message
            )));
        }
    }

    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

#[derive(Clone)]
pub struct AnthropicProvider {
    client: HttpClient,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(DEFAULT_BASE_URL.to_string(), api_key)
    }

    pub fn with_endpoint(endpoint: String, api_key: Option<String>) -> Self {
        let api_key = api_key.unwrap_or_default();
        let mut extra_headers = HashMap::new();
        extra_headers.insert("anthropic-version".to_string(), API_VERSION.to_string());
        Self {
            client: HttpClient::new(
                endpoint,
                Some(("x-api-key".to_string(), api_key)),
                Some(extra_headers),
            ),
        }
    }
}

/// Splits history into Anthropic's `system` field and an alternating
/// user/assistant transcript.
///
/// Message 0 becomes the system field. Later system-role instructions are
/// sent as user turns tagged `[system]`, and adjacent turns with the same
/// role are merged because the API rejects consecutive same-role turns.
/// Blank turns are dropped since the API rejects empty text content.
fn build_transcript(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system = None;
    let mut turns: Vec<AnthropicMessage> = Vec::new();

    for (idx, message) in messages.iter().enumerate() {
        let (role, content) = match message.role {
            Role::System if idx == 0 => {
                system = Some(message.content.clone());
                continue;
            }
            _ if message.content.trim().is_empty() => continue,
            Role::System => ("user", format!("[system] {}", message.content)),
            Role::User => ("user", message.content.clone()),
            Role::Assistant => ("assistant", message.content.clone()),
        };

        match turns.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&content);
            }
            _ => turns.push(AnthropicMessage { role, content }),
        }
    }

    (system, turns)
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn get_response_stream(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<FragmentStream, CinechatError> {
        let (system, turns) = build_transcript(messages);

        let payload = AnthropicRequest {
            model: &config.model_identifier,
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            messages: turns,
            stream: true,
            system,
        };

        let response = self.client.post("messages", &payload).await?;
        Ok(self
            .client
            .stream_response(response, anthropic_stream_parser))
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[test]
    fn transcript_lifts_prompt_and_merges_instructions() {
        let messages = vec![
            Message::system("You are a movie assistant."),
            Message::user("What's playing?"),
            Message::assistant("<function_call>{\"name\":\"get_now_playing\"}</function_call>"),
            Message::system("Formulate a new response using this context: Dune"),
        ];

        let (system, turns) = build_transcript(&messages);

        assert_eq!(system.as_deref(), Some("You are a movie assistant."));
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].role, "user");
        assert!(turns[2].content.starts_with("[system] Formulate"));
    }

    #[test]
    fn consecutive_user_turns_are_merged() {
        let messages = vec![
            Message::system("prompt"),
            Message::user("first"),
            Message::system("note"),
        ];
        let (_, turns) = build_transcript(&messages);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "first\n\n[system] note");
    }

    #[test]
    fn blank_assistant_turn_is_dropped() {
        let messages = vec![
            Message::system("prompt"),
            Message::user("What's playing?"),
            Message::assistant("  \n"),
            Message::user("Hello?"),
        ];
        let (_, turns) = build_transcript(&messages);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[0].content, "What's playing?\n\nHello?");
    }

    #[test]
    fn stream_error_event_is_a_provider_error() {
        let data = "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n".to_string();
        match anthropic_stream_parser(data) {
            Err(CinechatError::Provider(msg)) => assert!(msg.contains("Overloaded")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn streams_text_deltas() {
        let mut server = mockito::Server::new_async().await;
        let sse = "event: message_start\ndata: {\"type\":\"message_start\"}\n\n\
                   event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Dune \"}}\n\n\
                   event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"is playing.\"}}\n\n\
                   event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n";
        let mock = server
            .mock("POST", "/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", API_VERSION)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "system": "prompt",
                "max_tokens": 500,
                "stream": true
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse)
            .create_async()
            .await;

        let provider = AnthropicProvider::with_endpoint(server.url(), Some("sk-test".into()));
        let stream = provider
            .get_response_stream(
                &[Message::system("prompt"), Message::user("hi")],
                &GenerationConfig::new("claude-3-5-sonnet-20241022"),
            )
            .await
            .unwrap();
        let fragments: Vec<String> = stream.try_collect().await.unwrap();

        mock.assert_async().await;
        assert_eq!(fragments.concat(), "Dune is playing.");
    }

    #[tokio::test]
    async fn unauthorized_is_a_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(401)
            .with_body(r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#)
            .create_async()
            .await;

        let provider = AnthropicProvider::with_endpoint(server.url(), None);
        let result = provider
            .get_response_stream(&[Message::system("p")], &GenerationConfig::new("m"))
            .await;

        assert!(matches!(result, Err(CinechatError::Provider(msg)) if msg.contains("401")));
    }
}
