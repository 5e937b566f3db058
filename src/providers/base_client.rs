use crate::core::error::CinechatError;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStream, TryStreamExt};
use reqwest::{Client, Response};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Turns a batch of complete SSE lines into the text they carry, if any.
pub type StreamParser = fn(String) -> Result<Option<String>, CinechatError>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    auth_header: Option<(String, String)>,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    pub fn new(
        base_url: String,
        auth_header: Option<(String, String)>,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn decorate(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((name, value)) = &self.auth_header {
            request = request.header(name, value);
        }
        for (key, value) in &self.extra_headers {
            request = request.header(key, value);
        }
        request
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Response, CinechatError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let request = self
            .decorate(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(payload);

        let response = request.send().await?;
        check_status(response).await
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, CinechatError> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let response = self
            .decorate(self.client.get(&url))
            .query(query)
            .send()
            .await?;
        check_status(response).await
    }

    /// Streams the text carried by a server-sent-events response.
    pub fn stream_response(
        &self,
        response: Response,
        parser: StreamParser,
    ) -> BoxStream<'static, Result<String, CinechatError>> {
        sse_fragments(response.bytes_stream(), parser)
    }
}

/// Reassembles SSE lines split across network chunks and feeds only whole
/// lines to `parser`. Whatever is left when the body ends is parsed as a
/// final line.
pub fn sse_fragments<S, B, E>(
    body: S,
    parser: StreamParser,
) -> BoxStream<'static, Result<String, CinechatError>>
where
    S: TryStream<Ok = B, Error = E> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CinechatError> + Send + 'static,
{
    body.into_stream()
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(Vec::<u8>::new(), move |pending, item| {
            let out = match item {
                Some(Ok(chunk)) => {
                    pending.extend_from_slice(chunk.as_ref());
                    match pending.iter().rposition(|b| *b == b'\n') {
                        Some(idx) => {
                            let complete: Vec<u8> = pending.drain(..=idx).collect();
                            parser(String::from_utf8_lossy(&complete).into_owned()).transpose()
                        }
                        None => None,
                    }
                }
                Some(Err(e)) => Some(Err(e.into())),
                // end of body
                None if pending.is_empty() => None,
                None => {
                    let rest = std::mem::take(pending);
                    parser(String::from_utf8_lossy(&rest).into_owned()).transpose()
                }
            };
            future::ready(Some(out))
        })
        .filter_map(future::ready)
        .boxed()
}

/// Maps a non-2xx response to a provider error carrying the API's message.
pub async fn check_status(response: Response) -> Result<Response, CinechatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CinechatError::Provider(format!(
        "HTTP {}: {}",
        status.as_u16(),
        error_message(&body)
    )))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
