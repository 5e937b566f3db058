use super::MovieService;
use crate::config::MovieServiceConfig;
use crate::core::error::CinechatError;
use crate::providers::base_client::HttpClient;
use async_trait::async_trait;
use reqwest::Response;
use serde::Serialize;

/// [`MovieService`] backed by a JSON/text HTTP API.
///
/// - `GET  {base}/now-playing`
/// - `GET  {base}/showtimes?title=..&location=..`
/// - `POST {base}/tickets` with `{"theater", "movie", "showtime"}`
///
/// Response bodies are passed to the model verbatim.
#[derive(Clone)]
pub struct HttpMovieService {
    client: HttpClient,
}

#[derive(Serialize)]
struct TicketRequest<'a> {
    theater: &'a str,
    movie: &'a str,
    showtime: &'a str,
}

impl HttpMovieService {
    pub fn new(config: &MovieServiceConfig) -> Self {
        let auth_header = config
            .api_key
            .as_ref()
            .map(|key| ("Authorization".to_string(), format!("Bearer {}", key)));

        Self {
            client: HttpClient::new(config.base_url.clone(), auth_header, None),
        }
    }
}

async fn read_body(response: Result<Response, CinechatError>) -> Result<String, CinechatError> {
    let response = response.map_err(handler_error)?;
    response.text().await.map_err(|e| handler_error(e.into()))
}

fn handler_error(err: CinechatError) -> CinechatError {
    match err {
        CinechatError::Handler(_) => err,
        other => CinechatError::Handler(format!("movie service: {}", other)),
    }
}

#[async_trait]
impl MovieService for HttpMovieService {
    async fn get_now_playing_movies(&self) -> Result<String, CinechatError> {
        read_body(self.client.get("now-playing", &[]).await).await
    }

    async fn get_showtimes(&self, title: &str, location: &str) -> Result<String, CinechatError> {
        let query = [("title", title), ("location", location)];
        read_body(self.client.get("showtimes", &query).await).await
    }

    async fn buy_ticket(
        &self,
        theater: &str,
        movie: &str,
        showtime: &str,
    ) -> Result<String, CinechatError> {
        let request = TicketRequest {
            theater,
            movie,
            showtime,
        };
        read_body(self.client.post("tickets", &request).await).await
    }
}
