//! Function dispatch for `<function_call>` directives.
//!
//! Each recognized function name maps to a [`FunctionHandler`] that talks to
//! the [`MovieService`] and produces the synthetic system instruction the
//! model sees on its next completion.

pub mod handlers;
pub mod http_service;

use crate::core::error::CinechatError;
use crate::directive::FunctionCall;
use crate::providers::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use handlers::{BuyTicket, ConfirmTicketPurchase, GetNowPlaying, GetShowtimes};
pub use http_service::HttpMovieService;

/// The movie backend. Its internal logic lives outside this crate.
#[async_trait]
pub trait MovieService: Send + Sync {
    async fn get_now_playing_movies(&self) -> Result<String, CinechatError>;

    async fn get_showtimes(&self, title: &str, location: &str) -> Result<String, CinechatError>;

    async fn buy_ticket(
        &self,
        theater: &str,
        movie: &str,
        showtime: &str,
    ) -> Result<String, CinechatError>;
}

#[async_trait]
pub trait FunctionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn required_arguments(&self) -> &'static [&'static str];

    /// Runs the function and returns the instruction text for the model.
    async fn call(&self, call: &FunctionCall) -> Result<String, CinechatError>;
}

pub struct ToolDispatcher {
    handlers: HashMap<String, Arc<dyn FunctionHandler>>,
    handler_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(handler_timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            handler_timeout,
        }
    }

    pub fn register(&mut self, handler: Arc<dyn FunctionHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs `call` and returns the one system message to append.
    ///
    /// Unregistered names fail with [`CinechatError::UnknownFunction`] and
    /// produce no message. Missing arguments, handler errors and handler
    /// timeouts become a system message describing the failure, so the model
    /// can tell the user.
    pub async fn dispatch(&self, call: &FunctionCall) -> Result<Message, CinechatError> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| CinechatError::UnknownFunction(call.name.clone()))?;

        if let Some(missing) = handler
            .required_arguments()
            .iter()
            .find(|arg| call.string_arg(arg).is_none())
        {
            warn!(function = %call.name, argument = missing, "Function call missing argument");
            let error =
                CinechatError::Handler(format!("missing required argument `{}`", missing));
            return Ok(Message::system(failure_instruction(&call.name, &error)));
        }

        debug!(function = %call.name, arguments = ?call.arguments, "Dispatching function call");
        let outcome = match tokio::time::timeout(self.handler_timeout, handler.call(call)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CinechatError::Handler(format!(
                "timed out after {}s",
                self.handler_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(instruction) => Ok(Message::system(instruction)),
            Err(e) => {
                warn!(function = %call.name, error = %e, "Function handler failed");
                Ok(Message::system(failure_instruction(&call.name, &e)))
            }
        }
    }
}

fn failure_instruction(function: &str, error: &CinechatError) -> String {
    format!(
        "The {} function failed ({}). Inform the user that their request could not be \
         completed right now and suggest trying again.",
        function, error
    )
}

/// Dispatcher with the four movie functions registered.
pub fn create_function_registry(
    service: Arc<dyn MovieService>,
    handler_timeout: Duration,
) -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new(handler_timeout);

    dispatcher.register(Arc::new(GetNowPlaying::new(service.clone())));
    dispatcher.register(Arc::new(GetShowtimes::new(service.clone())));
    dispatcher.register(Arc::new(BuyTicket));
    dispatcher.register(Arc::new(ConfirmTicketPurchase::new(service)));

    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl MovieService for RecordingService {
        async fn get_now_playing_movies(&self) -> Result<String, CinechatError> {
            self.calls.lock().unwrap().push("now_playing".into());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CinechatError::Handler("listings unavailable".into()));
            }
            Ok("Dune: Part Two, Inside Out 2".into())
        }

        async fn get_showtimes(
            &self,
            title: &str,
            location: &str,
        ) -> Result<String, CinechatError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("showtimes({title}, {location})"));
            Ok(format!("{title} in {location}: 7:00pm at Regal"))
        }

        async fn buy_ticket(
            &self,
            theater: &str,
            movie: &str,
            showtime: &str,
        ) -> Result<String, CinechatError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("buy({theater}, {movie}, {showtime})"));
            Ok("confirmation #A1".into())
        }
    }

    fn dispatcher(service: Arc<RecordingService>) -> ToolDispatcher {
        create_function_registry(service, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn showtimes_forwards_exact_arguments() {
        let service = Arc::new(RecordingService::default());
        let call = FunctionCall::new("get_showtimes")
            .with_arg("title", "Dune")
            .with_arg("location", "Seattle");

        let message = dispatcher(service.clone()).dispatch(&call).await.unwrap();

        assert_eq!(*service.calls.lock().unwrap(), vec!["showtimes(Dune, Seattle)"]);
        assert_eq!(message.role, crate::providers::Role::System);
        assert!(message.content.contains("Dune in Seattle: 7:00pm at Regal"));
    }

    #[tokio::test]
    async fn buy_ticket_asks_for_confirmation_without_purchasing() {
        let service = Arc::new(RecordingService::default());
        let call = FunctionCall::new("buy_ticket")
            .with_arg("theater", "Regal")
            .with_arg("movie", "Dune")
            .with_arg("showtime", "7pm");

        let message = dispatcher(service.clone()).dispatch(&call).await.unwrap();

        assert!(service.calls.lock().unwrap().is_empty());
        assert_eq!(
            message.content,
            "Ask the user to confirm the purchase of tickets for Dune at Regal for the showtime 7pm."
        );
    }

    #[tokio::test]
    async fn confirm_purchase_performs_the_purchase() {
        let service = Arc::new(RecordingService::default());
        let call = FunctionCall::new("confirm_ticket_purchase")
            .with_arg("theater", "Regal")
            .with_arg("movie", "Dune")
            .with_arg("showtime", "7pm");

        let message = dispatcher(service.clone()).dispatch(&call).await.unwrap();

        assert_eq!(*service.calls.lock().unwrap(), vec!["buy(Regal, Dune, 7pm)"]);
        assert!(message.content.starts_with("Inform the user that the tickets have been purchased"));
        assert!(message.content.contains("confirmation #A1"));
    }

    #[tokio::test]
    async fn unknown_function_is_rejected() {
        let service = Arc::new(RecordingService::default());
        let result = dispatcher(service)
            .dispatch(&FunctionCall::new("delete_account"))
            .await;

        assert!(matches!(result, Err(CinechatError::UnknownFunction(name)) if name == "delete_account"));
    }

    #[tokio::test]
    async fn handler_failure_becomes_an_instruction() {
        let service = Arc::new(RecordingService {
            fail: true,
            ..Default::default()
        });

        let message = dispatcher(service)
            .dispatch(&FunctionCall::new("get_now_playing"))
            .await
            .unwrap();

        assert!(message.content.contains("get_now_playing function failed"));
        assert!(message.content.contains("listings unavailable"));
    }

    #[tokio::test]
    async fn missing_argument_skips_the_handler() {
        let service = Arc::new(RecordingService::default());
        let call = FunctionCall::new("get_showtimes").with_arg("title", "Dune");

        let message = dispatcher(service.clone()).dispatch(&call).await.unwrap();

        assert!(service.calls.lock().unwrap().is_empty());
        assert!(message.content.contains("missing required argument `location`"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let service = Arc::new(RecordingService {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });

        let message = dispatcher(service)
            .dispatch(&FunctionCall::new("get_now_playing"))
            .await
            .unwrap();

        assert!(message.content.contains("timed out after 5s"));
    }

    #[test]
    fn registry_lists_the_four_functions() {
        let dispatcher = dispatcher(Arc::new(RecordingService::default()));
        assert_eq!(
            dispatcher.function_names(),
            vec![
                "buy_ticket",
                "confirm_ticket_purchase",
                "get_now_playing",
                "get_showtimes"
            ]
        );
    }
}
