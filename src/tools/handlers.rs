use super::{FunctionHandler, MovieService};
use crate::core::error::CinechatError;
use crate::directive::FunctionCall;
use async_trait::async_trait;
use std::sync::Arc;

const TICKET_ARGUMENTS: &[&str] = &["theater", "movie", "showtime"];

fn context_instruction(context: &str) -> String {
    format!(
        "Formulate a new response to the last message from the user using this context: {}",
        context
    )
}

// Arguments are checked by the dispatcher before `call` runs.
fn arg(call: &FunctionCall, key: &str) -> String {
    call.string_arg(key).unwrap_or_default()
}

pub struct GetNowPlaying {
    service: Arc<dyn MovieService>,
}

impl GetNowPlaying {
    pub fn new(service: Arc<dyn MovieService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl FunctionHandler for GetNowPlaying {
    fn name(&self) -> &'static str {
        "get_now_playing"
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        &[]
    }

    async fn call(&self, _call: &FunctionCall) -> Result<String, CinechatError> {
        let movies = self.service.get_now_playing_movies().await?;
        Ok(context_instruction(&movies))
    }
}

pub struct GetShowtimes {
    service: Arc<dyn MovieService>,
}

impl GetShowtimes {
    pub fn new(service: Arc<dyn MovieService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl FunctionHandler for GetShowtimes {
    fn name(&self) -> &'static str {
        "get_showtimes"
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        &["title", "location"]
    }

    async fn call(&self, call: &FunctionCall) -> Result<String, CinechatError> {
        let showtimes = self
            .service
            .get_showtimes(&arg(call, "title"), &arg(call, "location"))
            .await?;
        Ok(context_instruction(&showtimes))
    }
}

/// Asks the model to get explicit confirmation. Never purchases.
pub struct BuyTicket;

#[async_trait]
impl FunctionHandler for BuyTicket {
    fn name(&self) -> &'static str {
        "buy_ticket"
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        TICKET_ARGUMENTS
    }

    async fn call(&self, call: &FunctionCall) -> Result<String, CinechatError> {
        Ok(format!(
            "Ask the user to confirm the purchase of tickets for {} at {} for the showtime {}.",
            arg(call, "movie"),
            arg(call, "theater"),
            arg(call, "showtime")
        ))
    }
}

pub struct ConfirmTicketPurchase {
    service: Arc<dyn MovieService>,
}

impl ConfirmTicketPurchase {
    pub fn new(service: Arc<dyn MovieService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl FunctionHandler for ConfirmTicketPurchase {
    fn name(&self) -> &'static str {
        "confirm_ticket_purchase"
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        TICKET_ARGUMENTS
    }

    async fn call(&self, call: &FunctionCall) -> Result<String, CinechatError> {
        let confirmation = self
            .service
            .buy_ticket(
                &arg(call, "theater"),
                &arg(call, "movie"),
                &arg(call, "showtime"),
            )
            .await?;
        Ok(format!(
            "Inform the user that the tickets have been purchased with this information as context: {}",
            confirmation
        ))
    }
}
