use crate::agent::{OutputSink, TurnEnd, TurnOutcome};
use crate::conversation::ConversationHistory;
use crate::core::error::CinechatError;
use crate::providers::Role;
use crate::session::SessionId;
use async_trait::async_trait;
use console::{Term, style};

/// Streams assistant text straight to the terminal.
pub struct TerminalSink {
    term: Term,
}

impl TerminalSink {
    pub fn stdout() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

#[async_trait]
impl OutputSink for TerminalSink {
    async fn send_fragment(&self, _session_id: SessionId, text: &str) -> Result<(), CinechatError> {
        self.term.write_str(text)?;
        self.term.flush()?;
        Ok(())
    }

    async fn finalize(&self, _session_id: SessionId) -> Result<(), CinechatError> {
        self.term.write_line("")?;
        Ok(())
    }
}

/// Text shown to the user when a turn fails.
pub fn user_message(err: &CinechatError) -> String {
    match err {
        CinechatError::MalformedDirective(_) => {
            "Sorry, I couldn't complete that response.".to_string()
        }
        CinechatError::LoopLimitExceeded { limit } => format!(
            "Sorry, I couldn't finish that request after {} attempts. Please try rephrasing.",
            limit
        ),
        CinechatError::Cancelled(_) => "Cancelled.".to_string(),
        CinechatError::SessionBusy(_) => {
            "Still working on your last message. Please wait.".to_string()
        }
        e if e.is_retryable() => format!("{} (you can try again)", e),
        e => e.to_string(),
    }
}

pub fn display_turn_error(err: &CinechatError) {
    let icon = match err {
        CinechatError::Cancelled(_) => style("■").yellow(),
        _ => style("✗").red(),
    };
    eprintln!("{} {}", icon, style(user_message(err)).bold());
}

/// Notes how a turn ended when it is not a plain answer.
pub fn display_outcome(outcome: &TurnOutcome) {
    if let TurnEnd::UnknownFunction(name) = &outcome.end {
        eprintln!(
            "{} {}",
            style("!").yellow(),
            style(format!("The assistant asked for an unavailable function ({}).", name)).dim()
        );
    }
}

pub fn display_welcome(provider: &str, model: &str) {
    println!(
        "{} {}",
        style("🎬 cinechat").bold().magenta(),
        style(format!("({} / {})", provider, model)).dim()
    );
    println!(
        "{}",
        style("Ask about movies in theaters, showtimes or tickets. Type /help for commands, Ctrl+D to exit.")
            .dim()
    );
}

pub fn display_notice(text: &str) {
    println!("{}", style(text).dim().italic());
}

/// Renders every message after the system prompt, one block per message.
pub fn format_transcript(history: &ConversationHistory) -> String {
    history
        .iter()
        .skip(1)
        .map(|message| {
            let label = match message.role {
                Role::User => style("You").bold().cyan(),
                Role::Assistant => style("Assistant").bold().green(),
                Role::System => style("Context").bold().yellow(),
            };
            format!("{}: {}", label, message.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
