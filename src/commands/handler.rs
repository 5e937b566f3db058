use super::ChatState;
use crate::core::error::CinechatError;
use crate::display;

use console::style;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, state: &mut ChatState, args: &[&str])
    -> Result<Option<String>, CinechatError>;
    fn help(&self) -> &'static str;
}

pub struct QuitCommand;
pub struct NewSessionCommand;
pub struct HistoryCommand;
pub struct ModelCommand;

pub struct HelpCommand {
    lines: Vec<&'static str>,
}

impl HelpCommand {
    pub fn new(lines: Vec<&'static str>) -> Self {
        Self { lines }
    }
}

impl CommandHandler for QuitCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, CinechatError> {
        state.should_continue = false;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/quit - Exit cinechat"
    }
}

impl CommandHandler for HelpCommand {
    fn execute(&self, _state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, CinechatError> {
        let title = style("Available Commands").bold().underlined();
        let mut help_text = vec![title.to_string()];
        help_text.extend(self.lines.iter().map(|line| line.to_string()));
        help_text.push(self.help().to_string());
        Ok(Some(help_text.join("\n")))
    }

    fn help(&self) -> &'static str {
        "/help - Show available commands"
    }
}

impl CommandHandler for NewSessionCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, CinechatError> {
        state.restart_session();
        Ok(Some("Started a new session. Previous conversation discarded.".to_string()))
    }

    fn help(&self) -> &'static str {
        "/new - End this conversation and start a new session"
    }
}

impl CommandHandler for HistoryCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, CinechatError> {
        let session = state.sessions.acquire(state.session_id)?;
        let transcript = display::format_transcript(session.history());
        if transcript.is_empty() {
            Ok(Some("No messages yet.".to_string()))
        } else {
            Ok(Some(transcript))
        }
    }

    fn help(&self) -> &'static str {
        "/history - Show this session's conversation"
    }
}

impl CommandHandler for ModelCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, CinechatError> {
        let current = format!(
            "Provider: {}  Model: {}  Temperature: {}  Max tokens: {}",
            state.provider_name,
            state.generation.model_identifier,
            state.generation.temperature,
            state.generation.max_output_tokens
        );
        if args.is_empty() {
            Ok(Some(current))
        } else {
            Ok(Some(format!(
                "{}\nThe model is fixed for the session; restart with --model to change it.",
                current
            )))
        }
    }

    fn help(&self) -> &'static str {
        "/model - Show the current provider and model"
    }
}
