use super::{
    ChatState,
    handler::{HelpCommand, HistoryCommand, ModelCommand, NewSessionCommand, QuitCommand},
    registry::CommandRegistry,
};
use crate::core::error::CinechatError;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    /// Parses `/name arg..` and runs the command. `line` must start with `/`.
    pub fn execute_line(
        &self,
        line: &str,
        state: &mut ChatState,
    ) -> Result<Option<String>, CinechatError> {
        let mut parts = line.trim_start_matches('/').split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = parts.collect();
        self.execute(command, &args, state)
    }

    pub fn execute(
        &self,
        command: &str,
        args: &[&str],
        state: &mut ChatState,
    ) -> Result<Option<String>, CinechatError> {
        self.registry.execute(command, args, state)
    }

    pub fn get_command_names(&self) -> Vec<String> {
        self.registry.get_command_names()
    }
}

pub fn create_command_registry() -> CommandDispatcher {
    let mut registry = CommandRegistry::new();

    registry.register("quit", QuitCommand);
    registry.register("new", NewSessionCommand);
    registry.register("history", HistoryCommand);
    registry.register("model", ModelCommand);

    let help = HelpCommand::new(registry.help_lines());
    registry.register("help", help);

    CommandDispatcher::new(Arc::new(registry))
}
