use super::ChatState;
use crate::commands::handler::CommandHandler;
use crate::core::error::CinechatError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: CommandHandler + 'static>(&mut self, name: &str, command: C) {
        self.handlers.insert(name.to_string(), Arc::new(command));
    }

    pub fn execute(
        &self,
        name: &str,
        args: &[&str],
        state: &mut ChatState,
    ) -> Result<Option<String>, CinechatError> {
        self.handlers
            .get(name)
            .ok_or_else(|| CinechatError::Input(format!("Unknown command: /{}", name)))
            .and_then(|handler| handler.execute(state, args))
    }

    pub fn get_command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// One usage line per command, sorted by name.
    pub fn help_lines(&self) -> Vec<&'static str> {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        names.into_iter().map(|n| self.handlers[n].help()).collect()
    }
}
