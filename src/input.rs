use crate::commands::dispatcher::CommandDispatcher;
use crate::config::Config as AppConfig;
use crate::core::error::CinechatError;

use console::style;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{Highlighter, MatchingBracketHighlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, EditMode, Editor, Helper};
use std::borrow::Cow;

pub type LineEditor = Editor<ChatHelper, FileHistory>;

/// Completes `/command` names.
pub struct CommandCompleter {
    commands: CommandDispatcher,
}

impl CommandCompleter {
    pub fn new(commands: CommandDispatcher) -> Self {
        Self { commands }
    }

    fn candidates(&self, prefix: &str) -> Vec<Pair> {
        self.commands
            .get_command_names()
            .into_iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd,
            })
            .collect()
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        if pos == 0 || !line.starts_with('/') || line[..pos].contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }
        // 1 is the position after '/'
        Ok((1, self.candidates(&line[1..pos])))
    }
}

/// Completion, history hints and bracket highlighting for the chat prompt.
pub struct ChatHelper {
    completer: CommandCompleter,
    highlighter: MatchingBracketHighlighter,
    hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(commands: CommandDispatcher) -> Self {
        Self {
            completer: CommandCompleter::new(commands),
            highlighter: MatchingBracketHighlighter::new(),
            hinter: HistoryHinter {},
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(style(hint).dim().to_string())
    }
}

impl Validator for ChatHelper {}

/// Creates the line editor and loads saved input history.
pub fn create_editor(commands: CommandDispatcher) -> Result<LineEditor, CinechatError> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut editor = Editor::with_config(config)
        .map_err(|e| CinechatError::Input(format!("Failed to create line editor: {}", e)))?;
    editor.set_helper(Some(ChatHelper::new(commands)));

    // missing on first run
    let _ = editor.load_history(&AppConfig::input_history_path());

    Ok(editor)
}

/// Reads one line. `None` means the user wants to leave (Ctrl-C or Ctrl-D
/// at the prompt).
pub fn read_input(editor: &mut LineEditor) -> Result<Option<String>, CinechatError> {
    let prompt = if cfg!(windows) && std::env::var("PSModulePath").is_ok() {
        "> ".to_string()
    } else {
        style("> ").bold().cyan().to_string()
    };

    match editor.readline(&prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                editor
                    .add_history_entry(line.as_str())
                    .map_err(|e| CinechatError::Input(format!("Failed to add history entry: {}", e)))?;
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(CinechatError::Input(format!("Input error: {}", err))),
    }
}

pub fn save_history(editor: &mut LineEditor) -> Result<(), CinechatError> {
    let history_path = AppConfig::input_history_path();

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    editor
        .save_history(&history_path)
        .map_err(|e| CinechatError::Input(format!("Failed to save history: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create_command_registry;
    use rustyline::history::DefaultHistory;

    fn complete(line: &str, pos: usize) -> (usize, Vec<String>) {
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        let (start, pairs) = CommandCompleter::new(create_command_registry())
            .complete(line, pos, &ctx)
            .unwrap();
        (start, pairs.into_iter().map(|p| p.replacement).collect())
    }

    #[test]
    fn completes_command_names_after_the_slash() {
        assert_eq!(complete("/h", 2), (1, vec!["help".to_string(), "history".to_string()]));
        assert_eq!(complete("/", 1).1.len(), 5);
    }

    #[test]
    fn cursor_at_line_start_offers_nothing() {
        assert_eq!(complete("/help", 0), (0, Vec::new()));
    }

    #[test]
    fn plain_text_and_arguments_are_not_completed() {
        assert!(complete("what's playing", 4).1.is_empty());
        assert!(complete("/model gpt", 10).1.is_empty());
    }
}
