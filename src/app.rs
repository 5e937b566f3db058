use crate::agent::{TurnLimits, TurnOrchestrator, TurnOutcome};
use crate::cli::Args;
use crate::commands::{ChatState, create_command_registry, dispatcher::CommandDispatcher};
use crate::config::{Config, Provider};
use crate::core::error::CinechatError;
use crate::display::{self, TerminalSink};
use crate::input;
use crate::providers::factory::ProviderFactory;
use crate::session::SessionStore;
use crate::tools::{HttpMovieService, MovieService, create_function_registry};
use is_terminal::IsTerminal;
use std::io::{self, Read};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Application {
    pub args: Args,
    pub orchestrator: TurnOrchestrator,
    pub sessions: Arc<SessionStore>,
    pub command_dispatcher: CommandDispatcher,
}

impl Application {
    /// Wires provider, movie service, dispatcher and session store from the
    /// loaded config, with command-line overrides applied.
    pub fn new(args: Args, config: Config) -> Result<Self, CinechatError> {
        let provider = match args.provider.as_deref() {
            Some(name) => Provider::from_str(name)
                .ok_or_else(|| CinechatError::Config(format!("Unsupported provider: {}", name)))?,
            None => config.provider(),
        };

        let mut generation = config.generation_config(provider);
        if let Some(model) = &args.model {
            generation.model_identifier = model.clone();
        }

        let llm = ProviderFactory::new().create(&provider, &config.provider_config(provider))?;
        let movies: Arc<dyn MovieService> = Arc::new(HttpMovieService::new(&config.movies));
        let dispatcher = create_function_registry(movies, config.agent.handler_timeout());

        info!(
            provider = provider.as_str(),
            model = %generation.model_identifier,
            functions = ?dispatcher.function_names(),
            "Assistant ready"
        );

        let orchestrator = TurnOrchestrator::new(
            llm,
            dispatcher,
            generation,
            TurnLimits::from(&config.agent),
        );
        let sessions = Arc::new(SessionStore::new(
            config.system_prompt()?,
            config.agent.session_idle_timeout(),
        ));

        Ok(Self {
            args,
            orchestrator,
            sessions,
            command_dispatcher: create_command_registry(),
        })
    }

    pub async fn run(&mut self) -> Result<(), CinechatError> {
        let piped = if !io::stdin().is_terminal() {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| CinechatError::Input(format!("Failed to read from stdin: {}", e)))?;
            Some(buffer)
        } else {
            None
        };

        let query = match (self.args.query.take(), piped) {
            (Some(q), Some(context)) if !context.trim().is_empty() => {
                Some(format!("{}\n\n{}", context.trim(), q))
            }
            (Some(q), _) => Some(q),
            (None, Some(context)) if !context.trim().is_empty() => Some(context),
            (None, Some(_)) => {
                return Err(CinechatError::Input("No query provided".to_string()));
            }
            (None, None) => None,
        };

        match query {
            Some(query) => self.handle_one_shot(&query).await,
            None => self.handle_interactive().await,
        }
    }

    fn new_chat_state(&self) -> ChatState {
        ChatState::new(
            self.sessions.clone(),
            self.orchestrator.provider_name(),
            self.orchestrator.generation().clone(),
        )
    }

    async fn handle_one_shot(&self, query: &str) -> Result<(), CinechatError> {
        let state = self.new_chat_state();
        let result = self.run_turn(&state, query).await;
        self.sessions.end(state.session_id);

        let outcome = result?;
        display::display_outcome(&outcome);
        Ok(())
    }

    async fn handle_interactive(&self) -> Result<(), CinechatError> {
        let mut state = self.new_chat_state();
        display::display_welcome(&state.provider_name, &state.generation.model_identifier);

        let mut editor = input::create_editor(self.command_dispatcher.clone())?;

        while state.should_continue {
            let line = match input::read_input(&mut editor)? {
                Some(line) => line.trim().to_string(),
                None => break,
            };
            if line.is_empty() {
                continue;
            }

            if line.starts_with('/') {
                match self.command_dispatcher.execute_line(&line, &mut state) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) => eprintln!("Error executing command: {}", e),
                }
                continue;
            }

            let evicted = self.sessions.evict_idle();
            if evicted > 0 {
                debug!(evicted, "Evicted idle sessions");
            }
            if state.ensure_session() {
                display::display_notice("Your previous session expired. Starting a new one.");
            }

            match self.run_turn(&state, &line).await {
                Ok(outcome) => display::display_outcome(&outcome),
                Err(e) => display::display_turn_error(&e),
            }
        }

        input::save_history(&mut editor)?;
        self.sessions.end(state.session_id);
        Ok(())
    }

    /// Runs one turn, cancelling it if the user presses Ctrl-C.
    async fn run_turn(&self, state: &ChatState, query: &str) -> Result<TurnOutcome, CinechatError> {
        let mut session = self.sessions.acquire(state.session_id)?;
        let sink = TerminalSink::stdout();
        let cancel = CancellationToken::new();

        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let result = self
            .orchestrator
            .run_turn(&mut session, query, &sink, &cancel)
            .await;
        watcher.abort();

        if let Ok(outcome) = &result {
            debug!(round_trips = outcome.round_trips, "Turn finished");
        }
        result
    }
}

/// Shows a failed run once and maps it to the process exit status.
pub fn exit_code(result: Result<(), CinechatError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::display_turn_error(&e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_a_failing_exit_status() {
        assert_eq!(exit_code(Ok(())), ExitCode::SUCCESS);
        assert_eq!(
            exit_code(Err(CinechatError::LoopLimitExceeded { limit: 5 })),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn unknown_provider_is_rejected_before_any_request() {
        let args = Args {
            provider: Some("netflix".into()),
            ..Default::default()
        };
        let result = Application::new(args, Config::default());
        assert!(matches!(result, Err(CinechatError::Config(msg)) if msg.contains("netflix")));
    }
}
