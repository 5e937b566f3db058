use super::{OutputSink, TurnEnd, TurnLimits, TurnOutcome, TurnState};
use crate::core::error::CinechatError;
use crate::directive::{self, Directive};
use crate::providers::{GenerationConfig, LLMProvider, Message};
use crate::session::{Session, SessionId};
use crate::tools::ToolDispatcher;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Drives one user turn against a session's history.
///
/// The orchestrator itself is stateless between turns; everything a turn
/// reads or writes lives in the [`Session`] it is handed, so one
/// orchestrator serves every session.
pub struct TurnOrchestrator {
    provider: Arc<dyn LLMProvider>,
    dispatcher: ToolDispatcher,
    generation: GenerationConfig,
    limits: TurnLimits,
}

impl TurnOrchestrator {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        dispatcher: ToolDispatcher,
        generation: GenerationConfig,
        limits: TurnLimits,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            generation,
            limits,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn limits(&self) -> TurnLimits {
        self.limits
    }

    /// Runs a turn to completion.
    ///
    /// The user message is appended first and stays in the history whatever
    /// happens next. Every completion is appended verbatim as an assistant
    /// message once its stream ends; a completion interrupted by cancellation
    /// or a transport failure is discarded.
    #[instrument(
        name = "turn",
        skip_all,
        fields(session_id = %session.id(), provider = %self.provider.name())
    )]
    pub async fn run_turn(
        &self,
        session: &mut Session,
        input: &str,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, CinechatError> {
        let mut state = TurnState::AwaitingUserInput;
        session.history_mut().append(Message::user(input));

        let mut round_trips = 0;
        loop {
            state.advance(TurnState::StreamingResponse);
            round_trips += 1;

            let reply = self.stream_completion(session, sink, cancel).await?;
            session.history_mut().append(Message::assistant(reply.clone()));

            let call = match directive::extract(&reply) {
                Directive::Absent => {
                    state.advance(TurnState::Terminal);
                    info!(round_trips, "Turn answered");
                    return Ok(TurnOutcome {
                        reply,
                        round_trips,
                        end: TurnEnd::Answered,
                    });
                }
                Directive::Malformed(reason) => {
                    state.advance(TurnState::Terminal);
                    warn!(%reason, "Model produced a malformed function call");
                    return Err(CinechatError::MalformedDirective(reason));
                }
                Directive::Call(call) => call,
            };

            if !self.dispatcher.is_registered(&call.name) {
                state.advance(TurnState::Terminal);
                warn!(function = %call.name, "Model called an unknown function");
                return Ok(TurnOutcome {
                    reply,
                    round_trips,
                    end: TurnEnd::UnknownFunction(call.name),
                });
            }

            if round_trips >= self.limits.max_round_trips {
                state.advance(TurnState::Terminal);
                warn!(
                    function = %call.name,
                    limit = self.limits.max_round_trips,
                    "Round-trip cap reached, call not dispatched"
                );
                return Err(CinechatError::LoopLimitExceeded {
                    limit: self.limits.max_round_trips,
                });
            }

            state.advance(TurnState::Dispatching);
            let instruction = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(CinechatError::Cancelled("during function call".into()));
                }
                result = self.dispatcher.dispatch(&call) => result?,
            };
            session.history_mut().append(instruction);
        }
    }

    async fn stream_completion(
        &self,
        session: &Session,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<String, CinechatError> {
        let session_id = session.id();
        let messages = session.history().snapshot();
        debug!(messages = messages.len(), model = %self.generation.model_identifier, "Requesting completion");

        let request = self.provider.get_response_stream(messages, &self.generation);
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(CinechatError::Cancelled("before the model responded".into()));
            }
            response = tokio::time::timeout(self.limits.request_timeout, request) => match response {
                Ok(stream) => stream?,
                Err(_) => {
                    return Err(CinechatError::Transport(format!(
                        "no response from {} within {}s",
                        self.provider.name(),
                        self.limits.request_timeout.as_secs()
                    )));
                }
            },
        };

        let mut text = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(CinechatError::Cancelled("while streaming".into()));
                }
                next = tokio::time::timeout(self.limits.fragment_timeout, stream.next()) => next,
            };

            let fragment = match next {
                Ok(Some(fragment)) => fragment?,
                Ok(None) => break,
                Err(_) => {
                    return Err(CinechatError::Transport(format!(
                        "stream stalled for {}s",
                        self.limits.fragment_timeout.as_secs()
                    )));
                }
            };
            if fragment.is_empty() {
                continue;
            }

            sink.send_fragment(session_id, &fragment)
                .await
                .map_err(|e| disconnected(session_id, e))?;
            text.push_str(&fragment);
        }

        sink.finalize(session_id)
            .await
            .map_err(|e| disconnected(session_id, e))?;
        debug!(chars = text.len(), "Completion finished");
        Ok(text)
    }
}

fn disconnected(session_id: SessionId, err: CinechatError) -> CinechatError {
    warn!(%session_id, error = %err, "Output sink failed");
    CinechatError::Cancelled(format!("output closed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FragmentStream, Role};
    use crate::tools::{FunctionHandler, ToolDispatcher};
    use crate::directive::FunctionCall;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Script {
        Reply(Vec<&'static str>),
        /// Streams the fragments, then never yields again.
        Stall(Vec<&'static str>),
        /// Never starts streaming.
        Hang,
    }

    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Script>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get_response_stream(
            &self,
            _messages: &[Message],
            _config: &GenerationConfig,
        ) -> Result<FragmentStream, CinechatError> {
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Script::Reply(fragments)) => Ok(futures::stream::iter(
                    fragments.into_iter().map(|f| Ok(f.to_string())),
                )
                .boxed()),
                Some(Script::Stall(fragments)) => Ok(futures::stream::iter(
                    fragments.into_iter().map(|f| Ok(f.to_string())),
                )
                .chain(futures::stream::pending())
                .boxed()),
                Some(Script::Hang) => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                None => Err(CinechatError::Provider("script exhausted".into())),
            }
        }
    }

    #[derive(Default)]
    struct BufferSink {
        fragments: Mutex<Vec<String>>,
        cancel_on_first: Option<CancellationToken>,
        closed: bool,
    }

    #[async_trait]
    impl OutputSink for BufferSink {
        async fn send_fragment(&self, _id: SessionId, text: &str) -> Result<(), CinechatError> {
            if self.closed {
                return Err(CinechatError::Io {
                    source: std::io::Error::from(std::io::ErrorKind::BrokenPipe),
                });
            }
            self.fragments.lock().unwrap().push(text.to_string());
            if let Some(token) = &self.cancel_on_first {
                token.cancel();
            }
            Ok(())
        }

        async fn finalize(&self, _id: SessionId) -> Result<(), CinechatError> {
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl FunctionHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn required_arguments(&self) -> &'static [&'static str] {
            &[]
        }

        async fn call(&self, _call: &FunctionCall) -> Result<String, CinechatError> {
            Ok("echoed".into())
        }
    }

    fn orchestrator(provider: Arc<ScriptedProvider>, max_round_trips: usize) -> TurnOrchestrator {
        let mut dispatcher = ToolDispatcher::new(Duration::from_secs(5));
        dispatcher.register(Arc::new(Echo));
        TurnOrchestrator::new(
            provider,
            dispatcher,
            GenerationConfig::new("test-model"),
            TurnLimits {
                max_round_trips,
                request_timeout: Duration::from_secs(10),
                fragment_timeout: Duration::from_secs(3),
            },
        )
    }

    const ECHO_CALL: &str = r#"<function_call>{"name":"echo","arguments":{}}</function_call>"#;

    #[tokio::test]
    async fn empty_fragments_are_not_forwarded() {
        let provider = ScriptedProvider::new(vec![Script::Reply(vec!["Hel", "", "lo"])]);
        let sink = BufferSink::default();
        let mut session = Session::new("prompt");

        let outcome = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Hello");
        assert_eq!(*sink.fragments.lock().unwrap(), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn cap_of_one_never_dispatches() {
        let provider = ScriptedProvider::new(vec![Script::Reply(vec![ECHO_CALL])]);
        let mut session = Session::new("prompt");

        let result = orchestrator(provider, 1)
            .run_turn(&mut session, "hi", &BufferSink::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CinechatError::LoopLimitExceeded { limit: 1 })));
        assert_eq!(session.history().last().role, Role::Assistant);
        assert_eq!(session.history().count_role(Role::System), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_request() {
        let provider = ScriptedProvider::new(vec![Script::Reply(vec!["never"])]);
        let mut session = Session::new("prompt");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &BufferSink::default(), &cancel)
            .await;

        assert!(matches!(result, Err(CinechatError::Cancelled(_))));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().last().content, "hi");
    }

    #[tokio::test]
    async fn cancelling_mid_stream_drops_the_partial_reply() {
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(vec![Script::Reply(vec!["Dune is", " playing"])]);
        let sink = BufferSink {
            cancel_on_first: Some(cancel.clone()),
            ..Default::default()
        };
        let mut session = Session::new("prompt");

        let result = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &sink, &cancel)
            .await;

        assert!(matches!(result, Err(CinechatError::Cancelled(_))));
        assert_eq!(*sink.fragments.lock().unwrap(), vec!["Dune is"]);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn closed_sink_cancels_the_turn() {
        let provider = ScriptedProvider::new(vec![Script::Reply(vec!["hello"])]);
        let sink = BufferSink {
            closed: true,
            ..Default::default()
        };
        let mut session = Session::new("prompt");

        let result = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &sink, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CinechatError::Cancelled(msg)) if msg.contains("output closed")));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_is_a_transport_error() {
        let provider = ScriptedProvider::new(vec![Script::Stall(vec!["Let me"])]);
        let mut session = Session::new("prompt");

        let result = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &BufferSink::default(), &CancellationToken::new())
            .await;

        match result {
            Err(e @ CinechatError::Transport(_)) => {
                assert!(e.is_retryable());
                assert!(e.to_string().contains("stalled for 3s"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_provider_hits_the_request_timeout() {
        let provider = ScriptedProvider::new(vec![Script::Hang]);
        let mut session = Session::new("prompt");

        let result = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &BufferSink::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CinechatError::Transport(msg)) if msg.contains("within 10s")));
    }

    #[tokio::test]
    async fn provider_errors_propagate_unchanged() {
        let provider = ScriptedProvider::new(vec![]);
        let mut session = Session::new("prompt");

        let result = orchestrator(provider, 5)
            .run_turn(&mut session, "hi", &BufferSink::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CinechatError::Provider(msg)) if msg == "script exhausted"));
    }
}
