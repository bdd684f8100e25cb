use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use futures::stream;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time;

use super::models::{ChatMessage, StreamEvent, Transcript};
use crate::ai::gateway::{AiGateway, FragmentStream, ProjectContext, SessionHandle};
use crate::core::AppConfig;

pub const GREETING_PROMPT: &str = "Hello! Please introduce yourself and this project briefly.";
pub const GREETING_FALLBACK: &str = "System online. Ready to assist with the codebase.";

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
pub enum ChatState {
    Uninitialized,
    Analyzing,
    Ready,
    Streaming,
    Failed,
}

/// What observers see after every change.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatView {
    pub state: ChatState,
    // Cosmetic progress line shown while analyzing
    pub status: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// How a call to `send_message` ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Not accepted: empty input or the tutor was not ready.
    Ignored,
    Completed,
    /// The stream failed and the error message was appended.
    Errored,
    /// Stopped through a `CancelHandle`; the partial reply is kept.
    Cancelled,
}

/// A reply that has been requested but not consumed yet.
pub struct PendingTurn(FragmentStream);

/// Stops the reply currently streaming. Requests made while nothing is
/// streaming are discarded when the next turn starts.
#[derive(Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Cosmetic progress lines played before connecting.
pub fn analysis_steps(context: &ProjectContext) -> Vec<String> {
    let first_entry = context
        .file_structure
        .lines()
        .nth(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("src/");
    vec![
        "> Connecting to CodeVault Neural Network...".to_string(),
        format!("> Analyzing project structure for '{}'...", context.title),
        format!("> Parsing {} syntax trees...", context.language),
        format!("> Loading file context: {}...", first_entry),
        "> Establishing secure session...".to_string(),
    ]
}

/// A tutor conversation about one project.
///
/// Owns the AI session and the transcript for as long as the project
/// is open. Every change to the transcript or state is published to
/// `subscribe()` receivers before the call that made it returns, and
/// after every streamed fragment.
///
/// Errors from the gateway never escape: a failed connection moves to
/// `ChatState::Failed` (see `retry`) and a failed reply appends an
/// error message to the transcript.
///
/// Use `ChatBuilder` to construct a `TutorChat`.
pub struct TutorChat {
    gateway: Arc<dyn AiGateway>,
    context: ProjectContext,
    handle: Option<Box<dyn SessionHandle>>,
    transcript: Transcript,
    state: ChatState,
    status: Option<String>,
    view_tx: watch::Sender<ChatView>,
    cancel_tx: Arc<watch::Sender<bool>>,
    analysis_step_delay: Duration,
    stream_idle_timeout: Duration,
    session_timeout: Duration,
}

impl TutorChat {
    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view_tx.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel_tx))
    }

    pub fn view(&self) -> ChatView {
        ChatView {
            state: self.state,
            status: self.status.clone(),
            messages: self.transcript.messages().to_vec(),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    fn set_state(&mut self, state: ChatState) {
        tracing::debug!("Tutor chat {:?} -> {:?}", self.state, state);
        self.state = state;
        self.publish();
    }

    /// Connects the first time the chat is opened. Does nothing after
    /// that.
    pub async fn activate(&mut self) -> ChatState {
        if self.state != ChatState::Uninitialized {
            return self.state;
        }
        self.connect().await
    }

    /// Tries to connect again after a failure. Existing messages are
    /// kept.
    pub async fn retry(&mut self) -> ChatState {
        if self.state != ChatState::Failed {
            return self.state;
        }
        self.connect().await
    }

    async fn open_session(
        gateway: &dyn AiGateway,
        context: &ProjectContext,
    ) -> Result<(Box<dyn SessionHandle>, String), Error> {
        let mut handle = gateway.create_session(context).await?;
        let greeting = handle.send(GREETING_PROMPT).await?;
        Ok((handle, greeting))
    }

    async fn connect(&mut self) -> ChatState {
        self.handle = None;
        self.set_state(ChatState::Analyzing);

        for step in analysis_steps(&self.context) {
            self.status = Some(step);
            self.publish();
            if !self.analysis_step_delay.is_zero() {
                time::sleep(self.analysis_step_delay).await;
            }
        }

        let opened = time::timeout(
            self.session_timeout,
            Self::open_session(self.gateway.as_ref(), &self.context),
        )
        .await
        .unwrap_or_else(|_| {
            Err(anyhow!(
                "Timed out after {:?} connecting to the AI tutor",
                self.session_timeout
            ))
        });

        self.status = None;
        match opened {
            Ok((handle, greeting)) => {
                let greeting = if greeting.trim().is_empty() {
                    GREETING_FALLBACK
                } else {
                    greeting.as_str()
                };
                self.transcript.push(ChatMessage::model(greeting));
                self.handle = Some(handle);
                tracing::info!("Tutor session ready for '{}'", self.context.title);
                self.set_state(ChatState::Ready);
            }
            Err(e) => {
                tracing::error!("AI connection failed: {}. Root cause: {}", e, e.root_cause());
                self.set_state(ChatState::Failed);
            }
        }
        self.state
    }

    /// Sends `text` and streams the reply into the transcript.
    pub async fn send_message(&mut self, text: &str) -> TurnOutcome {
        match self.begin_turn(text).await {
            Some(turn) => self.finish_turn(turn).await,
            None => TurnOutcome::Ignored,
        }
    }

    /// First half of `send_message`: appends the user message and the
    /// pending reply and opens the stream. `None` when the input is
    /// blank or the chat is not `Ready`, in which case nothing changes.
    pub async fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() || self.state != ChatState::Ready || self.handle.is_none() {
            return None;
        }

        self.cancel_tx.send_replace(false);
        self.transcript.begin_reply(text);
        self.set_state(ChatState::Streaming);

        let handle = self.handle.as_mut()?;
        let opened = time::timeout(self.stream_idle_timeout, handle.send_streaming(text))
            .await
            .unwrap_or_else(|_| Err(anyhow!("Timed out opening reply stream")));

        // A stream that fails to open is handled like one that fails
        // before its first fragment
        let fragments = match opened {
            Ok(fragments) => fragments,
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        };
        Some(PendingTurn(fragments))
    }

    /// Second half of `send_message`: consumes the stream, applying
    /// each event to the transcript, until it ends, fails, times out or
    /// is cancelled.
    pub async fn finish_turn(&mut self, turn: PendingTurn) -> TurnOutcome {
        let PendingTurn(mut fragments) = turn;
        let mut cancelled = self.cancel_tx.subscribe();
        let idle = self.stream_idle_timeout;

        let outcome = loop {
            let event = tokio::select! {
                biased;
                _ = cancelled.wait_for(|c| *c) => None,
                next = time::timeout(idle, fragments.next()) => Some(match next {
                    Ok(Some(Ok(fragment))) => StreamEvent::Fragment(fragment),
                    Ok(Some(Err(e))) => StreamEvent::Error(e.to_string()),
                    Ok(None) => StreamEvent::End,
                    Err(_) => StreamEvent::Error(format!("No fragment received for {:?}", idle)),
                }),
            };

            let Some(event) = event else {
                tracing::info!("Tutor reply cancelled");
                self.transcript.apply(StreamEvent::End);
                break TurnOutcome::Cancelled;
            };

            let outcome = match &event {
                StreamEvent::End => Some(TurnOutcome::Completed),
                StreamEvent::Error(reason) => {
                    tracing::error!("Chat stream error: {}", reason);
                    Some(TurnOutcome::Errored)
                }
                StreamEvent::Fragment(_) => None,
            };
            self.transcript.apply(event);
            if let Some(outcome) = outcome {
                break outcome;
            }
            self.publish();
        };

        self.set_state(ChatState::Ready);
        outcome
    }
}

pub struct ChatBuilder {
    gateway: Arc<dyn AiGateway>,
    context: ProjectContext,
    transcript: Transcript,
    analysis_step_delay: Duration,
    stream_idle_timeout: Duration,
    session_timeout: Duration,
}

impl ChatBuilder {
    pub fn new(gateway: Arc<dyn AiGateway>, context: ProjectContext) -> Self {
        Self {
            gateway,
            context,
            transcript: Transcript::new(),
            analysis_step_delay: Duration::from_millis(800),
            stream_idle_timeout: Duration::from_secs(60),
            session_timeout: Duration::from_secs(30),
        }
    }

    /// Takes delays and timeouts from the app config.
    pub fn config(self, config: &AppConfig) -> Self {
        self.analysis_step_delay(config.analysis_step_delay)
            .stream_idle_timeout(config.stream_idle_timeout)
            .session_timeout(config.session_timeout)
    }

    pub fn analysis_step_delay(mut self, delay: Duration) -> Self {
        self.analysis_step_delay = delay;
        self
    }

    pub fn stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn transcript(mut self, messages: Vec<ChatMessage>) -> Self {
        let mut transcript = Transcript::new();
        for m in messages {
            transcript.push(m);
        }
        self.transcript = transcript;
        self
    }

    pub fn build(self) -> TutorChat {
        let view = ChatView {
            state: ChatState::Uninitialized,
            status: None,
            messages: self.transcript.messages().to_vec(),
        };
        let (view_tx, _) = watch::channel(view);
        let (cancel_tx, _) = watch::channel(false);

        TutorChat {
            gateway: self.gateway,
            context: self.context,
            handle: None,
            transcript: self.transcript,
            state: ChatState::Uninitialized,
            status: None,
            view_tx,
            cancel_tx: Arc::new(cancel_tx),
            analysis_step_delay: self.analysis_step_delay,
            stream_idle_timeout: self.stream_idle_timeout,
            session_timeout: self.session_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::chat::models::{ChatRole, LOST_CONNECTION_MESSAGE};
    use crate::ai::scripted::{ScriptedGateway, ScriptedReply};
    use crate::projects::seed::initial_projects;

    fn context() -> ProjectContext {
        ProjectContext::from(&initial_projects()[0])
    }

    fn chat(gateway: &ScriptedGateway) -> TutorChat {
        ChatBuilder::new(Arc::new(gateway.clone()), context())
            .analysis_step_delay(Duration::ZERO)
            .stream_idle_timeout(Duration::from_millis(200))
            .session_timeout(Duration::from_millis(200))
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ChatBuilder::new(Arc::new(ScriptedGateway::new()), context());
        assert_eq!(builder.analysis_step_delay, Duration::from_millis(800));
        assert_eq!(builder.stream_idle_timeout, Duration::from_secs(60));
        assert_eq!(builder.session_timeout, Duration::from_secs(30));

        let chat = builder.build();
        assert_eq!(chat.state(), ChatState::Uninitialized);
        assert!(chat.transcript().is_empty());
        assert!(chat.handle.is_none());
    }

    #[test]
    fn test_builder_config() {
        let mut config = AppConfig::with_storage_path("/tmp");
        config.analysis_step_delay = Duration::ZERO;
        config.stream_idle_timeout = Duration::from_secs(5);
        let builder = ChatBuilder::new(Arc::new(ScriptedGateway::new()), context()).config(&config);
        assert_eq!(builder.analysis_step_delay, Duration::ZERO);
        assert_eq!(builder.stream_idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_analysis_steps_use_second_file_structure_line() {
        let steps = analysis_steps(&context());
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[3], "> Loading file context: main.py...");

        let mut ctx = context();
        ctx.file_structure = "flat".to_string();
        assert_eq!(analysis_steps(&ctx)[3], "> Loading file context: src/...");
    }

    #[tokio::test]
    async fn test_activate_seeds_greeting() {
        let gateway = ScriptedGateway::new().greeting("Welcome to Todo List CLI!");
        let mut chat = chat(&gateway);

        assert_eq!(chat.activate().await, ChatState::Ready);
        assert_eq!(
            chat.transcript().messages(),
            &[ChatMessage::model("Welcome to Todo List CLI!")]
        );
        assert_eq!(gateway.sent(), vec![GREETING_PROMPT.to_string()]);
        assert_eq!(gateway.contexts(), vec![context()]);
        assert!(chat.status().is_none());

        // Activating again does not reconnect
        assert_eq!(chat.activate().await, ChatState::Ready);
        assert_eq!(gateway.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_empty_greeting_uses_fallback() {
        let gateway = ScriptedGateway::new().greeting("");
        let mut chat = chat(&gateway);
        chat.activate().await;
        assert_eq!(
            chat.transcript().messages(),
            &[ChatMessage::model(GREETING_FALLBACK)]
        );
    }

    #[tokio::test]
    async fn test_session_failure_then_retry() {
        let gateway = ScriptedGateway::new().fail_sessions(1);
        let mut chat = chat(&gateway);

        assert_eq!(chat.activate().await, ChatState::Failed);
        assert!(chat.transcript().is_empty());
        assert_eq!(chat.send_message("hello").await, TurnOutcome::Ignored);
        assert!(chat.transcript().is_empty());

        assert_eq!(chat.retry().await, ChatState::Ready);
        assert_eq!(gateway.contexts().len(), 2);
        assert_eq!(chat.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_only_from_failed() {
        let gateway = ScriptedGateway::new();
        let mut chat = chat(&gateway);
        assert_eq!(chat.retry().await, ChatState::Uninitialized);
        chat.activate().await;
        assert_eq!(chat.retry().await, ChatState::Ready);
        assert_eq!(gateway.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_session_timeout_fails() {
        let gateway = ScriptedGateway::new().hang_sessions();
        let mut chat = chat(&gateway);
        assert_eq!(chat.activate().await, ChatState::Failed);
        assert!(chat.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_stream_completes() {
        let gateway = ScriptedGateway::new().reply(ScriptedReply::fragments(&["Hel", "lo"]));
        let mut chat = chat(&gateway);
        chat.activate().await;

        assert_eq!(chat.send_message("  say hello  ").await, TurnOutcome::Completed);
        let messages = chat.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::user("say hello"));
        assert_eq!(messages[2], ChatMessage::model("Hello"));
        assert_eq!(chat.state(), ChatState::Ready);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let gateway = ScriptedGateway::new();
        let mut chat = chat(&gateway);
        chat.activate().await;

        assert_eq!(chat.send_message("").await, TurnOutcome::Ignored);
        assert_eq!(chat.send_message(" \n\t ").await, TurnOutcome::Ignored);
        assert_eq!(chat.transcript().len(), 1);
        assert!(!chat.transcript().iter().any(|m| m.role == ChatRole::User));
    }

    #[tokio::test]
    async fn test_send_while_streaming_is_ignored() {
        let gateway = ScriptedGateway::new().reply(ScriptedReply::fragments(&["ok"]));
        let mut chat = chat(&gateway);
        chat.activate().await;

        let turn = chat.begin_turn("first").await.unwrap();
        assert_eq!(chat.state(), ChatState::Streaming);
        let before = chat.transcript().clone();

        assert_eq!(chat.send_message("second").await, TurnOutcome::Ignored);
        assert!(chat.begin_turn("third").await.is_none());
        assert_eq!(chat.transcript(), &before);

        assert_eq!(chat.finish_turn(turn).await, TurnOutcome::Completed);
        assert_eq!(chat.transcript().last().unwrap(), &ChatMessage::model("ok"));
        assert_eq!(gateway.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_error_after_zero_fragments() {
        let gateway =
            ScriptedGateway::new().reply(ScriptedReply::fail_after(&[], "connection reset"));
        let mut chat = chat(&gateway);
        chat.activate().await;

        assert_eq!(chat.send_message("hi").await, TurnOutcome::Errored);
        let messages = chat.transcript().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2], ChatMessage::model(""));
        assert_eq!(messages[3], ChatMessage::model(LOST_CONNECTION_MESSAGE));
        assert!(chat.transcript().pending().is_none());
        assert_eq!(chat.state(), ChatState::Ready);
    }

    #[tokio::test]
    async fn test_open_error_is_a_stream_error() {
        let gateway = ScriptedGateway::new()
            .reply(ScriptedReply::OpenError("503".to_string()))
            .reply(ScriptedReply::fragments(&["back"]));
        let mut chat = chat(&gateway);
        chat.activate().await;

        assert_eq!(chat.send_message("hi").await, TurnOutcome::Errored);
        assert_eq!(
            chat.transcript().last().unwrap().text,
            LOST_CONNECTION_MESSAGE
        );

        // The session is still usable
        assert_eq!(chat.send_message("again").await, TurnOutcome::Completed);
        assert_eq!(chat.transcript().last().unwrap().text, "back");
    }

    #[tokio::test]
    async fn test_idle_stream_times_out() {
        let gateway = ScriptedGateway::new().reply(ScriptedReply::hang(&["par", "tial"]));
        let mut chat = chat(&gateway);
        chat.activate().await;

        assert_eq!(chat.send_message("hi").await, TurnOutcome::Errored);
        let messages = chat.transcript().messages();
        assert_eq!(messages[2], ChatMessage::model("partial"));
        assert_eq!(messages[3], ChatMessage::model(LOST_CONNECTION_MESSAGE));
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_reply() {
        let gateway = ScriptedGateway::new().reply(ScriptedReply::hang(&["half"]));
        let mut chat = ChatBuilder::new(Arc::new(gateway.clone()), context())
            .analysis_step_delay(Duration::ZERO)
            .stream_idle_timeout(Duration::from_secs(30))
            .build();
        chat.activate().await;

        let cancel = chat.cancel_handle();
        let mut views = chat.subscribe();
        let turn = chat.begin_turn("hi").await.unwrap();
        let canceller = tokio::spawn(async move {
            // Cancel once the first fragment has been published
            views
                .wait_for(|v| v.messages.last().is_some_and(|m| m.text == "half"))
                .await
                .unwrap();
            cancel.cancel();
        });

        assert_eq!(chat.finish_turn(turn).await, TurnOutcome::Cancelled);
        canceller.await.unwrap();
        assert_eq!(chat.transcript().len(), 3);
        assert_eq!(chat.transcript().last().unwrap(), &ChatMessage::model("half"));
        assert_eq!(chat.state(), ChatState::Ready);
    }

    #[tokio::test]
    async fn test_cancel_before_turn_is_discarded() {
        let gateway = ScriptedGateway::new().reply(ScriptedReply::fragments(&["full"]));
        let mut chat = chat(&gateway);
        chat.activate().await;

        chat.cancel_handle().cancel();
        assert_eq!(chat.send_message("hi").await, TurnOutcome::Completed);
        assert_eq!(chat.transcript().last().unwrap().text, "full");
    }

    #[tokio::test]
    async fn test_views_are_published() {
        let gateway = ScriptedGateway::new().reply(ScriptedReply::fragments(&["a", "b"]));
        let mut chat = chat(&gateway);
        let views = chat.subscribe();

        chat.activate().await;
        assert_eq!(views.borrow().state, ChatState::Ready);
        assert_eq!(views.borrow().messages.len(), 1);

        let turn = chat.begin_turn("go").await.unwrap();
        {
            let view = views.borrow();
            assert_eq!(view.state, ChatState::Streaming);
            assert!(view.messages.last().unwrap().pending);
        }
        chat.finish_turn(turn).await;
        assert_eq!(*views.borrow(), chat.view());
    }
}
