//! A deterministic, in-process `AiGateway`. Replies and failures are
//! scripted up front so tutor behavior can be exercised
//! without a network.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::gateway::{AiGateway, FragmentStream, ProjectContext, SessionHandle};

/// How one `send_streaming` call behaves.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Yields the fragments then completes.
    Fragments(Vec<String>),
    /// Yields the fragments then fails with the message.
    FailAfter(Vec<String>, String),
    /// The stream can not be opened at all.
    OpenError(String),
    /// Yields the fragments then never produces anything again.
    Hang(Vec<String>),
}

impl ScriptedReply {
    pub fn fragments(parts: &[&str]) -> Self {
        Self::Fragments(parts.iter().map(|s| s.to_string()).collect())
    }

    pub fn fail_after(parts: &[&str], error: &str) -> Self {
        Self::FailAfter(parts.iter().map(|s| s.to_string()).collect(), error.to_string())
    }

    pub fn hang(parts: &[&str]) -> Self {
        Self::Hang(parts.iter().map(|s| s.to_string()).collect())
    }
}

#[derive(Default)]
struct Script {
    session_failures: usize,
    hang_sessions: bool,
    greeting: String,
    generate_reply: Option<String>,
    replies: VecDeque<ScriptedReply>,
    sessions_created: usize,
    contexts: Vec<ProjectContext>,
    prompts: Vec<String>,
    sent: Vec<String>,
}

#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.with_script(|s| {
            s.greeting = "Hi! I'm your CodeVault tutor.".to_string();
            s.generate_reply = Some("Downloads the project archive.".to_string());
        });
        gateway
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut script)
    }

    /// The next `n` session creations fail.
    pub fn fail_sessions(self, n: usize) -> Self {
        self.with_script(|s| s.session_failures = n);
        self
    }

    /// Session creation never completes.
    pub fn hang_sessions(self) -> Self {
        self.with_script(|s| s.hang_sessions = true);
        self
    }

    /// Reply to every non streaming `send`.
    pub fn greeting(self, text: &str) -> Self {
        self.with_script(|s| s.greeting = text.to_string());
        self
    }

    pub fn generate_reply(self, text: &str) -> Self {
        self.with_script(|s| s.generate_reply = Some(text.to_string()));
        self
    }

    pub fn fail_generate(self) -> Self {
        self.with_script(|s| s.generate_reply = None);
        self
    }

    /// Queues the behavior of the next `send_streaming` call.
    pub fn reply(self, reply: ScriptedReply) -> Self {
        self.with_script(|s| s.replies.push_back(reply));
        self
    }

    pub fn sessions_created(&self) -> usize {
        self.with_script(|s| s.sessions_created)
    }

    pub fn contexts(&self) -> Vec<ProjectContext> {
        self.with_script(|s| s.contexts.clone())
    }

    /// Prompts passed to `generate`.
    pub fn prompts(&self) -> Vec<String> {
        self.with_script(|s| s.prompts.clone())
    }

    /// Messages sent over any session, in order.
    pub fn sent(&self) -> Vec<String> {
        self.with_script(|s| s.sent.clone())
    }
}

#[async_trait]
impl AiGateway for ScriptedGateway {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        self.with_script(|s| {
            s.prompts.push(prompt.to_string());
            s.generate_reply
                .clone()
                .ok_or_else(|| anyhow!("Scripted generate failure"))
        })
    }

    async fn create_session(
        &self,
        context: &ProjectContext,
    ) -> Result<Box<dyn SessionHandle>, Error> {
        let hang = self.with_script(|s| s.hang_sessions);
        if hang {
            futures::future::pending::<()>().await;
        }
        self.with_script(|s| {
            s.contexts.push(context.clone());
            if s.session_failures > 0 {
                s.session_failures -= 1;
                return Err(anyhow!("Scripted network error"));
            }
            s.sessions_created += 1;
            Ok(())
        })?;
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSession {
    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut script)
    }
}

fn ok_fragments(parts: Vec<String>) -> impl futures::Stream<Item = Result<String, Error>> {
    stream::iter(parts.into_iter().map(Ok))
}

#[async_trait]
impl SessionHandle for ScriptedSession {
    async fn send(&mut self, message: &str) -> Result<String, Error> {
        Ok(self.with_script(|s| {
            s.sent.push(message.to_string());
            s.greeting.clone()
        }))
    }

    async fn send_streaming(&mut self, message: &str) -> Result<FragmentStream, Error> {
        let reply = self.with_script(|s| {
            s.sent.push(message.to_string());
            s.replies.pop_front()
        });
        let stream: FragmentStream = match reply {
            None => ok_fragments(Vec::new()).boxed(),
            Some(ScriptedReply::Fragments(parts)) => ok_fragments(parts).boxed(),
            Some(ScriptedReply::FailAfter(parts, error)) => ok_fragments(parts)
                .chain(stream::once(async move { Err(anyhow!(error)) }))
                .boxed(),
            Some(ScriptedReply::OpenError(error)) => return Err(anyhow!(error)),
            Some(ScriptedReply::Hang(parts)) => ok_fragments(parts).chain(stream::pending()).boxed(),
        };
        Ok(stream)
    }
}
