use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;

use super::core::{Content, Role, generate_content, stream_generate_content};
use crate::ai::gateway::{AiGateway, FragmentStream, ProjectContext, SessionHandle};
use crate::core::AppConfig;

/// `AiGateway` backed by the Gemini REST API.
#[derive(Clone, Debug)]
pub struct GeminiGateway {
    api_hostname: String,
    api_key: String,
    model: String,
}

impl GeminiGateway {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.gemini_api_hostname,
            &config.gemini_api_key,
            &config.gemini_model,
        )
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        let contents = vec![Content::new(Role::User, prompt)];
        generate_content(
            &contents,
            &None,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await
    }

    async fn create_session(
        &self,
        context: &ProjectContext,
    ) -> Result<Box<dyn SessionHandle>, Error> {
        let instruction = context.system_instruction()?;
        tracing::debug!("Creating tutor session for {}", context.title);
        Ok(Box::new(GeminiSession {
            gateway: self.clone(),
            system_instruction: Some(Content::instruction(&instruction)),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

/// A multi-turn conversation. The API is stateless so the full
/// history is sent on every turn. A turn is only recorded once its
/// reply completed successfully.
pub struct GeminiSession {
    gateway: GeminiGateway,
    system_instruction: Option<Content>,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiSession {
    fn contents_with(&self, message: &str) -> Result<Vec<Content>, Error> {
        let mut contents = self
            .history
            .lock()
            .map_err(|_| anyhow!("Session history lock poisoned"))?
            .clone();
        contents.push(Content::new(Role::User, message));
        Ok(contents)
    }

    fn record_turn(
        history: &Mutex<Vec<Content>>,
        message: &str,
        reply: &str,
    ) -> Result<(), Error> {
        let mut history = history
            .lock()
            .map_err(|_| anyhow!("Session history lock poisoned"))?;
        history.push(Content::new(Role::User, message));
        history.push(Content::new(Role::Model, reply));
        Ok(())
    }
}

#[async_trait]
impl SessionHandle for GeminiSession {
    async fn send(&mut self, message: &str) -> Result<String, Error> {
        let contents = self.contents_with(message)?;
        let reply = generate_content(
            &contents,
            &self.system_instruction,
            &self.gateway.api_hostname,
            &self.gateway.api_key,
            &self.gateway.model,
        )
        .await?;
        Self::record_turn(&self.history, message, &reply)?;
        Ok(reply)
    }

    async fn send_streaming(&mut self, message: &str) -> Result<FragmentStream, Error> {
        let contents = self.contents_with(message)?;
        let mut fragments = stream_generate_content(
            &contents,
            &self.system_instruction,
            &self.gateway.api_hostname,
            &self.gateway.api_key,
            &self.gateway.model,
        )
        .await?;

        let history = Arc::clone(&self.history);
        let message = message.to_string();
        let stream = try_stream! {
            let mut reply = String::new();
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment?;
                reply.push_str(&fragment);
                yield fragment;
            }
            GeminiSession::record_turn(&history, &message, &reply)?;
        };

        Ok(stream.boxed())
    }
}
