//! The seam between the tutor and a generative AI backend.
use anyhow::{Error, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::json;

use super::prompt::{Prompt, templates};
use crate::projects::{Difficulty, Project};

pub const EXPLAIN_EMPTY_FALLBACK: &str = "Downloads the file.";
pub const EXPLAIN_ERROR_FALLBACK: &str = "Downloads the source code to your local machine.";

/// Lazily produced text fragments of one streamed reply. Finite and
/// consumed at most once; an `Err` item ends the reply.
pub type FragmentStream = BoxStream<'static, Result<String, Error>>;

/// The descriptive project metadata a tutor session is bound to.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ProjectContext {
    pub title: String,
    pub language: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub file_structure: String,
}

impl From<&Project> for ProjectContext {
    fn from(project: &Project) -> Self {
        Self {
            title: project.title.clone(),
            language: project.language.clone(),
            difficulty: project.difficulty,
            description: project.description.clone(),
            file_structure: project.file_structure.clone(),
        }
    }
}

impl ProjectContext {
    pub fn system_instruction(&self) -> Result<String, Error> {
        let rendered = templates().render(&Prompt::TutorSystem.to_string(), &json!(self))?;
        Ok(rendered)
    }
}

#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Context free, single shot generation.
    async fn generate(&self, prompt: &str) -> Result<String, Error>;

    /// Opens a conversation bound to `context` for its whole lifetime.
    async fn create_session(
        &self,
        context: &ProjectContext,
    ) -> Result<Box<dyn SessionHandle>, Error>;
}

#[async_trait]
pub trait SessionHandle: Send {
    async fn send(&mut self, message: &str) -> Result<String, Error>;

    async fn send_streaming(&mut self, message: &str) -> Result<FragmentStream, Error>;
}

/// One sentence explanation of a shell command for beginners. Never
/// fails, falls back to a fixed sentence instead.
pub async fn explain_command(gateway: &dyn AiGateway, command: &str) -> String {
    let prompt = match templates().render(
        &Prompt::ExplainCommand.to_string(),
        &json!({ "command": command }),
    ) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Rendering explain prompt failed: {}", e);
            return EXPLAIN_ERROR_FALLBACK.to_string();
        }
    };

    match gateway.generate(&prompt).await {
        Ok(text) if text.trim().is_empty() => EXPLAIN_EMPTY_FALLBACK.to_string(),
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::warn!("Explaining command failed: {}", e);
            EXPLAIN_ERROR_FALLBACK.to_string()
        }
    }
}
