use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::ai::gateway::AiGateway;
use crate::auth::{AuthProvider, StaticCredentials};
use crate::core::AppConfig;
use crate::gemini::GeminiGateway;
use crate::projects::{ProjectRepository, SqliteProjectRepository};
use crate::session::{SessionRepository, SqliteSessionRepository};

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    pub projects: Arc<dyn ProjectRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub auth: Arc<dyn AuthProvider>,
    pub ai: Arc<dyn AiGateway>,
}

impl AppState {
    /// Production wiring: SQLite backed stores and the Gemini gateway.
    pub fn new(db: Connection, config: AppConfig) -> Self {
        Self {
            projects: Arc::new(SqliteProjectRepository::new(&db)),
            sessions: Arc::new(SqliteSessionRepository::new(&db)),
            auth: Arc::new(StaticCredentials),
            ai: Arc::new(GeminiGateway::from_config(&config)),
            db,
            config,
        }
    }

    /// Swaps the AI backend, used to run without network access.
    pub fn with_ai(mut self, ai: Arc<dyn AiGateway>) -> Self {
        self.ai = ai;
        self
    }
}
