//! The project registry: the list of projects students can browse and
//! the admin operation for adding to it.
use anyhow::{Error, Result};
use async_trait::async_trait;
use uuid::Uuid;

mod db;
pub mod download;
mod memory;
mod models;
pub mod seed;

pub use db::SqliteProjectRepository;
pub use download::{download_command, download_url};
pub use memory::MemoryProjectRepository;
pub use models::{
    Difficulty, MISSING_FIELDS_STATUS, NewProject, Project, ValidationError, deploy_status,
    parse_tags,
};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// All projects, newest additions first. Seeds the defaults when
    /// the store is empty.
    async fn list(&self) -> Result<Vec<Project>, Error>;

    /// Assigns a fresh id and stores the project ahead of all existing
    /// ones.
    async fn add(&self, project: NewProject) -> Result<Project, Error>;

    async fn find(&self, id: &str) -> Result<Option<Project>, Error> {
        Ok(self.list().await?.into_iter().find(|p| p.id == id))
    }
}

pub(crate) fn new_project_id() -> String {
    format!("p-{}", Uuid::new_v4().simple())
}
