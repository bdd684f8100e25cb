//! Public types for the projects API
use serde::{Deserialize, Serialize};

pub use crate::projects::{NewProject, Project};

#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectsResponse {
    pub projects: Vec<Project>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AddProjectResponse {
    pub project: Project,
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub project_id: String,
    pub url: String,
    pub command: String,
    pub explanation: String,
}
