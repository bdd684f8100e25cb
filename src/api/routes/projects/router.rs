//! Router for the project registry API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use super::public;
use crate::ai::gateway::explain_command;
use crate::api::public::{ApiError, NotFound};
use crate::api::state::AppState;
use crate::projects::{NewProject, deploy_status, download_command, download_url};

type SharedState = Arc<RwLock<AppState>>;

// The read guard must not be held across an await
fn read_state<T>(state: &SharedState, f: impl FnOnce(&AppState) -> T) -> T {
    let shared_state = state.read().unwrap_or_else(|e| e.into_inner());
    f(&shared_state)
}

async fn list_projects(
    State(state): State<SharedState>,
) -> Result<Json<public::ProjectsResponse>, ApiError> {
    let projects = read_state(&state, |s| Arc::clone(&s.projects));
    let projects = projects.list().await?;
    Ok(Json(public::ProjectsResponse { projects }))
}

/// Adds a project. Unlike `codevault projects add` this does not look
/// at the saved session; the API carries no bearer tokens, so callers
/// must keep the server off untrusted networks.
async fn add_project(
    State(state): State<SharedState>,
    Json(body): Json<NewProject>,
) -> Result<Json<public::AddProjectResponse>, ApiError> {
    let (projects, downloads_path) = read_state(&state, |s| {
        (Arc::clone(&s.projects), s.config.downloads_path.clone())
    });
    let new_project = body.validate()?;
    let project = projects.add(new_project).await?;
    tracing::info!("Added project {} ({})", project.title, project.id);

    let status = deploy_status(&project.zip_file_name, &downloads_path);
    Ok(Json(public::AddProjectResponse { project, status }))
}

async fn project_download(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::DownloadResponse>, ApiError> {
    let (projects, ai, origin) = read_state(&state, |s| {
        (
            Arc::clone(&s.projects),
            Arc::clone(&s.ai),
            s.config.public_origin.clone(),
        )
    });
    let project = projects
        .find(&id)
        .await?
        .ok_or_else(|| NotFound(format!("project {}", id)))?;

    let command = download_command(&origin, &project.zip_file_name);
    let explanation = explain_command(ai.as_ref(), &command).await;

    Ok(Json(public::DownloadResponse {
        project_id: project.id,
        url: download_url(&origin, &project.zip_file_name),
        command,
        explanation,
    }))
}

/// Create the projects router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_projects).post(add_project))
        .route("/{id}/download", get(project_download))
}
