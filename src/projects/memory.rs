use anyhow::{Error, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::{NewProject, Project};
use super::seed::initial_projects;
use super::{ProjectRepository, new_project_id};

/// Registry that only lives as long as the value. Seeds lazily on the
/// first call, same as the SQLite registry.
#[derive(Default)]
pub struct MemoryProjectRepository {
    projects: Mutex<Option<Vec<Project>>>,
}

impl MemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn list(&self) -> Result<Vec<Project>, Error> {
        let mut projects = self.projects.lock().await;
        Ok(projects.get_or_insert_with(initial_projects).clone())
    }

    async fn add(&self, project: NewProject) -> Result<Project, Error> {
        let project = project.with_id(&new_project_id());
        let mut projects = self.projects.lock().await;
        projects
            .get_or_insert_with(initial_projects)
            .insert(0, project.clone());
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::Difficulty;

    #[tokio::test]
    async fn test_add_then_find() {
        let registry = MemoryProjectRepository::new();
        let added = registry
            .add(NewProject {
                title: "Snake".to_string(),
                description: "Terminal snake game".to_string(),
                language: "C".to_string(),
                difficulty: Difficulty::Intermediate,
                zip_file_name: "snake.zip".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let projects = registry.list().await.unwrap();
        assert_eq!(projects.len(), 5);
        assert_eq!(projects[0], added);
        assert_eq!(registry.find(&added.id).await.unwrap(), Some(added));
        assert_eq!(registry.find("missing").await.unwrap(), None);
    }
}
