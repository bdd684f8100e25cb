use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::{Connection, params};

use super::models::{NewProject, Project};
use super::seed::initial_projects;
use super::{ProjectRepository, new_project_id};

// Raw column values for a project row. Decoding happens outside of
// the connection thread so a bad row can fall back to the defaults.
type ProjectRow = (String, String, String, String, String, String, String, String);

/// Project registry persisted in the `project` table. Projects are
/// listed by ascending `position`; new projects get a position lower
/// than every existing one so they appear first.
#[derive(Clone)]
pub struct SqliteProjectRepository {
    db: Connection,
}

impl SqliteProjectRepository {
    pub fn new(db: &Connection) -> Self {
        Self { db: db.clone() }
    }

    async fn seed_if_empty(&self) -> Result<(), Error> {
        let seeds = initial_projects();
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM project", [], |row| row.get(0))?;
                if count > 0 {
                    return Ok(0);
                }
                for (position, p) in seeds.iter().enumerate() {
                    insert_project(&tx, p, position as i64, &now)?;
                }
                tx.commit()?;
                Ok(seeds.len())
            })
            .await?;

        if inserted > 0 {
            tracing::info!("Seeded project registry with {} default projects", inserted);
        }
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<ProjectRow>, Error> {
        let rows = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r"
                    SELECT id, title, description, language, difficulty, tags, file_structure, zip_file_name
                    FROM project
                    ORDER BY position ASC
                    ",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                        ))
                    })?
                    .collect::<Result<Vec<ProjectRow>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    // The outer error is a storage failure, the inner one a row that
    // does not decode
    async fn decoded(&self) -> Result<Result<Vec<Project>, Error>, Error> {
        Ok(self
            .rows()
            .await?
            .into_iter()
            .map(decode_row)
            .collect::<Result<Vec<Project>, Error>>())
    }
}

fn insert_project(
    conn: &rusqlite::Connection,
    p: &Project,
    position: i64,
    now: &str,
) -> tokio_rusqlite::Result<()> {
    let tags =
        serde_json::to_string(&p.tags).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
    conn.execute(
        r"INSERT INTO project
            (id, position, title, description, language, difficulty, tags, file_structure, zip_file_name, created_at)
          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            p.id,
            position,
            p.title,
            p.description,
            p.language,
            p.difficulty.to_string(),
            tags,
            p.file_structure,
            p.zip_file_name,
            now,
        ],
    )?;
    Ok(())
}

fn decode_row(row: ProjectRow) -> Result<Project, Error> {
    let (id, title, description, language, difficulty, tags, file_structure, zip_file_name) = row;
    let tags: Vec<String> = serde_json::from_str(&tags)
        .map_err(|e| anyhow!("Invalid tags for project {}: {}", id, e))?;
    Ok(Project {
        difficulty: difficulty.parse()?,
        id,
        title,
        description,
        language,
        tags,
        file_structure,
        zip_file_name,
    })
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn list(&self) -> Result<Vec<Project>, Error> {
        self.seed_if_empty().await?;

        match self.decoded().await? {
            Ok(projects) => Ok(projects),
            Err(e) => {
                tracing::warn!("Project registry is corrupt, using defaults: {}", e);
                Ok(initial_projects())
            }
        }
    }

    async fn add(&self, project: NewProject) -> Result<Project, Error> {
        // Seeding first guarantees the defaults exist so the new
        // project is placed in front of them
        self.seed_if_empty().await?;

        // A corrupt registry is replaced by the defaults, otherwise
        // `list` would keep hiding the project added here
        let corrupt = match self.decoded().await? {
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("Project registry is corrupt, resetting to defaults: {}", e);
                true
            }
        };

        let project = project.with_id(&new_project_id());
        let p = project.clone();
        let seeds = initial_projects();
        let now = Utc::now().to_rfc3339();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                if corrupt {
                    tx.execute("DELETE FROM project", [])?;
                    for (position, seed) in seeds.iter().enumerate() {
                        insert_project(&tx, seed, position as i64, &now)?;
                    }
                }
                let min: Option<i64> =
                    tx.query_row("SELECT MIN(position) FROM project", [], |row| row.get(0))?;
                let position = min.map(|m| m - 1).unwrap_or(0);
                insert_project(&tx, &p, position, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await?;

        tracing::info!("Added project {} ({})", project.id, project.title);
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::memory_db;

    fn new_project(title: &str) -> NewProject {
        NewProject {
            title: title.to_string(),
            description: "desc".to_string(),
            language: "Go".to_string(),
            zip_file_name: format!("{}.zip", title),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_seeds_once() {
        let db = memory_db().await.unwrap();
        let repo = SqliteProjectRepository::new(&db);

        let first = repo.list().await.unwrap();
        let second = repo.list().await.unwrap();
        assert_eq!(first, initial_projects());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_add_prepends() {
        let db = memory_db().await.unwrap();
        let repo = SqliteProjectRepository::new(&db);

        let a = repo.add(new_project("A")).await.unwrap();
        let b = repo.add(new_project("B")).await.unwrap();
        let projects = repo.list().await.unwrap();

        assert_eq!(projects.len(), initial_projects().len() + 2);
        assert_eq!(projects[0], b);
        assert_eq!(projects[1], a);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_corrupt_row_falls_back_to_defaults() {
        let db = memory_db().await.unwrap();
        let repo = SqliteProjectRepository::new(&db);
        repo.list().await.unwrap();

        db.call(|conn| {
            conn.execute("UPDATE project SET tags = 'not json' WHERE id = 'p1'", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let projects = repo.list().await.unwrap();
        assert_eq!(projects, initial_projects());
    }

    #[tokio::test]
    async fn test_add_after_corrupt_row_is_listed() {
        let db = memory_db().await.unwrap();
        let repo = SqliteProjectRepository::new(&db);
        repo.list().await.unwrap();

        db.call(|conn| {
            conn.execute("UPDATE project SET tags = 'not json' WHERE id = 'p1'", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let added = repo.add(new_project("X")).await.unwrap();
        let projects = repo.list().await.unwrap();

        assert_eq!(projects.len(), initial_projects().len() + 1);
        assert_eq!(projects[0], added);
        assert_eq!(&projects[1..], initial_projects().as_slice());
    }
}
