use anyhow::{Result, anyhow};

use crate::ai::gateway::explain_command;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::gemini::GeminiGateway;
use crate::projects::{ProjectRepository, SqliteProjectRepository, download_command};

pub async fn run(config: &AppConfig, project_id: &str) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    let project = SqliteProjectRepository::new(&db)
        .find(project_id)
        .await?
        .ok_or_else(|| anyhow!("No project with id {}", project_id))?;

    let command = download_command(&config.public_origin, &project.zip_file_name);
    println!("{}", command);

    let gateway = GeminiGateway::from_config(config);
    println!("# {}", explain_command(&gateway, &command).await);
    Ok(())
}
