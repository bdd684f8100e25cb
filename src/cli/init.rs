use anyhow::Result;
use std::fs;

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::projects::{ProjectRepository, SqliteProjectRepository};

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing db...");
    let db = async_db(&config.db_path).await?;
    // Listing seeds the default projects into an empty registry
    let projects = SqliteProjectRepository::new(&db).list().await?;
    println!("Finished initializing db with {} projects", projects.len());

    fs::create_dir_all(&config.downloads_path)?;
    println!(
        "Place project archives in {} to serve them",
        config.downloads_path
    );

    Ok(())
}
