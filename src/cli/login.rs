use anyhow::Result;
use rustyline::DefaultEditor;

use crate::auth::{StaticCredentials, check_session, login as auth_login, logout as auth_logout};
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::session::SqliteSessionRepository;

pub async fn login(config: &AppConfig, username: &str, access_key: Option<String>) -> Result<()> {
    let access_key = match access_key {
        Some(key) => key,
        None => DefaultEditor::new()?.readline("Access key: ")?,
    };
    let db = async_db(&config.db_path).await?;
    let sessions = SqliteSessionRepository::new(&db);

    let resp = auth_login(&StaticCredentials, &sessions, username, &access_key).await?;
    println!("Logged in as {} ({:?})", resp.user.name, resp.user.role);
    Ok(())
}

pub async fn logout(config: &AppConfig) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    auth_logout(&SqliteSessionRepository::new(&db)).await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(config: &AppConfig) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    match check_session(&SqliteSessionRepository::new(&db)).await {
        Some(user) => println!("{} ({}, {:?})", user.name, user.username, user.role),
        None => println!("Not logged in"),
    }
    Ok(())
}
