//! Login against a fixed credential table. The table sits behind
//! `AuthProvider` so a real credential backend can replace it without
//! touching the session store.
use anyhow::Error;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use uuid::Uuid;

use crate::session::SessionRepository;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Admin,
}

/// Public profile of a user. Never carries the access key.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: UserRole,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(ThisError, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] Error),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the public profile when the pair matches a known user.
    async fn verify(&self, username: &str, access_key: &str) -> Option<User>;
}

struct Credential {
    id: &'static str,
    username: &'static str,
    name: &'static str,
    role: UserRole,
    access_key: &'static str,
}

const USERS: &[Credential] = &[
    Credential {
        id: "s1",
        username: "student_01",
        name: "Ahmad Student",
        role: UserRole::Student,
        access_key: "learn2code",
    },
    Credential {
        id: "s2",
        username: "student_02",
        name: "Budi React",
        role: UserRole::Student,
        access_key: "react_rocks",
    },
    Credential {
        id: "admin1",
        username: "admin",
        name: "System Administrator",
        role: UserRole::Admin,
        access_key: "admin123",
    },
    Credential {
        id: "g1",
        username: "demo",
        name: "Guest User",
        role: UserRole::Student,
        access_key: "123456",
    },
];

/// The built in demo accounts.
#[derive(Default, Clone, Copy)]
pub struct StaticCredentials;

#[async_trait]
impl AuthProvider for StaticCredentials {
    async fn verify(&self, username: &str, access_key: &str) -> Option<User> {
        USERS
            .iter()
            .find(|c| c.username == username && c.access_key == access_key)
            .map(|c| User {
                id: c.id.to_string(),
                username: c.username.to_string(),
                name: c.name.to_string(),
                role: c.role,
            })
    }
}

fn new_token() -> String {
    format!(
        "cv-token-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Verifies the credentials and saves the session on success.
pub async fn login(
    provider: &dyn AuthProvider,
    sessions: &dyn SessionRepository,
    username: &str,
    access_key: &str,
) -> Result<AuthResponse, AuthError> {
    let user = provider
        .verify(username.trim(), access_key)
        .await
        .ok_or(AuthError::InvalidCredentials)?;
    let token = new_token();
    sessions.save(&user, &token).await?;
    tracing::info!("User {} logged in", user.username);
    Ok(AuthResponse { user, token })
}

pub async fn check_session(sessions: &dyn SessionRepository) -> Option<User> {
    sessions.load().await
}

pub async fn logout(sessions: &dyn SessionRepository) -> Result<(), Error> {
    sessions.clear().await
}
