//! Persists the logged in user between runs.
use anyhow::{Error, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

use crate::auth::User;

const TOKEN_KEY: &str = "codevault_session_token";
const USER_KEY: &str = "codevault_user_data";

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn save(&self, user: &User, token: &str) -> Result<(), Error>;

    /// The saved user, or `None` when there is no session. Missing or
    /// malformed data is treated as no session.
    async fn load(&self) -> Option<User>;

    async fn clear(&self) -> Result<(), Error>;
}

fn decode_user(token: Option<String>, user: Option<String>) -> Option<User> {
    let (_token, user) = (token?, user?);
    serde_json::from_str(&user)
        .inspect_err(|e| tracing::warn!("Ignoring malformed session data: {}", e))
        .ok()
}

/// Session stored in the `kv` table.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    db: Connection,
}

impl SqliteSessionRepository {
    pub fn new(db: &Connection) -> Self {
        Self { db: db.clone() }
    }

    async fn get(&self, key: &'static str) -> Result<Option<String>, Error> {
        let value = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?")?;
                let mut rows = stmt.query([key])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get(0)?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn save(&self, user: &User, token: &str) -> Result<(), Error> {
        let token = token.to_string();
        let data = serde_json::to_string(user)?;
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
                    [TOKEN_KEY, token.as_str()],
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
                    [USER_KEY, data.as_str()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn load(&self) -> Option<User> {
        let read = async {
            let token = self.get(TOKEN_KEY).await?;
            let user = self.get(USER_KEY).await?;
            Ok::<_, Error>((token, user))
        };
        match read.await {
            Ok((token, user)) => decode_user(token, user),
            Err(e) => {
                tracing::warn!("Failed to read session: {}", e);
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), Error> {
        self.db
            .call(|conn| {
                conn.execute(
                    "DELETE FROM kv WHERE key IN (?, ?)",
                    [TOKEN_KEY, USER_KEY],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Session held in memory, mostly for tests.
#[derive(Default)]
pub struct MemorySessionRepository {
    entries: Mutex<(Option<String>, Option<String>)>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the raw stored values, the same way a hand edited
    /// store would look.
    pub async fn set_raw(&self, token: Option<&str>, user: Option<&str>) {
        *self.entries.lock().await = (token.map(String::from), user.map(String::from));
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn save(&self, user: &User, token: &str) -> Result<(), Error> {
        let data = serde_json::to_string(user)?;
        *self.entries.lock().await = (Some(token.to_string()), Some(data));
        Ok(())
    }

    async fn load(&self) -> Option<User> {
        let (token, user) = self.entries.lock().await.clone();
        decode_user(token, user)
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.entries.lock().await = (None, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;
    use crate::core::db::memory_db;

    fn user() -> User {
        User {
            id: "s1".to_string(),
            username: "student_01".to_string(),
            name: "Ahmad Student".to_string(),
            role: UserRole::Student,
        }
    }

    #[tokio::test]
    async fn test_sqlite_save_load_clear() {
        let db = memory_db().await.unwrap();
        let sessions = SqliteSessionRepository::new(&db);

        assert_eq!(sessions.load().await, None);
        sessions.save(&user(), "token-1").await.unwrap();
        assert_eq!(sessions.load().await, Some(user()));
        sessions.clear().await.unwrap();
        assert_eq!(sessions.load().await, None);
    }

    #[tokio::test]
    async fn test_sqlite_malformed_user_is_no_session() {
        let db = memory_db().await.unwrap();
        let sessions = SqliteSessionRepository::new(&db);
        sessions.save(&user(), "token-1").await.unwrap();

        db.call(|conn| {
            conn.execute(
                "UPDATE kv SET value = '{not json' WHERE key = ?",
                [USER_KEY],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(sessions.load().await, None);
    }

    #[tokio::test]
    async fn test_memory_requires_token_and_user() {
        let sessions = MemorySessionRepository::new();
        let data = serde_json::to_string(&user()).unwrap();

        sessions.set_raw(None, Some(&data)).await;
        assert_eq!(sessions.load().await, None);

        sessions.set_raw(Some("token"), Some("[]")).await;
        assert_eq!(sessions.load().await, None);

        sessions.set_raw(Some("token"), Some(&data)).await;
        assert_eq!(sessions.load().await, Some(user()));
    }
}
