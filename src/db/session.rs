//! Refresh token sessions.
//!
//! Every issued refresh token has exactly one session row, keyed by the
//! token payload's id. Access tokens are never stored.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::from_unix;

/// A stored refresh token session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub refresh_token: String,
    pub user_agent: String,
    pub client_ip: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has reached its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub struct NewSession<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub refresh_token: &'a str,
    pub user_agent: &'a str,
    pub client_ip: &'a str,
    pub expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    username: String,
    refresh_token: String,
    user_agent: String,
    client_ip: String,
    is_blocked: bool,
    expires_at: i64,
    created_at: i64,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            refresh_token: row.refresh_token,
            user_agent: row.user_agent,
            client_ip: row.client_ip,
            is_blocked: row.is_blocked,
            expires_at: from_unix(row.expires_at),
            created_at: from_unix(row.created_at),
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, username, refresh_token, user_agent, client_ip, is_blocked, expires_at, created_at";

/// Store for refresh token sessions.
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new session.
    pub async fn create(&self, new_session: &NewSession<'_>) -> Result<Session, sqlx::Error> {
        let id = new_session.id.to_string();
        let now = Utc::now().timestamp();
        let expires_at = new_session.expires_at.timestamp();

        sqlx::query(
            "INSERT INTO sessions (id, username, refresh_token, user_agent, client_ip, is_blocked, expires_at, created_at) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(new_session.username)
        .bind(new_session.refresh_token)
        .bind(new_session.user_agent)
        .bind(new_session.client_ip)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Session {
            id,
            username: new_session.username.to_string(),
            refresh_token: new_session.refresh_token.to_string(),
            user_agent: new_session.user_agent.to_string(),
            client_ip: new_session.client_ip.to_string(),
            is_blocked: false,
            expires_at: from_unix(expires_at),
            created_at: from_unix(now),
        })
    }

    /// Get a session by its ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Session>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Session::from))
    }

    /// Block a session so its refresh token can no longer be exchanged.
    pub async fn block(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET is_blocked = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a session by its ID (logout or revoke).
    pub async fn delete_by_id(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// List a user's unexpired sessions, newest first.
    pub async fn list_by_username(&self, username: &str) -> Result<Vec<Session>, sqlx::Error> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sessions WHERE username = ? AND expires_at > ? ORDER BY created_at DESC, rowid DESC",
            SESSION_COLUMNS
        ))
        .bind(username)
        .bind(Utc::now().timestamp())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewUser};
    use chrono::Duration;

    async fn setup() -> Database {
        let db = Database::open(":memory:").await.unwrap();
        db.users()
            .create(&NewUser {
                username: "alice",
                password_hash: "hash",
                email: "alice@example.com",
                first_name: "Alice",
                last_name: "Liddell",
            })
            .await
            .unwrap();
        db
    }

    fn new_session(expires_in: Duration) -> NewSession<'static> {
        NewSession {
            id: Uuid::new_v4(),
            username: "alice",
            refresh_token: "v2.local.token",
            user_agent: "test-agent",
            client_ip: "127.0.0.1",
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let db = setup().await;
        let new = new_session(Duration::hours(1));

        let created = db.sessions().create(&new).await.unwrap();
        assert_eq!(created.id, new.id.to_string());

        let session = db.sessions().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.refresh_token, "v2.local.token");
        assert_eq!(session.user_agent, "test-agent");
        assert_eq!(session.client_ip, "127.0.0.1");
        assert!(!session.is_blocked);
        assert!(!session.is_expired_at(Utc::now()));

        assert!(db.sessions().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_block_session() {
        let db = setup().await;
        let created = db.sessions().create(&new_session(Duration::hours(1))).await.unwrap();

        assert!(db.sessions().block(&created.id).await.unwrap());
        let session = db.sessions().get_by_id(&created.id).await.unwrap().unwrap();
        assert!(session.is_blocked);

        assert!(!db.sessions().block("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let db = setup().await;
        let created = db.sessions().create(&new_session(Duration::hours(1))).await.unwrap();

        assert!(db.sessions().delete_by_id(&created.id).await.unwrap());
        assert!(!db.sessions().delete_by_id(&created.id).await.unwrap());
        assert!(db.sessions().get_by_id(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions() {
        let db = setup().await;
        let live = db.sessions().create(&new_session(Duration::hours(1))).await.unwrap();
        let stale = db
            .sessions()
            .create(&new_session(-Duration::hours(1)))
            .await
            .unwrap();
        assert!(stale.is_expired_at(Utc::now()));

        let listed = db.sessions().list_by_username("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);

        assert_eq!(db.sessions().delete_expired().await.unwrap(), 1);
        assert!(db.sessions().get_by_id(&stale.id).await.unwrap().is_none());
        assert!(db.sessions().get_by_id(&live.id).await.unwrap().is_some());
    }
}
