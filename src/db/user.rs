use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::from_unix;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub interests: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create an account. The password must already be hashed.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    email: String,
    first_name: String,
    last_name: String,
    interests: String,
    created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let interests = serde_json::from_str(&row.interests).unwrap_or_else(|e| {
            tracing::warn!(username = %row.username, error = %e, "Corrupt interests column");
            Vec::new()
        });

        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            interests,
            created_at: from_unix(row.created_at),
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, password_hash, email, first_name, last_name, interests, created_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Fails with a unique violation if the username or
    /// email is taken.
    pub async fn create(&self, new_user: &NewUser<'_>) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, email, first_name, last_name, interests, created_at) VALUES (?, ?, ?, ?, ?, ?, '[]', ?)",
        )
        .bind(&id)
        .bind(new_user.username)
        .bind(new_user.password_hash)
        .bind(new_user.email)
        .bind(new_user.first_name)
        .bind(new_user.last_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            username: new_user.username.to_string(),
            password_hash: new_user.password_hash.to_string(),
            email: new_user.email.to_string(),
            first_name: new_user.first_name.to_string(),
            last_name: new_user.last_name.to_string(),
            interests: Vec::new(),
            created_at: from_unix(now),
        })
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Check whether a username exists.
    pub async fn exists(&self, username: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Replace a user's interests. Returns the updated user, or None if the
    /// user does not exist.
    pub async fn update_interests(
        &self,
        username: &str,
        interests: &[String],
    ) -> Result<Option<User>, sqlx::Error> {
        let encoded = serde_json::to_string(interests).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query("UPDATE users SET interests = ? WHERE username = ?")
            .bind(&encoded)
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_username(username).await
    }

    /// Delete a user together with their sessions, posts, the comments on
    /// those posts, and the comments they wrote elsewhere.
    pub async fn delete_account(&self, username: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM comments WHERE username = ? OR post_id IN (SELECT id FROM posts WHERE username = ?)",
        )
        .bind(username)
        .bind(username)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM posts WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
