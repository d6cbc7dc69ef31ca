//! Comment storage.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::from_unix;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    post_id: String,
    username: String,
    body: String,
    created_at: i64,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            username: row.username,
            body: row.body,
            created_at: from_unix(row.created_at),
        }
    }
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a comment to a post.
    pub async fn create(
        &self,
        post_id: &str,
        username: &str,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO comments (id, post_id, username, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(post_id)
        .bind(username)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id,
            post_id: post_id.to_string(),
            username: username.to_string(),
            body: body.to_string(),
            created_at: from_unix(now),
        })
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Comment>, sqlx::Error> {
        let row: Option<CommentRow> = sqlx::query_as(
            "SELECT id, post_id, username, body, created_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Comment::from))
    }

    /// List a post's comments, oldest first.
    pub async fn list_by_post(&self, post_id: &str) -> Result<Vec<Comment>, sqlx::Error> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            "SELECT id, post_id, username, body, created_at FROM comments WHERE post_id = ? ORDER BY created_at, rowid",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
