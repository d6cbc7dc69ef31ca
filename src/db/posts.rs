//! Post storage.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::from_unix;

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

/// Publication state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            _ => Err(format!("Unknown post status: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub username: String,
    pub title: String,
    pub body: String,
    pub status: PostStatus,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

pub struct NewPost<'a> {
    pub username: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub status: PostStatus,
    pub category: &'a str,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: String,
    username: String,
    title: String,
    body: String,
    status: String,
    category: String,
    created_at: i64,
    published_at: Option<i64>,
    last_modified: Option<i64>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e| {
            tracing::warn!(post_id = %row.id, error = %e, "Treating post as draft");
            PostStatus::Draft
        });

        Self {
            id: row.id,
            username: row.username,
            title: row.title,
            body: row.body,
            status,
            category: row.category,
            created_at: from_unix(row.created_at),
            published_at: row.published_at.map(from_unix),
            last_modified: row.last_modified.map(from_unix),
        }
    }
}

const POST_COLUMNS: &str =
    "id, username, title, body, status, category, created_at, published_at, last_modified";

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new post. Posts created as published get `published_at` set
    /// to the creation time.
    pub async fn create(&self, new_post: &NewPost<'_>) -> Result<Post, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let published_at = (new_post.status == PostStatus::Published).then_some(now);

        sqlx::query(
            "INSERT INTO posts (id, username, title, body, status, category, created_at, published_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(new_post.username)
        .bind(new_post.title)
        .bind(new_post.body)
        .bind(new_post.status.as_str())
        .bind(new_post.category)
        .bind(now)
        .bind(published_at)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id,
            username: new_post.username.to_string(),
            title: new_post.title.to_string(),
            body: new_post.body.to_string(),
            status: new_post.status,
            category: new_post.category.to_string(),
            created_at: from_unix(now),
            published_at: published_at.map(from_unix),
            last_modified: None,
        })
    }

    /// Get a post by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Post>, sqlx::Error> {
        let row: Option<PostRow> =
            sqlx::query_as(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Post::from))
    }

    /// List published posts by a user, newest first.
    pub async fn list_published_by_username(
        &self,
        username: &str,
    ) -> Result<Vec<Post>, sqlx::Error> {
        self.list_where("username = ? AND status = 'published'", username, "published_at")
            .await
    }

    /// List a user's drafts, newest first.
    pub async fn list_drafts_by_username(&self, username: &str) -> Result<Vec<Post>, sqlx::Error> {
        self.list_where("username = ? AND status = 'draft'", username, "created_at")
            .await
    }

    /// List published posts in a category, newest first.
    pub async fn list_published_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Post>, sqlx::Error> {
        self.list_where("category = ? AND status = 'published'", category, "published_at")
            .await
    }

    async fn list_where(
        &self,
        condition: &str,
        value: &str,
        order_by: &str,
    ) -> Result<Vec<Post>, sqlx::Error> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {} FROM posts WHERE {} ORDER BY {} DESC, rowid DESC",
            POST_COLUMNS, condition, order_by
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Replace a post's body. Returns the updated post, or None if not found.
    pub async fn update_body(&self, id: &str, body: &str) -> Result<Option<Post>, sqlx::Error> {
        let result = sqlx::query("UPDATE posts SET body = ?, last_modified = ? WHERE id = ?")
            .bind(body)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Mark a post as published. An already published post keeps its
    /// original `published_at`.
    pub async fn publish(&self, id: &str) -> Result<Option<Post>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET status = 'published', published_at = COALESCE(published_at, ?) WHERE id = ?",
        )
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a post and all of its comments.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
