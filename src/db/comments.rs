//! Comment storage. New comments wait for moderation before they are listed.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub is_approved: bool,
    pub created_at: String,
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an unapproved comment. Returns the comment ID.
    pub async fn create(&self, user_id: i64, post_id: i64, content: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO comments (user_id, post_id, content) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(post_id)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Approved comments on a post, oldest first.
    pub async fn list_approved(&self, post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.is_approved, c.created_at
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.post_id = ? AND c.is_approved = 1
             ORDER BY c.created_at, c.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Comments awaiting moderation, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.is_approved, c.created_at
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.is_approved = 0
             ORDER BY c.created_at, c.id",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Everything a user has written, approved or not, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.is_approved, c.created_at
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.user_id = ?
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn approve(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET is_approved = 1, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
