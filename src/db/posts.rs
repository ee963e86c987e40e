//! Post storage, including view tracking.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

/// A full post with all content.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub category_id: i64,
    pub category_name: String,
    pub title: String,
    pub content: String,
    pub view_count: i64,
    pub is_draft: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A post row for listings. `content` is the raw body; callers shorten it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub author_username: String,
    pub category_id: i64,
    pub category_name: String,
    pub title: String,
    pub content: String,
    pub view_count: i64,
    pub is_draft: bool,
    pub like_count: i64,
    pub created_at: String,
}

/// Fields needed to create or replace a post.
pub struct NewPost<'a> {
    pub author_id: i64,
    pub category_id: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub is_draft: bool,
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new post. Returns the post ID.
    pub async fn create(&self, post: &NewPost<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO posts (author_id, category_id, title, content, is_draft) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(post.author_id)
        .bind(post.category_id)
        .bind(post.title)
        .bind(post.content)
        .bind(post.is_draft)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as(
            "SELECT p.id, p.author_id, u.username AS author_username, p.category_id, c.name AS category_name,
                    p.title, p.content, p.view_count, p.is_draft, p.created_at, p.updated_at
             FROM posts p
             JOIN users u ON u.id = p.author_id
             JOIN categories c ON c.id = p.category_id
             WHERE p.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List posts, newest first. Drafts are included only when asked for.
    pub async fn list(&self, include_drafts: bool) -> Result<Vec<PostSummary>, sqlx::Error> {
        sqlx::query_as(
            "SELECT p.id, u.username AS author_username, p.category_id, c.name AS category_name,
                    p.title, p.content, p.view_count, p.is_draft,
                    (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id) AS like_count,
                    p.created_at
             FROM posts p
             JOIN users u ON u.id = p.author_id
             JOIN categories c ON c.id = p.category_id
             WHERE ? OR p.is_draft = 0
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .bind(include_drafts)
        .fetch_all(&self.pool)
        .await
    }

    /// Published posts the user has liked, most recently liked first.
    pub async fn list_liked_by(&self, user_id: i64) -> Result<Vec<PostSummary>, sqlx::Error> {
        sqlx::query_as(
            "SELECT p.id, u.username AS author_username, p.category_id, c.name AS category_name,
                    p.title, p.content, p.view_count, p.is_draft,
                    (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id) AS like_count,
                    p.created_at
             FROM post_reactions mine
             JOIN posts p ON p.id = mine.post_id
             JOIN users u ON u.id = p.author_id
             JOIN categories c ON c.id = p.category_id
             WHERE mine.user_id = ? AND p.is_draft = 0
             ORDER BY mine.created_at DESC, mine.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Replace the editable fields of a post. Author is left untouched.
    /// Returns true if the post was updated.
    pub async fn update(&self, id: i64, post: &NewPost<'_>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET category_id = ?, title = ?, content = ?, is_draft = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(post.category_id)
        .bind(post.title)
        .bind(post.content)
        .bind(post.is_draft)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Publish (`is_draft = false`) or unpublish (`is_draft = true`) a post.
    pub async fn set_draft(&self, id: i64, is_draft: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET is_draft = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(is_draft)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a view and bump the post's view counter atomically.
    pub async fn record_view(
        &self,
        post_id: i64,
        user_id: Option<i64>,
        ip_address: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO post_views (user_id, post_id, ip_address) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(post_id)
            .bind(ip_address)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
