//! Post likes. One reaction per (user, post).

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ReactionStore {
    pool: SqlitePool,
}

impl ReactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Like the post if not yet liked, otherwise remove the like.
    /// Returns whether the post is liked afterwards.
    pub async fn toggle(&self, user_id: i64, post_id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM post_reactions WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query("INSERT INTO post_reactions (user_id, post_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(!removed)
    }

    pub async fn count(&self, post_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM post_reactions WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM post_reactions WHERE user_id = ? AND post_id = ?",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }
}
