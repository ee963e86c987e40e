mod categories;
mod comments;
mod posts;
mod reactions;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use categories::{Category, CategoryStore};
pub use comments::{Comment, CommentStore};
pub use posts::{NewPost, Post, PostStore, PostSummary};
pub use reactions::ReactionStore;
pub use user::{NewUser, User, UserRole, UserStore, UserSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let pool = if path == ":memory:" {
            // Every in-memory connection is its own database, so pin exactly one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&format!("sqlite:{}?mode=rwc", path))
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    first_name TEXT NOT NULL DEFAULT '',
                    last_name TEXT NOT NULL DEFAULT '',
                    bio TEXT,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE TABLE categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT UNIQUE NOT NULL,
                    description TEXT NOT NULL DEFAULT ''
                )",
                "CREATE TABLE posts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    view_count INTEGER NOT NULL DEFAULT 0,
                    is_draft INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_posts_author_id ON posts(author_id)",
                "CREATE INDEX idx_posts_category_id ON posts(category_id)",
                "CREATE TABLE post_reactions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (user_id, post_id)
                )",
                "CREATE INDEX idx_post_reactions_post_id ON post_reactions(post_id)",
                "CREATE TABLE comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    is_approved INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_comments_post_id ON comments(post_id)",
                "CREATE INDEX idx_comments_is_approved ON comments(is_approved)",
                "CREATE TABLE post_views (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    ip_address TEXT,
                    viewed_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_post_views_post_id ON post_views(post_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the category store.
    pub fn categories(&self) -> CategoryStore {
        CategoryStore::new(self.pool.clone())
    }

    /// Get the posts store.
    pub fn posts(&self) -> PostStore {
        PostStore::new(self.pool.clone())
    }

    /// Get the reaction (like) store.
    pub fn reactions(&self) -> ReactionStore {
        ReactionStore::new(self.pool.clone())
    }

    /// Get the comment store.
    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(email: &'a str, username: &'a str) -> NewUser<'a> {
        NewUser {
            email,
            username,
            first_name: "Ada",
            last_name: "Lovelace",
            password_hash: "not-a-real-hash",
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create(&new_user("ada@example.com", "ada_l"))
            .await
            .unwrap();

        let user = db
            .users()
            .get_by_email("ADA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "ada_l");
        assert!(user.is_active);
        assert_eq!(user.role, UserRole::User);

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create(&new_user("ada@example.com", "ada_l"))
            .await
            .unwrap();
        let result = db
            .users()
            .create(&new_user("ada@example.com", "ada_two"))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_toggle_active() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create(&new_user("ada@example.com", "ada_l"))
            .await
            .unwrap();

        assert_eq!(db.users().toggle_active(id).await.unwrap(), Some(false));
        assert!(!db.users().get_by_id(id).await.unwrap().unwrap().is_active);
        assert_eq!(db.users().toggle_active(id).await.unwrap(), Some(true));
        assert_eq!(db.users().toggle_active(9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_like_toggle_and_cascade() {
        let db = Database::open(":memory:").await.unwrap();

        let author = db
            .users()
            .create(&new_user("ada@example.com", "ada_l"))
            .await
            .unwrap();
        let category = db.categories().create("Rust", "Systems").await.unwrap();
        let post = db
            .posts()
            .create(&NewPost {
                author_id: author,
                category_id: category,
                title: "Hello",
                content: "<p>World</p>",
                is_draft: false,
            })
            .await
            .unwrap();

        assert!(db.reactions().toggle(author, post).await.unwrap());
        assert_eq!(db.reactions().count(post).await.unwrap(), 1);
        assert!(!db.reactions().toggle(author, post).await.unwrap());
        assert_eq!(db.reactions().count(post).await.unwrap(), 0);

        db.reactions().toggle(author, post).await.unwrap();
        db.posts().delete(post).await.unwrap();
        assert_eq!(db.reactions().count(post).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_view_increments_count() {
        let db = Database::open(":memory:").await.unwrap();

        let author = db
            .users()
            .create(&new_user("ada@example.com", "ada_l"))
            .await
            .unwrap();
        let category = db.categories().create("Rust", "").await.unwrap();
        let post = db
            .posts()
            .create(&NewPost {
                author_id: author,
                category_id: category,
                title: "Hello",
                content: "World",
                is_draft: true,
            })
            .await
            .unwrap();

        db.posts()
            .record_view(post, Some(author), Some("127.0.0.1"))
            .await
            .unwrap();
        db.posts().record_view(post, None, None).await.unwrap();

        let post = db.posts().get(post).await.unwrap().unwrap();
        assert_eq!(post.view_count, 2);
        assert!(post.is_draft);
    }

    #[tokio::test]
    async fn test_publish_and_unpublish_are_distinct() {
        let db = Database::open(":memory:").await.unwrap();

        let author = db
            .users()
            .create(&new_user("ada@example.com", "ada_l"))
            .await
            .unwrap();
        let category = db.categories().create("Rust", "").await.unwrap();
        let post = db
            .posts()
            .create(&NewPost {
                author_id: author,
                category_id: category,
                title: "Hello",
                content: "World",
                is_draft: true,
            })
            .await
            .unwrap();

        assert!(db.posts().set_draft(post, false).await.unwrap());
        assert!(!db.posts().get(post).await.unwrap().unwrap().is_draft);
        assert!(db.posts().set_draft(post, true).await.unwrap());
        assert!(db.posts().get(post).await.unwrap().unwrap().is_draft);
    }
}
