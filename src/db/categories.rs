use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CategoryStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl CategoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a category. Fails if the name is already used.
    pub async fn create(&self, name: &str, description: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, description FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, description FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, description FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }
}
