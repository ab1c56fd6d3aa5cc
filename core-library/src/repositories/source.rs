//! Source repository trait and implementation

use super::{invalid_column, validation_error};
use crate::error::{LibraryError, Result};
use crate::models::{Source, SourceId, SourceKind};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

/// Source repository interface
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Find a source by its ID
    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>>;

    /// Insert a new source
    ///
    /// # Errors
    /// Returns error if validation fails or the ID already exists
    async fn insert(&self, source: &Source) -> Result<()>;

    /// Update name and settings of an existing source
    async fn update(&self, source: &Source) -> Result<()>;

    /// All sources ordered by name
    async fn list(&self) -> Result<Vec<Source>>;

    /// Delete a source with its folders and files
    ///
    /// # Returns
    /// - `Ok(true)` if the source was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, id: SourceId) -> Result<bool>;
}

/// SQLite implementation of SourceRepository
pub struct SqliteSourceRepository {
    pool: SqlitePool,
}

impl SqliteSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SourceRow {
    id: String,
    name: String,
    kind: String,
    settings: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SourceRow> for Source {
    type Error = LibraryError;

    fn try_from(row: SourceRow) -> Result<Self> {
        Ok(Source {
            id: SourceId::from_string(&row.id).map_err(|e| invalid_column("id", e))?,
            name: row.name,
            kind: row
                .kind
                .parse::<SourceKind>()
                .map_err(|e| invalid_column("kind", e))?,
            settings: serde_json::from_str(&row.settings)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SourceRepository for SqliteSourceRepository {
    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT id, name, kind, settings, created_at, updated_at FROM sources WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Source::try_from).transpose()
    }

    async fn insert(&self, source: &Source) -> Result<()> {
        source
            .validate()
            .map_err(|msg| validation_error("Source", msg))?;

        sqlx::query(
            r#"
            INSERT INTO sources (id, name, kind, settings, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source.id.to_string())
        .bind(&source.name)
        .bind(source.kind.as_str())
        .bind(serde_json::to_string(&source.settings)?)
        .bind(source.created_at)
        .bind(source.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, source: &Source) -> Result<()> {
        source
            .validate()
            .map_err(|msg| validation_error("Source", msg))?;

        let result = sqlx::query(
            "UPDATE sources SET name = ?, settings = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&source.name)
        .bind(serde_json::to_string(&source.settings)?)
        .bind(chrono::Utc::now().timestamp())
        .bind(source.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Source".to_string(),
                id: source.id.to_string(),
            });
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT id, name, kind, settings, created_at, updated_at FROM sources ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Source::try_from).collect()
    }

    async fn delete(&self, id: SourceId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
