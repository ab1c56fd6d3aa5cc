//! Image transform index repository

use super::invalid_column;
use crate::error::{LibraryError, Result};
use crate::models::{AssetId, TransformIndex};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

#[async_trait]
pub trait TransformIndexRepository: Send + Sync {
    /// Transform indexes recorded for a file, ordered by ID
    async fn list_for_asset(&self, asset_id: AssetId) -> Result<Vec<TransformIndex>>;

    /// Insert (id 0) or update a transform index, returning its ID
    async fn save(&self, index: &TransformIndex) -> Result<i64>;

    /// Delete every transform index of a file
    async fn delete_for_asset(&self, asset_id: AssetId) -> Result<u64>;
}

pub struct SqliteTransformIndexRepository {
    pool: SqlitePool,
}

impl SqliteTransformIndexRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TransformIndexRow {
    id: i64,
    asset_id: String,
    filename: Option<String>,
    format: Option<String>,
    location: String,
    file_exists: bool,
    in_progress: bool,
    date_indexed: i64,
}

impl TryFrom<TransformIndexRow> for TransformIndex {
    type Error = LibraryError;

    fn try_from(row: TransformIndexRow) -> Result<Self> {
        Ok(TransformIndex {
            id: row.id,
            asset_id: AssetId::from_string(&row.asset_id)
                .map_err(|e| invalid_column("asset_id", e))?,
            filename: row.filename,
            format: row.format,
            location: row.location,
            file_exists: row.file_exists,
            in_progress: row.in_progress,
            date_indexed: row.date_indexed,
        })
    }
}

#[async_trait]
impl TransformIndexRepository for SqliteTransformIndexRepository {
    async fn list_for_asset(&self, asset_id: AssetId) -> Result<Vec<TransformIndex>> {
        let rows = sqlx::query_as::<_, TransformIndexRow>(
            r#"
            SELECT id, asset_id, filename, format, location, file_exists, in_progress,
                   date_indexed
            FROM transform_indexes
            WHERE asset_id = ?
            ORDER BY id
            "#,
        )
        .bind(asset_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransformIndex::try_from).collect()
    }

    async fn save(&self, index: &TransformIndex) -> Result<i64> {
        if index.id == 0 {
            let result = sqlx::query(
                r#"
                INSERT INTO transform_indexes (
                    asset_id, filename, format, location, file_exists, in_progress, date_indexed
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(index.asset_id.to_string())
            .bind(&index.filename)
            .bind(&index.format)
            .bind(&index.location)
            .bind(index.file_exists)
            .bind(index.in_progress)
            .bind(index.date_indexed)
            .execute(&self.pool)
            .await?;

            return Ok(result.last_insert_rowid());
        }

        let result = sqlx::query(
            r#"
            UPDATE transform_indexes SET
                asset_id = ?, filename = ?, format = ?, location = ?,
                file_exists = ?, in_progress = ?, date_indexed = ?
            WHERE id = ?
            "#,
        )
        .bind(index.asset_id.to_string())
        .bind(&index.filename)
        .bind(&index.format)
        .bind(&index.location)
        .bind(index.file_exists)
        .bind(index.in_progress)
        .bind(index.date_indexed)
        .bind(index.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "TransformIndex".to_string(),
                id: index.id.to_string(),
            });
        }

        Ok(index.id)
    }

    async fn delete_for_asset(&self, asset_id: AssetId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM transform_indexes WHERE asset_id = ?")
            .bind(asset_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Asset, Folder, Source, SourceKind};
    use crate::repositories::{
        AssetRepository, FolderRepository, SourceRepository, SqliteAssetRepository,
        SqliteFolderRepository, SqliteSourceRepository,
    };

    async fn setup() -> (SqliteTransformIndexRepository, Asset) {
        let pool = create_test_pool().await.unwrap();
        let source = Source::new("Media", SourceKind::S3, serde_json::json!({}));
        SqliteSourceRepository::new(pool.clone())
            .insert(&source)
            .await
            .unwrap();
        let root = Folder::new(source.id, None, "Media", "");
        SqliteFolderRepository::new(pool.clone())
            .insert(&root)
            .await
            .unwrap();
        let asset = Asset::new(source.id, root.id, "cat.jpg");
        SqliteAssetRepository::new(pool.clone())
            .save(&asset)
            .await
            .unwrap();

        (SqliteTransformIndexRepository::new(pool), asset)
    }

    #[tokio::test]
    async fn test_insert_then_update() {
        let (repo, asset) = setup().await;

        let mut index = TransformIndex::new(asset.id, "_thumb");
        index.id = repo.save(&index).await.unwrap();
        assert!(index.id > 0);

        index.file_exists = true;
        index.filename = Some("dog.jpg".to_string());
        assert_eq!(repo.save(&index).await.unwrap(), index.id);

        let stored = repo.list_for_asset(asset.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].file_exists);
        assert_eq!(stored[0].filename.as_deref(), Some("dog.jpg"));
    }

    #[tokio::test]
    async fn test_update_unknown_index() {
        let (repo, asset) = setup().await;

        let mut index = TransformIndex::new(asset.id, "_thumb");
        index.id = 42;
        assert!(matches!(
            repo.save(&index).await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_for_asset() {
        let (repo, asset) = setup().await;

        repo.save(&TransformIndex::new(asset.id, "_thumb"))
            .await
            .unwrap();
        repo.save(&TransformIndex::new(asset.id, "_large"))
            .await
            .unwrap();

        assert_eq!(repo.delete_for_asset(asset.id).await.unwrap(), 2);
        assert!(repo.list_for_asset(asset.id).await.unwrap().is_empty());
    }
}
