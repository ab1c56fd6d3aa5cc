//! Asset (file record) repository trait and implementation

use super::{invalid_column, validation_error};
use crate::error::{LibraryError, Result};
use crate::models::{Asset, AssetId, AssetKind, FolderId, SourceId};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

/// File record repository interface
#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn find_by_id(&self, id: AssetId) -> Result<Option<Asset>>;

    /// Find the record for `filename` inside a folder
    async fn find_in_folder(&self, folder_id: FolderId, filename: &str) -> Result<Option<Asset>>;

    /// Insert or update a record, keyed by ID
    ///
    /// # Errors
    /// Returns error if validation fails or another record already uses the
    /// same folder and filename
    async fn save(&self, asset: &Asset) -> Result<()>;

    /// Records of one folder ordered by filename
    async fn list_in_folder(&self, folder_id: FolderId) -> Result<Vec<Asset>>;

    /// Number of records of a source
    async fn count_by_source(&self, source_id: SourceId) -> Result<i64>;

    /// Delete a record by ID
    ///
    /// # Returns
    /// - `Ok(true)` if the record was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, id: AssetId) -> Result<bool>;
}

/// SQLite implementation of AssetRepository
pub struct SqliteAssetRepository {
    pool: SqlitePool,
}

impl SqliteAssetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssetRow {
    id: String,
    source_id: String,
    folder_id: String,
    filename: String,
    kind: String,
    size: i64,
    width: Option<i64>,
    height: Option<i64>,
    date_modified: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<AssetRow> for Asset {
    type Error = LibraryError;

    fn try_from(row: AssetRow) -> Result<Self> {
        Ok(Asset {
            id: AssetId::from_string(&row.id).map_err(|e| invalid_column("id", e))?,
            source_id: SourceId::from_string(&row.source_id)
                .map_err(|e| invalid_column("source_id", e))?,
            folder_id: FolderId::from_string(&row.folder_id)
                .map_err(|e| invalid_column("folder_id", e))?,
            filename: row.filename,
            kind: row
                .kind
                .parse::<AssetKind>()
                .map_err(|e| invalid_column("kind", e))?,
            size: row.size.max(0) as u64,
            width: row.width.map(|w| w as u32),
            height: row.height.map(|h| h as u32),
            date_modified: row.date_modified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_ASSET: &str = r#"
    SELECT id, source_id, folder_id, filename, kind, size, width, height,
           date_modified, created_at, updated_at
    FROM assets
"#;

#[async_trait]
impl AssetRepository for SqliteAssetRepository {
    async fn find_by_id(&self, id: AssetId) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(&format!("{} WHERE id = ?", SELECT_ASSET))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::try_from).transpose()
    }

    async fn find_in_folder(&self, folder_id: FolderId, filename: &str) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "{} WHERE folder_id = ? AND filename = ?",
            SELECT_ASSET
        ))
        .bind(folder_id.to_string())
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Asset::try_from).transpose()
    }

    async fn save(&self, asset: &Asset) -> Result<()> {
        asset
            .validate()
            .map_err(|msg| validation_error("Asset", msg))?;

        sqlx::query(
            r#"
            INSERT INTO assets (
                id, source_id, folder_id, filename, kind, size, width, height,
                date_modified, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_id = excluded.source_id,
                folder_id = excluded.folder_id,
                filename = excluded.filename,
                kind = excluded.kind,
                size = excluded.size,
                width = excluded.width,
                height = excluded.height,
                date_modified = excluded.date_modified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(asset.id.to_string())
        .bind(asset.source_id.to_string())
        .bind(asset.folder_id.to_string())
        .bind(&asset.filename)
        .bind(asset.kind.as_str())
        .bind(asset.size as i64)
        .bind(asset.width.map(i64::from))
        .bind(asset.height.map(i64::from))
        .bind(asset.date_modified)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_in_folder(&self, folder_id: FolderId) -> Result<Vec<Asset>> {
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            "{} WHERE folder_id = ? ORDER BY filename",
            SELECT_ASSET
        ))
        .bind(folder_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Asset::try_from).collect()
    }

    async fn count_by_source(&self, source_id: SourceId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assets WHERE source_id = ?")
            .bind(source_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn delete(&self, id: AssetId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Folder, Source, SourceKind};
    use crate::repositories::{
        FolderRepository, SourceRepository, SqliteFolderRepository, SqliteSourceRepository,
    };

    async fn setup() -> (SqliteAssetRepository, Folder) {
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

        (SqliteAssetRepository::new(pool), root)
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let (repo, root) = setup().await;

        let mut asset = Asset::new(root.source_id, root.id, "cat.jpg");
        asset.size = 1024;
        asset.width = Some(640);
        asset.height = Some(480);
        asset.date_modified = Some(1_700_000_000);
        repo.save(&asset).await.unwrap();

        let found = repo.find_by_id(asset.id).await.unwrap().unwrap();
        assert_eq!(found.kind, AssetKind::Image);
        assert_eq!(found.size, 1024);
        assert_eq!(found.width, Some(640));
        assert_eq!(found.date_modified, Some(1_700_000_000));

        let in_folder = repo
            .find_in_folder(root.id, "cat.jpg")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(in_folder.id, asset.id);
    }

    #[tokio::test]
    async fn test_save_updates_existing_record() {
        let (repo, root) = setup().await;

        let mut asset = Asset::new(root.source_id, root.id, "notes.txt");
        repo.save(&asset).await.unwrap();

        asset.size = 99;
        asset.filename = "renamed.txt".to_string();
        repo.save(&asset).await.unwrap();

        assert_eq!(repo.count_by_source(root.source_id).await.unwrap(), 1);
        assert!(repo
            .find_in_folder(root.id, "notes.txt")
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.find_by_id(asset.id).await.unwrap().unwrap().size, 99);
    }

    #[tokio::test]
    async fn test_duplicate_filename_in_folder_rejected() {
        let (repo, root) = setup().await;

        repo.save(&Asset::new(root.source_id, root.id, "a.png"))
            .await
            .unwrap();
        assert!(repo
            .save(&Asset::new(root.source_id, root.id, "a.png"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (repo, root) = setup().await;

        let b = Asset::new(root.source_id, root.id, "b.pdf");
        let a = Asset::new(root.source_id, root.id, "a.pdf");
        repo.save(&b).await.unwrap();
        repo.save(&a).await.unwrap();

        let names: Vec<_> = repo
            .list_in_folder(root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|asset| asset.filename)
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());
    }
}
