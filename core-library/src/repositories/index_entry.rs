//! Index session entry repository
//!
//! Phase 1 of an index session stores one entry per discovered object at a
//! dense offset; phase 2 reads them back one offset at a time and links each
//! to the file record it produced.

use super::invalid_column;
use crate::error::{LibraryError, Result};
use crate::models::{AssetId, IndexEntry, SourceId};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

#[async_trait]
pub trait IndexEntryRepository: Send + Sync {
    /// Store an entry, replacing any entry at the same session offset
    ///
    /// Returns the row id of the stored entry.
    async fn store(&self, entry: &IndexEntry) -> Result<i64>;

    /// Entry at `offset` of a session
    async fn get(
        &self,
        source_id: SourceId,
        session_id: &str,
        offset: u32,
    ) -> Result<Option<IndexEntry>>;

    /// Link an entry to the file record resolved for it
    async fn update_record_id(&self, entry_id: i64, record_id: AssetId) -> Result<()>;

    /// Number of entries stored for a session
    async fn count_session(&self, source_id: SourceId, session_id: &str) -> Result<i64>;

    /// Drop every entry of a session, returning how many were removed
    async fn delete_session(&self, source_id: SourceId, session_id: &str) -> Result<u64>;
}

pub struct SqliteIndexEntryRepository {
    pool: SqlitePool,
}

impl SqliteIndexEntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct IndexEntryRow {
    id: i64,
    source_id: String,
    session_id: String,
    entry_offset: i64,
    uri: String,
    size: i64,
    record_id: Option<String>,
}

impl TryFrom<IndexEntryRow> for IndexEntry {
    type Error = LibraryError;

    fn try_from(row: IndexEntryRow) -> Result<Self> {
        let record_id = row
            .record_id
            .as_deref()
            .map(AssetId::from_string)
            .transpose()
            .map_err(|e| invalid_column("record_id", e))?;

        Ok(IndexEntry {
            id: row.id,
            source_id: SourceId::from_string(&row.source_id)
                .map_err(|e| invalid_column("source_id", e))?,
            session_id: row.session_id,
            offset: u32::try_from(row.entry_offset)
                .map_err(|e| invalid_column("entry_offset", e))?,
            uri: row.uri,
            size: row.size.max(0) as u64,
            record_id,
        })
    }
}

#[async_trait]
impl IndexEntryRepository for SqliteIndexEntryRepository {
    async fn store(&self, entry: &IndexEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO index_entries (
                source_id, session_id, entry_offset, uri, size, record_id
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.source_id.to_string())
        .bind(&entry.session_id)
        .bind(i64::from(entry.offset))
        .bind(&entry.uri)
        .bind(entry.size as i64)
        .bind(entry.record_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get(
        &self,
        source_id: SourceId,
        session_id: &str,
        offset: u32,
    ) -> Result<Option<IndexEntry>> {
        let row = sqlx::query_as::<_, IndexEntryRow>(
            r#"
            SELECT id, source_id, session_id, entry_offset, uri, size, record_id
            FROM index_entries
            WHERE source_id = ? AND session_id = ? AND entry_offset = ?
            "#,
        )
        .bind(source_id.to_string())
        .bind(session_id)
        .bind(i64::from(offset))
        .fetch_optional(&self.pool)
        .await?;

        row.map(IndexEntry::try_from).transpose()
    }

    async fn update_record_id(&self, entry_id: i64, record_id: AssetId) -> Result<()> {
        let result = sqlx::query("UPDATE index_entries SET record_id = ? WHERE id = ?")
            .bind(record_id.to_string())
            .bind(entry_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "IndexEntry".to_string(),
                id: entry_id.to_string(),
            });
        }

        Ok(())
    }

    async fn count_session(&self, source_id: SourceId, session_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM index_entries WHERE source_id = ? AND session_id = ?",
        )
        .bind(source_id.to_string())
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_session(&self, source_id: SourceId, session_id: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM index_entries WHERE source_id = ? AND session_id = ?")
                .bind(source_id.to_string())
                .bind(session_id)
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

    async fn setup() -> (SqlitePool, SqliteIndexEntryRepository, Source) {
        let pool = create_test_pool().await.unwrap();
        let source = Source::new("Media", SourceKind::S3, serde_json::json!({}));
        SqliteSourceRepository::new(pool.clone())
            .insert(&source)
            .await
            .unwrap();
        let repo = SqliteIndexEntryRepository::new(pool.clone());
        (pool, repo, source)
    }

    #[tokio::test]
    async fn test_store_and_get_by_offset() {
        let (_pool, repo, source) = setup().await;

        for (offset, uri) in ["a.jpg", "b/c.jpg"].iter().enumerate() {
            repo.store(&IndexEntry::new(source.id, "s1", offset as u32, *uri, 10))
                .await
                .unwrap();
        }

        let entry = repo.get(source.id, "s1", 1).await.unwrap().unwrap();
        assert_eq!(entry.uri, "b/c.jpg");
        assert_eq!(entry.size, 10);
        assert!(entry.record_id.is_none());

        assert!(repo.get(source.id, "s1", 2).await.unwrap().is_none());
        assert!(repo.get(source.id, "s2", 0).await.unwrap().is_none());
        assert_eq!(repo.count_session(source.id, "s1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_replaces_same_offset() {
        let (_pool, repo, source) = setup().await;

        repo.store(&IndexEntry::new(source.id, "s1", 0, "old.jpg", 1))
            .await
            .unwrap();
        repo.store(&IndexEntry::new(source.id, "s1", 0, "new.jpg", 2))
            .await
            .unwrap();

        assert_eq!(repo.count_session(source.id, "s1").await.unwrap(), 1);
        let entry = repo.get(source.id, "s1", 0).await.unwrap().unwrap();
        assert_eq!(entry.uri, "new.jpg");
    }

    #[tokio::test]
    async fn test_update_record_id() {
        let (pool, repo, source) = setup().await;

        let root = Folder::new(source.id, None, "Media", "");
        SqliteFolderRepository::new(pool.clone())
            .insert(&root)
            .await
            .unwrap();
        let asset = Asset::new(source.id, root.id, "a.jpg");
        SqliteAssetRepository::new(pool.clone())
            .save(&asset)
            .await
            .unwrap();

        let id = repo
            .store(&IndexEntry::new(source.id, "s1", 0, "a.jpg", 5))
            .await
            .unwrap();
        repo.update_record_id(id, asset.id).await.unwrap();

        let entry = repo.get(source.id, "s1", 0).await.unwrap().unwrap();
        assert_eq!(entry.record_id, Some(asset.id));

        assert!(matches!(
            repo.update_record_id(id + 100, asset.id).await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (_pool, repo, source) = setup().await;

        repo.store(&IndexEntry::new(source.id, "s1", 0, "a", 0))
            .await
            .unwrap();
        repo.store(&IndexEntry::new(source.id, "s2", 0, "b", 0))
            .await
            .unwrap();

        assert_eq!(repo.delete_session(source.id, "s1").await.unwrap(), 1);
        assert_eq!(repo.count_session(source.id, "s2").await.unwrap(), 1);
    }
}
