//! Folder repository trait and implementation

use super::{invalid_column, validation_error};
use crate::error::{LibraryError, Result};
use crate::models::{Folder, FolderId, SourceId};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

/// Folder repository interface for data access operations
#[async_trait]
pub trait FolderRepository: Send + Sync {
    /// Find a folder by its ID
    ///
    /// # Returns
    /// - `Ok(Some(folder))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: FolderId) -> Result<Option<Folder>>;

    /// Find a folder by its path relative to the source root
    async fn find_by_path(&self, source_id: SourceId, path: &str) -> Result<Option<Folder>>;

    /// The top folder of a source (empty path)
    async fn find_root(&self, source_id: SourceId) -> Result<Option<Folder>> {
        self.find_by_path(source_id, "").await
    }

    /// Insert a new folder
    ///
    /// # Errors
    /// Returns error if:
    /// - A folder with the same ID or path already exists
    /// - Folder validation fails
    async fn insert(&self, folder: &Folder) -> Result<()>;

    /// Update name, parent and path of an existing folder
    async fn update(&self, folder: &Folder) -> Result<()>;

    /// Direct children of a folder
    async fn children(&self, parent_id: FolderId) -> Result<Vec<Folder>>;

    /// Every folder of a source ordered by path
    async fn list_by_source(&self, source_id: SourceId) -> Result<Vec<Folder>>;

    /// Rewrite the path prefix of a folder and all of its descendants
    ///
    /// Returns the number of folders whose path changed.
    async fn rename_tree(&self, source_id: SourceId, old_path: &str, new_path: &str)
        -> Result<u64>;

    /// Delete a folder; descendants and their files cascade
    ///
    /// # Returns
    /// - `Ok(true)` if folder was deleted
    /// - `Ok(false)` if folder was not found
    async fn delete(&self, id: FolderId) -> Result<bool>;
}

/// SQLite implementation of FolderRepository
pub struct SqliteFolderRepository {
    pool: SqlitePool,
}

impl SqliteFolderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate_folder(folder: &Folder) -> Result<()> {
        folder
            .validate()
            .map_err(|msg| validation_error("Folder", msg))
    }
}

#[derive(Debug, FromRow)]
struct FolderRow {
    id: String,
    source_id: String,
    parent_id: Option<String>,
    name: String,
    path: String,
    created_at: i64,
}

impl TryFrom<FolderRow> for Folder {
    type Error = LibraryError;

    fn try_from(row: FolderRow) -> Result<Self> {
        let parent_id = row
            .parent_id
            .as_deref()
            .map(FolderId::from_string)
            .transpose()
            .map_err(|e| invalid_column("parent_id", e))?;

        Ok(Folder {
            id: FolderId::from_string(&row.id).map_err(|e| invalid_column("id", e))?,
            source_id: SourceId::from_string(&row.source_id)
                .map_err(|e| invalid_column("source_id", e))?,
            parent_id,
            name: row.name,
            path: row.path,
            created_at: row.created_at,
        })
    }
}

const SELECT_FOLDER: &str =
    "SELECT id, source_id, parent_id, name, path, created_at FROM folders";

#[async_trait]
impl FolderRepository for SqliteFolderRepository {
    async fn find_by_id(&self, id: FolderId) -> Result<Option<Folder>> {
        let row = sqlx::query_as::<_, FolderRow>(&format!("{} WHERE id = ?", SELECT_FOLDER))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Folder::try_from).transpose()
    }

    async fn find_by_path(&self, source_id: SourceId, path: &str) -> Result<Option<Folder>> {
        let row = sqlx::query_as::<_, FolderRow>(&format!(
            "{} WHERE source_id = ? AND path = ?",
            SELECT_FOLDER
        ))
        .bind(source_id.to_string())
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Folder::try_from).transpose()
    }

    async fn insert(&self, folder: &Folder) -> Result<()> {
        Self::validate_folder(folder)?;

        sqlx::query(
            r#"
            INSERT INTO folders (id, source_id, parent_id, name, path, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(folder.id.to_string())
        .bind(folder.source_id.to_string())
        .bind(folder.parent_id.map(|id| id.to_string()))
        .bind(&folder.name)
        .bind(&folder.path)
        .bind(folder.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, folder: &Folder) -> Result<()> {
        Self::validate_folder(folder)?;

        let result =
            sqlx::query("UPDATE folders SET parent_id = ?, name = ?, path = ? WHERE id = ?")
                .bind(folder.parent_id.map(|id| id.to_string()))
                .bind(&folder.name)
                .bind(&folder.path)
                .bind(folder.id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Folder".to_string(),
                id: folder.id.to_string(),
            });
        }

        Ok(())
    }

    async fn children(&self, parent_id: FolderId) -> Result<Vec<Folder>> {
        let rows = sqlx::query_as::<_, FolderRow>(&format!(
            "{} WHERE parent_id = ? ORDER BY name",
            SELECT_FOLDER
        ))
        .bind(parent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Folder::try_from).collect()
    }

    async fn list_by_source(&self, source_id: SourceId) -> Result<Vec<Folder>> {
        let rows = sqlx::query_as::<_, FolderRow>(&format!(
            "{} WHERE source_id = ? ORDER BY path",
            SELECT_FOLDER
        ))
        .bind(source_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Folder::try_from).collect()
    }

    async fn rename_tree(
        &self,
        source_id: SourceId,
        old_path: &str,
        new_path: &str,
    ) -> Result<u64> {
        if old_path.is_empty() {
            return Err(validation_error(
                "Folder",
                "The top folder cannot be renamed".to_string(),
            ));
        }

        // substr keeps LIKE wildcards in folder names from matching siblings
        let result = sqlx::query(
            r#"
            UPDATE folders
            SET path = ? || substr(path, length(?) + 1)
            WHERE source_id = ? AND substr(path, 1, length(?)) = ?
            "#,
        )
        .bind(new_path)
        .bind(old_path)
        .bind(source_id.to_string())
        .bind(old_path)
        .bind(old_path)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: FolderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
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
    use crate::models::{Source, SourceKind};
    use crate::repositories::{SourceRepository, SqliteSourceRepository};

    async fn setup() -> (SqliteFolderRepository, Folder) {
        let pool = create_test_pool().await.unwrap();
        let source = Source::new("Media", SourceKind::S3, serde_json::json!({}));
        SqliteSourceRepository::new(pool.clone())
            .insert(&source)
            .await
            .unwrap();

        let repo = SqliteFolderRepository::new(pool);
        let root = Folder::new(source.id, None, "Media", "");
        repo.insert(&root).await.unwrap();
        (repo, root)
    }

    async fn add_child(repo: &SqliteFolderRepository, parent: &Folder, name: &str) -> Folder {
        let folder = Folder::new(
            parent.source_id,
            Some(parent.id),
            name,
            format!("{}{}/", parent.path, name),
        );
        repo.insert(&folder).await.unwrap();
        folder
    }

    #[tokio::test]
    async fn test_insert_and_find_folder() {
        let (repo, root) = setup().await;
        let photos = add_child(&repo, &root, "photos").await;

        let found = repo.find_by_id(photos.id).await.unwrap().unwrap();
        assert_eq!(found, photos);

        let by_path = repo
            .find_by_path(root.source_id, "photos/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_path.id, photos.id);

        let top = repo.find_root(root.source_id).await.unwrap().unwrap();
        assert!(top.is_root());
    }

    #[tokio::test]
    async fn test_duplicate_path_rejected() {
        let (repo, root) = setup().await;
        add_child(&repo, &root, "a").await;

        let dup = Folder::new(root.source_id, Some(root.id), "a", "a/");
        assert!(matches!(
            repo.insert(&dup).await,
            Err(LibraryError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_children_and_listing() {
        let (repo, root) = setup().await;
        let b = add_child(&repo, &root, "b").await;
        add_child(&repo, &root, "a").await;
        add_child(&repo, &b, "c").await;

        let names: Vec<_> = repo
            .children(root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let paths: Vec<_> = repo
            .list_by_source(root.source_id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["", "a/", "b/", "b/c/"]);
    }

    #[tokio::test]
    async fn test_rename_tree_rewrites_descendants_only() {
        let (repo, root) = setup().await;
        let a = add_child(&repo, &root, "a").await;
        add_child(&repo, &a, "x").await;
        add_child(&repo, &root, "ab").await;
        add_child(&repo, &root, "a_").await;

        let changed = repo.rename_tree(root.source_id, "a/", "z/").await.unwrap();
        assert_eq!(changed, 2);

        assert!(repo
            .find_by_path(root.source_id, "z/x/")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_path(root.source_id, "ab/")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_path(root.source_id, "a_/")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_rename_root_rejected() {
        let (repo, root) = setup().await;
        assert!(repo.rename_tree(root.source_id, "", "x/").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (repo, root) = setup().await;
        let a = add_child(&repo, &root, "a").await;
        let x = add_child(&repo, &a, "x").await;

        assert!(repo.delete(a.id).await.unwrap());
        assert!(repo.find_by_id(x.id).await.unwrap().is_none());
        assert!(!repo.delete(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_folder() {
        let (repo, root) = setup().await;
        let mut a = add_child(&repo, &root, "a").await;

        a.name = "renamed".to_string();
        a.path = "renamed/".to_string();
        repo.update(&a).await.unwrap();

        let found = repo.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(found.path, "renamed/");
    }
}
