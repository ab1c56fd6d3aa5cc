//! # Asset Catalog
//!
//! Facade over the metadata repositories that the indexer and the file
//! operations share.
//!
//! ## Overview
//!
//! The catalog answers the questions the engine asks of the metadata store
//! in domain terms: "make sure this folder path exists", "which record does
//! this relative path belong to", "store this index entry". It never talks to
//! remote storage.
//!
//! Folder creation is iterative: the first existing ancestor is located and
//! the missing levels are inserted top-down, so a parent row always exists
//! before its child is written.

use core_library::models::{Asset, AssetId, Folder, FolderId, IndexEntry, Source, SourceId};
use core_library::repositories::{
    AssetRepository, FolderRepository, IndexEntryRepository, SourceRepository,
    SqliteAssetRepository, SqliteFolderRepository, SqliteIndexEntryRepository,
    SqliteSourceRepository, SqliteTransformIndexRepository, TransformIndexRepository,
};
use core_runtime::config::EngineConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Result, SyncError};
use crate::paths::{folder_name, parent_folder_path, split_file_path};
use crate::reconciler::FolderTree;

/// Metadata store access for the sync engine
#[derive(Clone)]
pub struct AssetCatalog {
    sources: Arc<dyn SourceRepository>,
    folders: Arc<dyn FolderRepository>,
    assets: Arc<dyn AssetRepository>,
    entries: Arc<dyn IndexEntryRepository>,
    transforms: Arc<dyn TransformIndexRepository>,
}

impl AssetCatalog {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        folders: Arc<dyn FolderRepository>,
        assets: Arc<dyn AssetRepository>,
        entries: Arc<dyn IndexEntryRepository>,
        transforms: Arc<dyn TransformIndexRepository>,
    ) -> Self {
        Self {
            sources,
            folders,
            assets,
            entries,
            transforms,
        }
    }

    /// Catalog backed by the SQLite repositories of one pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::new(
            Arc::new(SqliteSourceRepository::new(pool.clone())),
            Arc::new(SqliteFolderRepository::new(pool.clone())),
            Arc::new(SqliteAssetRepository::new(pool.clone())),
            Arc::new(SqliteIndexEntryRepository::new(pool.clone())),
            Arc::new(SqliteTransformIndexRepository::new(pool)),
        )
    }

    pub fn transforms(&self) -> Arc<dyn TransformIndexRepository> {
        Arc::clone(&self.transforms)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn source(&self, id: SourceId) -> Result<Source> {
        self.sources
            .find_by_id(id)
            .await?
            .ok_or_else(|| SyncError::SourceNotFound(id.to_string()))
    }

    pub async fn folder(&self, id: FolderId) -> Result<Folder> {
        self.folders
            .find_by_id(id)
            .await?
            .ok_or_else(|| SyncError::FolderNotFound(id.to_string()))
    }

    pub async fn asset(&self, id: AssetId) -> Result<Asset> {
        self.assets
            .find_by_id(id)
            .await?
            .ok_or_else(|| SyncError::FileNotFound(id.to_string()))
    }

    pub async fn find_folder_by_path(
        &self,
        source_id: SourceId,
        path: &str,
    ) -> Result<Option<Folder>> {
        Ok(self.folders.find_by_path(source_id, path).await?)
    }

    pub async fn find_asset_in_folder(
        &self,
        folder_id: FolderId,
        filename: &str,
    ) -> Result<Option<Asset>> {
        Ok(self.assets.find_in_folder(folder_id, filename).await?)
    }

    pub async fn assets_in_folder(&self, folder_id: FolderId) -> Result<Vec<Asset>> {
        Ok(self.assets.list_in_folder(folder_id).await?)
    }

    // =========================================================================
    // Folders
    // =========================================================================

    /// Root folder of a source, created on first use
    #[instrument(skip(self, source), fields(source_id = %source.id))]
    pub async fn ensure_top_folder(&self, source: &Source) -> Result<Folder> {
        if let Some(root) = self.folders.find_root(source.id).await? {
            return Ok(root);
        }

        let root = Folder::new(source.id, None, source.name.clone(), "");
        self.folders.insert(&root).await?;
        debug!(folder_id = %root.id, "Created top folder");
        Ok(root)
    }

    /// Folder at `path` (slash-terminated, empty for the root), creating it
    /// and any missing ancestors
    pub async fn ensure_folder_by_full_path(&self, source: &Source, path: &str) -> Result<Folder> {
        if path.is_empty() {
            return self.ensure_top_folder(source).await;
        }

        let mut missing = Vec::new();
        let mut cursor = path.to_string();
        let mut parent = loop {
            if cursor.is_empty() {
                break self.ensure_top_folder(source).await?;
            }
            if let Some(existing) = self.folders.find_by_path(source.id, &cursor).await? {
                break existing;
            }
            let next = parent_folder_path(&cursor);
            missing.push(cursor);
            cursor = next;
        };

        for folder_path in missing.into_iter().rev() {
            let folder = Folder::new(
                source.id,
                Some(parent.id),
                folder_name(&folder_path).to_string(),
                folder_path,
            );
            self.folders.insert(&folder).await?;
            debug!(path = %folder.path, "Created folder");
            parent = folder;
        }

        Ok(parent)
    }

    /// Record a folder whose marker object was just written
    pub async fn create_folder_record(
        &self,
        parent: &Folder,
        name: &str,
        path: &str,
    ) -> Result<Folder> {
        let folder = Folder::new(parent.source_id, Some(parent.id), name, path);
        self.folders.insert(&folder).await?;
        Ok(folder)
    }

    /// Known folders of a source that a listing did not contain
    ///
    /// The root folder is never reported.
    pub async fn missing_folders(
        &self,
        source_id: SourceId,
        listed: &FolderTree,
    ) -> Result<Vec<Folder>> {
        let known = self.folders.list_by_source(source_id).await?;
        Ok(known
            .into_iter()
            .filter(|folder| !folder.is_root() && !listed.contains(&folder.path))
            .collect())
    }

    /// Rename a folder and rewrite the paths of its subtree
    pub async fn rename_folder_tree(
        &self,
        folder: &Folder,
        new_name: &str,
        new_path: &str,
    ) -> Result<Folder> {
        self.folders
            .rename_tree(folder.source_id, &folder.path, new_path)
            .await?;

        let mut renamed = self.folder(folder.id).await?;
        renamed.name = new_name.to_string();
        self.folders.update(&renamed).await?;
        Ok(renamed)
    }

    /// Delete a folder; subfolders, files and transform indexes cascade
    pub async fn delete_folder(&self, id: FolderId) -> Result<bool> {
        Ok(self.folders.delete(id).await?)
    }

    // =========================================================================
    // File records
    // =========================================================================

    /// Resolve the file record for a relative path, creating it if needed
    ///
    /// Returns `None` for paths without a filename and for extensions that
    /// are not allowed; such objects are never indexed.
    pub async fn index_file(
        &self,
        source: &Source,
        uri: &str,
        config: &EngineConfig,
    ) -> Result<Option<Asset>> {
        let (folder_path, filename) = split_file_path(uri);
        let extension = core_library::models::extension_of(filename);
        if filename.is_empty() || !config.is_extension_allowed(extension) {
            debug!(uri, "Not indexing file with a disallowed type");
            return Ok(None);
        }

        let folder = self.ensure_folder_by_full_path(source, folder_path).await?;
        if let Some(existing) = self.assets.find_in_folder(folder.id, filename).await? {
            return Ok(Some(existing));
        }

        let asset = Asset::new(source.id, folder.id, filename);
        self.assets.save(&asset).await?;
        Ok(Some(asset))
    }

    pub async fn save_asset(&self, asset: &Asset) -> Result<()> {
        Ok(self.assets.save(asset).await?)
    }

    pub async fn delete_asset(&self, id: AssetId) -> Result<bool> {
        Ok(self.assets.delete(id).await?)
    }

    // =========================================================================
    // Index entries
    // =========================================================================

    pub async fn store_index_entry(&self, entry: &IndexEntry) -> Result<i64> {
        Ok(self.entries.store(entry).await?)
    }

    pub async fn index_entry(
        &self,
        source_id: SourceId,
        session_id: &str,
        offset: u32,
    ) -> Result<Option<IndexEntry>> {
        Ok(self.entries.get(source_id, session_id, offset).await?)
    }

    pub async fn update_index_entry_record_id(
        &self,
        entry_id: i64,
        record_id: AssetId,
    ) -> Result<()> {
        Ok(self.entries.update_record_id(entry_id, record_id).await?)
    }

    pub async fn clear_session(&self, source_id: SourceId, session_id: &str) -> Result<u64> {
        Ok(self.entries.delete_session(source_id, session_id).await?)
    }
}
