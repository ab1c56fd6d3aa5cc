//! # File Operations
//!
//! User-driven mutations of a remote source: insert, move, folder create,
//! rename and delete, file delete.
//!
//! ## Overview
//!
//! Every operation returns an [`OperationResponse`]. Expected outcomes are
//! data, not errors:
//!
//! - `Success` describes what changed
//! - `Conflict` carries a [`ConflictPrompt`] (keep both / replace / cancel and
//!   a suggested alternative name); nothing was written
//! - `Error` reports a refused operation with a user-facing message
//!
//! `Err(SyncError)` is reserved for failures the caller cannot resolve by
//! choosing an option: storage or database errors, corrupted settings, a
//! disallowed file type.
//!
//! ## Ordering rules
//!
//! - Conflict checks run before any destructive write unless `overwrite` is set.
//! - Objects are copied before the originals are deleted. A failed delete
//!   after a successful copy is logged and tolerated: the object briefly
//!   exists in both places, but nothing is lost.
//!
//! ## Usage
//!
//! ```ignore
//! let ops = FileOperations::new(ctx, Arc::new(MergeState::default()));
//!
//! match ops.move_file(asset_id, target_folder, None, false).await? {
//!     OperationResponse::Success(outcome) => println!("moved: {:?}", outcome),
//!     OperationResponse::Conflict(prompt) => ask_user(prompt),
//!     OperationResponse::Error { message } => show(message),
//! }
//! ```

use bridge_traits::storage::{PutBody, WriteOptions};
use core_library::models::{extension_of, Asset, AssetId, AssetKind, Folder, FolderId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::connection::SourceConnection;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::paths::{child_folder_path, clean_asset_name, file_path, parent_folder_path};

// =============================================================================
// Merge coordination
// =============================================================================

/// Reports whether a bulk merge is running
///
/// During a merge, records at a move destination are about to be superseded,
/// so they do not count as conflicts.
pub trait MergeCoordinator: Send + Sync {
    fn is_merge_in_progress(&self) -> bool;
}

/// Process-local merge flag
#[derive(Debug, Default)]
pub struct MergeState {
    active: AtomicBool,
}

impl MergeState {
    pub fn set_in_progress(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl MergeCoordinator for MergeState {
    fn is_merge_in_progress(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Choice offered when a name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOption {
    KeepBoth,
    Replace,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPrompt {
    /// Name that collided
    pub filename: String,
    /// First free `name_N.ext` alternative
    pub suggested_name: String,
    pub options: Vec<PromptOption>,
}

impl ConflictPrompt {
    pub fn new(filename: impl Into<String>, suggested_name: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            suggested_name: suggested_name.into(),
            options: vec![PromptOption::KeepBoth, PromptOption::Replace, PromptOption::Cancel],
        }
    }
}

/// What a successful operation changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationOutcome {
    Inserted { file_id: AssetId, key: String },
    Moved { file_id: AssetId, filename: String },
    FolderCreated { folder_id: FolderId, path: String },
    FolderRenamed { folder_id: FolderId, path: String },
    FolderDeleted { folder_id: FolderId },
    FileDeleted { file_id: AssetId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationResponse {
    Success(OperationOutcome),
    Conflict(ConflictPrompt),
    Error { message: String },
}

impl OperationResponse {
    pub fn error(message: impl Into<String>) -> Self {
        OperationResponse::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResponse::Success(_))
    }

    pub fn conflict(&self) -> Option<&ConflictPrompt> {
        match self {
            OperationResponse::Conflict(prompt) => Some(prompt),
            _ => None,
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

pub struct FileOperations {
    ctx: SyncContext,
    merge: Arc<dyn MergeCoordinator>,
}

impl FileOperations {
    pub fn new(ctx: SyncContext, merge: Arc<dyn MergeCoordinator>) -> Self {
        Self { ctx, merge }
    }

    /// Upload a local file into a folder
    ///
    /// The filename is cleaned first. An existing object at the target key
    /// yields a conflict; nothing is overwritten.
    ///
    /// # Errors
    ///
    /// [`SyncError::DisallowedFileType`] when the extension is not allowed.
    #[instrument(skip(self, local_file), fields(folder_id = %folder_id))]
    pub async fn insert_file_in_folder(
        &self,
        folder_id: FolderId,
        local_file: &Path,
        filename: &str,
    ) -> Result<OperationResponse> {
        let folder = self.ctx.catalog.folder(folder_id).await?;
        let conn = self.ctx.connect(folder.source_id).await?;

        let filename = clean_asset_name(filename);
        if filename.is_empty() || !self.ctx.config.is_extension_allowed(extension_of(&filename)) {
            return Err(SyncError::DisallowedFileType(filename));
        }

        let key = conn.paths().file_key(&folder.path, &filename);
        if conn.storage().head(conn.bucket(), &key).await?.is_some() {
            let suggested = self.get_name_replacement(&conn, &folder, &filename).await?;
            return Ok(OperationResponse::Conflict(ConflictPrompt::new(
                filename, suggested,
            )));
        }

        let options = conn.upload_options(self.ctx.clock.now());
        conn.storage()
            .put(
                conn.bucket(),
                &key,
                PutBody::File(local_file.to_path_buf()),
                &options,
            )
            .await?;

        let mut asset = match self.ctx.catalog.find_asset_in_folder(folder.id, &filename).await? {
            Some(existing) => existing,
            None => Asset::new(folder.source_id, folder.id, filename.as_str()),
        };

        asset.size = tokio::fs::metadata(local_file).await?.len();
        if asset.is_image() {
            if let Some((width, height)) = self.ctx.artifacts.measure(local_file).await {
                asset.width = Some(width);
                asset.height = Some(height);
            }
        }
        asset.date_modified = match conn.storage().head(conn.bucket(), &key).await? {
            Some(remote) => Some(remote.last_modified.timestamp()),
            None => Some(self.ctx.clock.unix_timestamp()),
        };
        asset.updated_at = self.ctx.clock.unix_timestamp();
        self.ctx.catalog.save_asset(&asset).await?;

        info!(key = %key, "Inserted file");
        Ok(OperationResponse::Success(OperationOutcome::Inserted {
            file_id: asset.id,
            key,
        }))
    }

    /// Replacement name for `filename` inside `folder`
    ///
    /// Returns `filename` itself when it is free, otherwise the first unused
    /// `name_N.ext`. Comparison is case-insensitive against the keys currently
    /// stored under the folder.
    pub async fn get_name_replacement(
        &self,
        conn: &SourceConnection,
        folder: &Folder,
        filename: &str,
    ) -> Result<String> {
        let folder_prefix = conn.paths().to_remote_key(&folder.path);
        let existing: HashSet<String> = conn
            .storage()
            .list_all(
                conn.bucket(),
                &folder_prefix,
                self.ctx.config.storage.list_page_size,
            )
            .await?
            .into_iter()
            .map(|object| object.key.to_lowercase())
            .collect();

        let taken = |name: &str| {
            existing.contains(&format!("{}{}", folder_prefix, name).to_lowercase())
        };
        if !taken(filename) {
            return Ok(filename.to_string());
        }

        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, extension)) => (stem, Some(extension)),
            None => (filename, None),
        };

        let candidate = |index: u32| match extension {
            Some(extension) => format!("{}_{}.{}", stem, index, extension),
            None => format!("{}_{}", stem, index),
        };

        let mut index = 1;
        while taken(&candidate(index)) {
            index += 1;
        }
        Ok(candidate(index))
    }

    /// Move (and optionally rename) a file into `target_folder_id`
    ///
    /// Conflicts when `overwrite` is false and either an object exists at the
    /// destination or another record there uses the name (the record check is
    /// suppressed while a merge is running). Same-source image moves carry
    /// their transforms along; cross-source moves drop them.
    #[instrument(skip(self), fields(asset_id = %asset_id, target_folder_id = %target_folder_id))]
    pub async fn move_file(
        &self,
        asset_id: AssetId,
        target_folder_id: FolderId,
        filename: Option<&str>,
        overwrite: bool,
    ) -> Result<OperationResponse> {
        let catalog = &self.ctx.catalog;
        let artifacts = &self.ctx.artifacts;

        let asset = catalog.asset(asset_id).await?;
        let from_folder = catalog.folder(asset.folder_id).await?;
        let to_folder = catalog.folder(target_folder_id).await?;

        let same_source = asset.source_id == to_folder.source_id;
        let from_conn = self.ctx.connect(asset.source_id).await?;
        let to_conn = if same_source {
            from_conn.clone()
        } else {
            self.ctx.connect(to_folder.source_id).await?
        };

        if !same_source && !to_conn.can_move_file_from(&from_conn) {
            return Ok(OperationResponse::error(
                "Files cannot be moved between these sources",
            ));
        }

        let new_filename = match filename {
            Some(name) => clean_asset_name(name),
            None => asset.filename.clone(),
        };
        if new_filename.is_empty() {
            return Ok(OperationResponse::error("The filename is not valid"));
        }

        let from_key = from_conn.paths().file_key(&from_folder.path, &asset.filename);
        let to_key = to_conn.paths().file_key(&to_folder.path, &new_filename);
        if same_source && from_key == to_key {
            return Ok(OperationResponse::Success(OperationOutcome::Moved {
                file_id: asset.id,
                filename: new_filename,
            }));
        }

        let superseded = catalog
            .find_asset_in_folder(to_folder.id, &new_filename)
            .await?
            .filter(|record| record.id != asset.id);

        if !overwrite {
            let object_exists = to_conn
                .storage()
                .head(to_conn.bucket(), &to_key)
                .await?
                .is_some();
            let record_conflict = superseded.is_some() && !self.merge.is_merge_in_progress();

            if object_exists || record_conflict {
                let suggested = self
                    .get_name_replacement(&to_conn, &to_folder, &new_filename)
                    .await?;
                return Ok(OperationResponse::Conflict(ConflictPrompt::new(
                    new_filename,
                    suggested,
                )));
            }
        }

        let transforms = if same_source && asset.is_image() {
            artifacts.created_transforms(&asset).await?
        } else {
            Vec::new()
        };
        if let Some(broken) = transforms.iter().find(|index| index.location.is_empty()) {
            error!(index_id = broken.id, "Transform index without a location; aborting move");
            return Err(SyncError::CorruptedSetting(format!(
                "transform index {} has no location",
                broken.id
            )));
        }

        if let Err(e) = to_conn
            .storage()
            .copy(
                from_conn.bucket(),
                &from_key,
                to_conn.bucket(),
                &to_key,
                &WriteOptions::public_read(),
            )
            .await
        {
            warn!(from = %from_key, to = %to_key, error = %e, "Copy failed");
            return Ok(OperationResponse::error("Could not save the file"));
        }

        if let Err(e) = from_conn.storage().delete(from_conn.bucket(), &from_key).await {
            warn!(key = %from_key, error = %e, "Could not delete moved file; leaving original");
        }

        if let Some(record) = &superseded {
            artifacts
                .delete_all_transform_data(&to_conn, &to_folder, record)
                .await?;
        }

        if asset.is_image() {
            if same_source {
                let mut destination = asset.clone();
                destination.filename = new_filename.clone();

                for index in &transforms {
                    let mut moved = index.clone();
                    if index.has_filename() {
                        moved.filename = Some(new_filename.clone());
                        artifacts.store_transform_index(&moved).await?;
                    }

                    let from = file_path(
                        &from_folder.path,
                        &artifacts.transform_subpath(&asset, index),
                    );
                    let to = file_path(
                        &to_folder.path,
                        &artifacts.transform_subpath(&destination, &moved),
                    );

                    if self.copy_source_file(&from_conn, &from, &to).await {
                        self.delete_source_file(&from_conn, &from).await;
                    }
                }
            } else {
                artifacts
                    .delete_all_transform_data(&from_conn, &from_folder, &asset)
                    .await?;
            }
        }

        if let Some(record) = superseded {
            catalog.delete_asset(record.id).await?;
        }

        let mut moved = asset.clone();
        moved.source_id = to_folder.source_id;
        moved.folder_id = to_folder.id;
        moved.kind = AssetKind::from_filename(&new_filename);
        moved.filename = new_filename.clone();
        moved.updated_at = self.ctx.clock.unix_timestamp();
        catalog.save_asset(&moved).await?;

        if same_source {
            artifacts.rename_local_source(&asset, &moved).await?;
        }

        info!(from = %from_key, to = %to_key, "Moved file");
        Ok(OperationResponse::Success(OperationOutcome::Moved {
            file_id: moved.id,
            filename: new_filename,
        }))
    }

    /// Create a folder under `parent_id` by writing its marker object
    #[instrument(skip(self), fields(parent_id = %parent_id))]
    pub async fn create_folder(
        &self,
        parent_id: FolderId,
        name: &str,
    ) -> Result<OperationResponse> {
        let parent = self.ctx.catalog.folder(parent_id).await?;
        let conn = self.ctx.connect(parent.source_id).await?;

        let name = clean_asset_name(name);
        if name.is_empty() {
            return Ok(OperationResponse::error("The folder name is not valid"));
        }

        let path = child_folder_path(&parent.path, &name);
        let marker = conn.paths().to_remote_key(&path);
        let recorded = self
            .ctx
            .catalog
            .find_folder_by_path(parent.source_id, &path)
            .await?
            .is_some();

        if recorded || conn.storage().head(conn.bucket(), &marker).await?.is_some() {
            return Ok(OperationResponse::error(format!(
                "A folder with the name “{}” already exists in the folder.",
                name
            )));
        }

        conn.storage()
            .put(conn.bucket(), &marker, PutBody::Empty, &WriteOptions::public_read())
            .await?;
        let folder = self
            .ctx
            .catalog
            .create_folder_record(&parent, &name, &path)
            .await?;

        info!(path = %path, "Created folder");
        Ok(OperationResponse::Success(OperationOutcome::FolderCreated {
            folder_id: folder.id,
            path,
        }))
    }

    /// Whether the marker object of folder `name` under `parent_id` exists
    pub async fn folder_exists(&self, parent_id: FolderId, name: &str) -> Result<bool> {
        let parent = self.ctx.catalog.folder(parent_id).await?;
        let conn = self.ctx.connect(parent.source_id).await?;

        let marker = conn
            .paths()
            .to_remote_key(&child_folder_path(&parent.path, name));
        Ok(conn.storage().head(conn.bucket(), &marker).await?.is_some())
    }

    /// Rename a folder by copying every object under it to the new prefix
    ///
    /// Keys are processed in descending order. All copies complete before any
    /// original is deleted; a failed copy aborts with the originals intact.
    #[instrument(skip(self), fields(folder_id = %folder_id))]
    pub async fn rename_folder(
        &self,
        folder_id: FolderId,
        new_name: &str,
    ) -> Result<OperationResponse> {
        let folder = self.ctx.catalog.folder(folder_id).await?;
        if folder.is_root() {
            return Ok(OperationResponse::error("The top folder cannot be renamed"));
        }
        let conn = self.ctx.connect(folder.source_id).await?;

        let new_name = clean_asset_name(new_name);
        if new_name.is_empty() {
            return Ok(OperationResponse::error("The folder name is not valid"));
        }

        let new_path = child_folder_path(&parent_folder_path(&folder.path), &new_name);
        if new_path == folder.path {
            return Ok(OperationResponse::Success(OperationOutcome::FolderRenamed {
                folder_id: folder.id,
                path: new_path,
            }));
        }
        if self
            .ctx
            .catalog
            .find_folder_by_path(folder.source_id, &new_path)
            .await?
            .is_some()
        {
            return Ok(OperationResponse::error(format!(
                "A folder with the name “{}” already exists in the folder.",
                new_name
            )));
        }

        let old_prefix = conn.paths().to_remote_key(&folder.path);
        let new_prefix = conn.paths().to_remote_key(&new_path);

        let mut objects = conn
            .storage()
            .list_all(
                conn.bucket(),
                &old_prefix,
                self.ctx.config.storage.list_page_size,
            )
            .await?;
        objects.sort_by(|a, b| b.key.cmp(&a.key));

        for object in &objects {
            let relative = &object.key[old_prefix.len()..];
            let target = format!("{}{}", new_prefix, relative);
            conn.storage()
                .copy(
                    conn.bucket(),
                    &object.key,
                    conn.bucket(),
                    &target,
                    &WriteOptions::public_read(),
                )
                .await?;
        }

        for object in &objects {
            if let Err(e) = conn.storage().delete(conn.bucket(), &object.key).await {
                warn!(key = %object.key, error = %e, "Could not delete renamed object");
            }
        }

        self.ctx
            .catalog
            .rename_folder_tree(&folder, &new_name, &new_path)
            .await?;

        info!(from = %folder.path, to = %new_path, count = objects.len(), "Renamed folder");
        Ok(OperationResponse::Success(OperationOutcome::FolderRenamed {
            folder_id: folder.id,
            path: new_path,
        }))
    }

    /// Delete every object under a folder, then the folder record
    ///
    /// Object deletes are best-effort; the listing uses the slash-terminated
    /// folder prefix, so sibling folders sharing a name prefix are untouched.
    #[instrument(skip(self), fields(folder_id = %folder_id))]
    pub async fn delete_folder(&self, folder_id: FolderId) -> Result<OperationResponse> {
        let folder = self.ctx.catalog.folder(folder_id).await?;
        if folder.is_root() {
            return Ok(OperationResponse::error("The top folder cannot be deleted"));
        }
        let conn = self.ctx.connect(folder.source_id).await?;

        let prefix = conn.paths().to_remote_key(&folder.path);
        let objects = conn
            .storage()
            .list_all(conn.bucket(), &prefix, self.ctx.config.storage.list_page_size)
            .await?;

        for object in &objects {
            if let Err(e) = conn.storage().delete(conn.bucket(), &object.key).await {
                warn!(key = %object.key, error = %e, "Could not delete object");
            }
        }

        self.ctx.catalog.delete_folder(folder.id).await?;

        info!(path = %folder.path, count = objects.len(), "Deleted folder");
        Ok(OperationResponse::Success(OperationOutcome::FolderDeleted {
            folder_id: folder.id,
        }))
    }

    /// Delete a file, its transforms and its record
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn delete_file(&self, asset_id: AssetId) -> Result<OperationResponse> {
        let asset = self.ctx.catalog.asset(asset_id).await?;
        let folder = self.ctx.catalog.folder(asset.folder_id).await?;
        let conn = self.ctx.connect(asset.source_id).await?;

        self.delete_source_file(&conn, &file_path(&folder.path, &asset.filename))
            .await;
        self.ctx
            .artifacts
            .delete_all_transform_data(&conn, &folder, &asset)
            .await?;
        self.ctx.catalog.delete_asset(asset.id).await?;

        Ok(OperationResponse::Success(OperationOutcome::FileDeleted {
            file_id: asset.id,
        }))
    }

    /// Copy one object within a source's bucket; `false` on failure
    pub async fn copy_source_file(&self, conn: &SourceConnection, from: &str, to: &str) -> bool {
        let from_key = conn.paths().to_remote_key(from);
        let to_key = conn.paths().to_remote_key(to);

        match conn
            .storage()
            .copy(
                conn.bucket(),
                &from_key,
                conn.bucket(),
                &to_key,
                &WriteOptions::public_read(),
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(from = %from_key, to = %to_key, error = %e, "Could not copy object");
                false
            }
        }
    }

    /// Best-effort delete of one object by relative path
    pub async fn delete_source_file(&self, conn: &SourceConnection, relative_path: &str) {
        let key = conn.paths().to_remote_key(relative_path);
        if let Err(e) = conn.storage().delete(conn.bucket(), &key).await {
            warn!(key = %key, error = %e, "Could not delete object");
        }
    }

    /// Download a file to a fresh temporary path
    pub async fn get_local_copy(&self, asset_id: AssetId) -> Result<PathBuf> {
        let asset = self.ctx.catalog.asset(asset_id).await?;
        let folder = self.ctx.catalog.folder(asset.folder_id).await?;
        let conn = self.ctx.connect(asset.source_id).await?;

        let key = conn.paths().file_key(&folder.path, &asset.filename);
        let target = self.ctx.artifacts.temp_path(asset.extension());
        conn.storage()
            .download_to(conn.bucket(), &key, &target)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    SyncError::ObjectNotFound { key: key.clone() }
                } else {
                    SyncError::Storage(e)
                }
            })?;

        Ok(target)
    }
}
