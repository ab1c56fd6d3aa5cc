//! # Index Session Manager
//!
//! Two-phase, resumable enumeration of a remote source.
//!
//! ## Overview
//!
//! An external scheduler drives each phase as a discrete step:
//!
//! 1. [`IndexSessionManager::start_index`] lists every object under the
//!    source prefix page by page, streams the keys through the
//!    [`FolderReconciler`], stores one [`IndexEntry`] per file and makes sure
//!    every listed or implied folder exists locally.
//! 2. [`IndexSessionManager::process_index`] handles one entry by offset:
//!    resolves the file record, probes the remote object and refreshes the
//!    cached original only when it is an image whose copy is missing or stale.
//!    A missing entry means the session is done.
//!
//! Processing an offset is idempotent. The cached original carries the remote
//! modification time, so staleness is judged against the cache itself: a step
//! re-run after a crash finds the copy current and converges on the same
//! record without downloading again.
//!
//! ## Usage
//!
//! ```ignore
//! let manager = IndexSessionManager::new(ctx);
//! let started = manager.start_index(source_id, "session-1").await?;
//!
//! for offset in 0..started.total {
//!     manager.process_index(source_id, "session-1", offset).await?;
//! }
//! ```

use core_library::models::{AssetId, Folder, IndexEntry, SourceId};
use tracing::{debug, info, instrument};

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::reconciler::FolderReconciler;

/// Outcome of starting a session
#[derive(Debug, Clone)]
pub struct IndexStartResult {
    pub source_id: SourceId,
    /// Number of entries stored for processing
    pub total: u32,
    /// Folders known locally that the listing no longer contains
    pub missing_folders: Vec<Folder>,
}

/// Outcome of one processing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The entry was materialized into this file record
    Indexed(AssetId),
    /// The entry is not an indexable file (disallowed type, no filename)
    Skipped { uri: String },
    /// No entry at this offset: the session is complete
    Finished,
}

impl ProcessOutcome {
    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            ProcessOutcome::Indexed(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ProcessOutcome::Finished)
    }
}

pub struct IndexSessionManager {
    ctx: SyncContext,
}

impl IndexSessionManager {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Phase 1: list the source and persist index entries and folders
    ///
    /// Entries left over from an earlier run of the same session are dropped
    /// first so offsets always describe this listing.
    ///
    /// # Errors
    ///
    /// Listing and database failures propagate; nothing is swallowed.
    #[instrument(skip(self), fields(source_id = %source_id))]
    pub async fn start_index(
        &self,
        source_id: SourceId,
        session_id: &str,
    ) -> Result<IndexStartResult> {
        let conn = self.ctx.connect(source_id).await?;
        let catalog = &self.ctx.catalog;
        let source = conn.source();

        let cleared = catalog.clear_session(source.id, session_id).await?;
        if cleared > 0 {
            debug!(cleared, "Dropped entries of a previous run");
        }
        catalog.ensure_top_folder(source).await?;

        let mut reconciler = FolderReconciler::new(conn.paths().clone(), self.ctx.skip_rules());
        let page_size = self.ctx.config.storage.list_page_size;
        let mut continuation = None;
        let mut pages = 0u32;

        loop {
            let page = conn
                .storage()
                .list_page(conn.bucket(), conn.paths().prefix(), continuation, page_size)
                .await?;
            pages += 1;

            for object in &page.objects {
                if let Some(pending) = reconciler.ingest(object) {
                    let entry = IndexEntry::new(
                        source.id,
                        session_id,
                        pending.offset,
                        pending.uri,
                        pending.size,
                    );
                    catalog.store_index_entry(&entry).await?;
                }
            }

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        let total = reconciler.entry_count();
        let tree = reconciler.into_tree();
        for path in tree.paths() {
            catalog.ensure_folder_by_full_path(source, path).await?;
        }

        let missing_folders = catalog.missing_folders(source.id, &tree).await?;

        info!(
            total,
            pages,
            folders = tree.len(),
            missing = missing_folders.len(),
            "Index session started"
        );

        Ok(IndexStartResult {
            source_id: source.id,
            total,
            missing_folders,
        })
    }

    /// Phase 2: materialize the entry at `offset`
    ///
    /// # Errors
    ///
    /// - [`SyncError::ObjectNotFound`] when the listed object has vanished
    /// - storage and database failures
    #[instrument(skip(self), fields(source_id = %source_id))]
    pub async fn process_index(
        &self,
        source_id: SourceId,
        session_id: &str,
        offset: u32,
    ) -> Result<ProcessOutcome> {
        let catalog = &self.ctx.catalog;
        let artifacts = &self.ctx.artifacts;

        let Some(entry) = catalog.index_entry(source_id, session_id, offset).await? else {
            debug!("No entry at offset; session complete");
            return Ok(ProcessOutcome::Finished);
        };

        let conn = self.ctx.connect(source_id).await?;
        let key = conn.paths().to_remote_key(&entry.uri);
        let remote = conn
            .storage()
            .head(conn.bucket(), &key)
            .await?
            .ok_or_else(|| SyncError::ObjectNotFound { key: key.clone() })?;
        let remote_modified = remote.last_modified.timestamp();

        let Some(mut asset) = catalog
            .index_file(conn.source(), &entry.uri, &self.ctx.config)
            .await?
        else {
            return Ok(ProcessOutcome::Skipped { uri: entry.uri });
        };
        catalog
            .update_index_entry_record_id(entry.id, asset.id)
            .await?;

        asset.size = remote.size;

        if asset.is_image() {
            if artifacts.needs_refresh(&asset, remote_modified).await {
                let download = artifacts.temp_path(asset.extension());
                conn.storage()
                    .download_to(conn.bucket(), &key, &download)
                    .await?;

                if let Some((width, height)) = artifacts.measure(&download).await {
                    asset.width = Some(width);
                    asset.height = Some(height);
                }

                let stored = artifacts
                    .store_local_source(&download, &asset, remote_modified)
                    .await;
                artifacts
                    .queue_source_for_deletion_if_necessary(&download)
                    .await;
                stored?;

                debug!(key = %key, "Refreshed source image");
            } else if asset.date_modified != Some(remote_modified)
                || asset.width.is_none()
                || asset.height.is_none()
            {
                // A previous run cached the original but never saved the record
                let cached = artifacts.source_path(&asset);
                if let Some((width, height)) = artifacts.measure(&cached).await {
                    asset.width = Some(width);
                    asset.height = Some(height);
                }
            }
        }

        asset.date_modified = Some(remote_modified);
        asset.updated_at = self.ctx.clock.unix_timestamp();
        catalog.save_asset(&asset).await?;

        Ok(ProcessOutcome::Indexed(asset.id))
    }
}
