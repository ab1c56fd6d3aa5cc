//! # Derived Artifact Cache
//!
//! Local on-disk cache of downloaded source images and generated transforms,
//! plus the remote side of transforms (publishing and existence probes).
//!
//! ## Overview
//!
//! Every artifact is addressed by `(file id, variant)`:
//!
//! - [`ArtifactVariant::Source`] lives at `<cache>/sources/<file id>.<ext>`
//! - [`ArtifactVariant::Transform`] lives at `<cache>/transforms/<location>/<file id>.<ext>`
//!
//! An artifact is valid while its modification time is not older than the
//! file record's `date_modified`. A cached original is stamped with the remote
//! object's modification time, so it stays fresh until the remote object
//! changes. Nothing here runs an expiry clock.
//!
//! Remote transforms are stored next to their file, under a sub-folder named
//! after the transform: `prefix + folder path + location/filename`.

use bridge_traits::storage::PutBody;
use bridge_traits::time::Clock;
use core_library::models::{Asset, Folder, TransformIndex};
use core_library::repositories::TransformIndexRepository;
use core_runtime::config::EngineConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::connection::SourceConnection;
use crate::error::{Result, SyncError};
use crate::paths::transform_subpath;

/// Kind of locally cached artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactVariant {
    /// Downloaded copy of the original
    Source,
    /// Generated transform, by location handle
    Transform(String),
}

/// Local artifact cache and transform registrar
pub struct ArtifactCache {
    source_dir: PathBuf,
    transform_dir: PathBuf,
    temp_dir: PathBuf,
    keep_sources: bool,
    transforms: Arc<dyn TransformIndexRepository>,
    clock: Arc<dyn Clock>,
}

impl ArtifactCache {
    pub fn new(
        config: &EngineConfig,
        transforms: Arc<dyn TransformIndexRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source_dir: config.source_cache_dir(),
            transform_dir: config.transform_cache_dir(),
            temp_dir: config.temp_dir(),
            keep_sources: config.max_cached_image_size > 0,
            transforms,
            clock,
        }
    }

    // =========================================================================
    // Local artifacts
    // =========================================================================

    /// Cache path of an artifact
    pub fn artifact_path(&self, asset: &Asset, variant: &ArtifactVariant) -> PathBuf {
        let name = match asset.extension() {
            "" => asset.id.to_string(),
            ext => format!("{}.{}", asset.id, ext.to_lowercase()),
        };

        match variant {
            ArtifactVariant::Source => self.source_dir.join(name),
            ArtifactVariant::Transform(location) => self.transform_dir.join(location).join(name),
        }
    }

    /// Fresh path for a throwaway download
    pub fn temp_path(&self, extension: &str) -> PathBuf {
        let name = uuid::Uuid::new_v4().to_string();
        if extension.is_empty() {
            self.temp_dir.join(name)
        } else {
            self.temp_dir.join(format!("{}.{}", name, extension.to_lowercase()))
        }
    }

    /// Cache path of the downloaded original
    pub fn source_path(&self, asset: &Asset) -> PathBuf {
        self.artifact_path(asset, &ArtifactVariant::Source)
    }

    /// Whether a cached artifact exists and is not older than the record
    pub async fn is_valid(&self, asset: &Asset, variant: &ArtifactVariant) -> bool {
        let Some(cached) = cached_mtime(&self.artifact_path(asset, variant)).await else {
            return false;
        };

        asset
            .date_modified
            .map_or(true, |date_modified| cached >= date_modified)
    }

    /// Whether the original must be downloaded again for a remote timestamp
    ///
    /// Only the cached copy is consulted: a copy stamped at or after
    /// `remote_modified` is current even if the record was never updated.
    pub async fn needs_refresh(&self, asset: &Asset, remote_modified: i64) -> bool {
        cached_mtime(&self.source_path(asset))
            .await
            .map_or(true, |cached| cached < remote_modified)
    }

    /// Pixel dimensions of a local image, `None` if it cannot be decoded
    pub async fn measure(&self, path: &Path) -> Option<(u32, u32)> {
        let target = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || image::image_dimensions(&target)).await;

        match result {
            Ok(Ok(dimensions)) => Some(dimensions),
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Could not measure image");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image measurement task failed");
                None
            }
        }
    }

    /// Keep a downloaded original as the cached source of `asset`
    ///
    /// The copy is stamped with `remote_modified`. Returns the cache path, or
    /// `None` when source copies are not kept.
    pub async fn store_local_source(
        &self,
        downloaded: &Path,
        asset: &Asset,
        remote_modified: i64,
    ) -> Result<Option<PathBuf>> {
        if !self.keep_sources {
            return Ok(None);
        }

        let target = self.source_path(asset);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(downloaded, &target).await?;
        stamp_mtime(&target, remote_modified).await?;
        debug!(asset_id = %asset.id, path = %target.display(), "Stored local source");
        Ok(Some(target))
    }

    /// Follow a record whose filename changed with its cached original
    ///
    /// The cache is keyed by extension, so a rename that changes it would
    /// otherwise orphan the copy.
    pub async fn rename_local_source(&self, before: &Asset, after: &Asset) -> Result<()> {
        let from = self.source_path(before);
        let to = self.source_path(after);
        if from == to {
            return Ok(());
        }

        match tokio::fs::rename(&from, &to).await {
            Ok(()) => {
                debug!(asset_id = %after.id, path = %to.display(), "Renamed local source");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a throwaway download; failures are logged and ignored
    pub async fn queue_source_for_deletion_if_necessary(&self, path: &Path) {
        if let Err(e) = remove_if_exists(path).await {
            warn!(path = %path.display(), error = %e, "Could not remove temporary source");
        }
    }

    // =========================================================================
    // Transform indexes
    // =========================================================================

    /// Transforms of a file that have actually been generated
    pub async fn created_transforms(&self, asset: &Asset) -> Result<Vec<TransformIndex>> {
        let indexes = self.transforms.list_for_asset(asset.id).await?;
        Ok(indexes.into_iter().filter(|index| index.file_exists).collect())
    }

    /// Path of a transform relative to its file's folder
    pub fn transform_subpath(&self, asset: &Asset, index: &TransformIndex) -> String {
        let filename = match index.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => asset.filename.as_str(),
        };
        transform_subpath(&index.location, filename)
    }

    pub async fn store_transform_index(&self, index: &TransformIndex) -> Result<i64> {
        Ok(self.transforms.save(index).await?)
    }

    /// Drop every transform of a file: remote objects, index rows and local copies
    ///
    /// Remote deletes are best-effort.
    #[instrument(skip(self, conn, folder, asset), fields(asset_id = %asset.id))]
    pub async fn delete_all_transform_data(
        &self,
        conn: &SourceConnection,
        folder: &Folder,
        asset: &Asset,
    ) -> Result<()> {
        let indexes = self.transforms.list_for_asset(asset.id).await?;

        for index in &indexes {
            if index.file_exists {
                let key = conn
                    .paths()
                    .file_key(&folder.path, &self.transform_subpath(asset, index));
                if let Err(e) = conn.storage().delete(conn.bucket(), &key).await {
                    warn!(key = %key, error = %e, "Could not delete transform");
                }
            }

            let variant = ArtifactVariant::Transform(index.location.clone());
            remove_if_exists(&self.artifact_path(asset, &variant)).await?;
        }

        self.transforms.delete_for_asset(asset.id).await?;
        remove_if_exists(&self.source_path(asset)).await?;

        debug!(count = indexes.len(), "Deleted transform data");
        Ok(())
    }

    // =========================================================================
    // Remote transforms
    // =========================================================================

    /// Publish a generated transform next to its file
    ///
    /// Written public-read, with `Cache-Control` when the source sets an
    /// expiry. Returns the key written.
    #[instrument(
        skip(self, conn, folder, asset, index, transform),
        fields(asset_id = %asset.id, location = %index.location)
    )]
    pub async fn put_image_transform(
        &self,
        conn: &SourceConnection,
        folder: &Folder,
        asset: &Asset,
        index: &TransformIndex,
        transform: &Path,
    ) -> Result<String> {
        if index.location.is_empty() {
            return Err(SyncError::CorruptedSetting(format!(
                "transform index {} has no location",
                index.id
            )));
        }

        let key = conn
            .paths()
            .file_key(&folder.path, &self.transform_subpath(asset, index));
        let options = conn.upload_options(self.clock.now());

        conn.storage()
            .put(
                conn.bucket(),
                &key,
                PutBody::File(transform.to_path_buf()),
                &options,
            )
            .await?;

        debug!(key = %key, "Published transform");
        Ok(key)
    }

    /// Whether a transform of `asset` exists remotely for `location`
    pub async fn transform_exists(
        &self,
        conn: &SourceConnection,
        folder: &Folder,
        asset: &Asset,
        location: &str,
    ) -> Result<bool> {
        let key = conn
            .paths()
            .file_key(&folder.path, &transform_subpath(location, &asset.filename));
        Ok(conn.storage().head(conn.bucket(), &key).await?.is_some())
    }
}

async fn cached_mtime(path: &Path) -> Option<i64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let since_epoch = metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_secs() as i64)
}

async fn stamp_mtime(path: &Path, unix_seconds: i64) -> io::Result<()> {
    let path = path.to_path_buf();
    let stamp = UNIX_EPOCH + Duration::from_secs(unix_seconds.max(0) as u64);
    tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(stamp)
    })
    .await
    .map_err(io::Error::other)?
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
