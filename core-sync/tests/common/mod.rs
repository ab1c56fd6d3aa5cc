//! Shared fixtures for the sync integration tests
//!
//! Every test gets its own in-memory metadata pool, cache directory and
//! in-memory bucket, wired together through a [`SyncContext`] with a manual
//! clock.

#![allow(dead_code)]

use bridge_traits::memory::{InMemoryConnector, InMemoryObjectStorage};
use bridge_traits::time::{Clock, ManualClock};
use chrono::{DateTime, TimeZone, Utc};
use core_library::db::create_test_pool;
use core_library::models::{Asset, Folder, Source, SourceSettings};
use core_library::repositories::{SourceRepository, SqliteSourceRepository};
use core_runtime::config::EngineConfig;
use core_sync::{
    FileOperations, IndexSessionManager, IndexStartResult, MergeState, ProcessOutcome,
    SyncContext,
};
use image::{ImageFormat, RgbImage};
use sqlx::SqlitePool;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

pub const BUCKET: &str = "media";
pub const SESSION: &str = "session-1";

/// Fixed time objects are seeded with unless a test says otherwise
pub fn seeded_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn settings(bucket: &str, subfolder: &str, expires: &str) -> SourceSettings {
    SourceSettings {
        key_id: "AKIATEST".to_string(),
        secret: "test-secret".to_string(),
        bucket: bucket.to_string(),
        location: "us-east-1".to_string(),
        url_prefix: format!("https://{}.example.com/", bucket),
        subfolder: subfolder.to_string(),
        expires: expires.to_string(),
        endpoint: None,
    }
}

/// PNG-encoded image of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .unwrap();
    data
}

pub struct TestEnv {
    pub ctx: SyncContext,
    pub store: Arc<InMemoryObjectStorage>,
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub source: Source,
    cache: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::build(settings(BUCKET, "", ""), 1000).await
    }

    pub async fn with_settings(settings: SourceSettings) -> Self {
        Self::build(settings, 1000).await
    }

    pub async fn with_page_size(page_size: u32) -> Self {
        Self::build(settings(BUCKET, "", ""), page_size).await
    }

    async fn build(settings: SourceSettings, page_size: u32) -> Self {
        let cache = TempDir::new().unwrap();
        let config = EngineConfig::builder()
            .database_path(cache.path().join("metadata.db"))
            .cache_dir(cache.path().join("cache"))
            .list_page_size(page_size)
            .build()
            .unwrap();

        let pool = create_test_pool().await.unwrap();
        let store = Arc::new(InMemoryObjectStorage::new());
        store.create_bucket(&settings.bucket);

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ));
        let connector = Arc::new(InMemoryConnector::new(Arc::clone(&store)));
        let ctx = SyncContext::with_clock(config, pool.clone(), connector, clock.clone());

        let source = Source::s3("Media", &settings);
        SqliteSourceRepository::new(pool.clone())
            .insert(&source)
            .await
            .unwrap();

        Self {
            ctx,
            store,
            pool,
            clock,
            source,
            cache,
        }
    }

    /// Register another source sharing the same in-memory store
    pub async fn add_source(&self, name: &str, settings: SourceSettings) -> Source {
        self.store.create_bucket(&settings.bucket);
        let source = Source::s3(name, &settings);
        SqliteSourceRepository::new(self.pool.clone())
            .insert(&source)
            .await
            .unwrap();
        source
    }

    pub fn seed(&self, key: &str, data: impl Into<bytes::Bytes>) {
        self.store.insert_object(BUCKET, key, data, seeded_time());
    }

    pub fn seed_at(&self, key: &str, data: impl Into<bytes::Bytes>, at: DateTime<Utc>) {
        self.store.insert_object(BUCKET, key, data, at);
    }

    pub fn clock_now(&self) -> i64 {
        self.clock.unix_timestamp()
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys(BUCKET)
    }

    pub fn indexer(&self) -> IndexSessionManager {
        IndexSessionManager::new(self.ctx.clone())
    }

    pub fn operations(&self) -> FileOperations {
        FileOperations::new(self.ctx.clone(), Arc::new(MergeState::default()))
    }

    /// Run a full session for the primary source
    pub async fn index_all(&self) -> IndexStartResult {
        self.index_source(&self.source).await
    }

    pub async fn index_source(&self, source: &Source) -> IndexStartResult {
        let indexer = self.indexer();
        let started = indexer.start_index(source.id, SESSION).await.unwrap();

        let mut offset = 0;
        loop {
            let outcome = indexer
                .process_index(source.id, SESSION, offset)
                .await
                .unwrap();
            if outcome == ProcessOutcome::Finished {
                break;
            }
            offset += 1;
        }
        assert_eq!(offset, started.total);

        started
    }

    pub async fn folder(&self, path: &str) -> Folder {
        self.folder_of(&self.source, path).await
    }

    pub async fn folder_of(&self, source: &Source, path: &str) -> Folder {
        self.ctx
            .catalog
            .find_folder_by_path(source.id, path)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("folder {:?} not indexed", path))
    }

    pub async fn asset(&self, folder_path: &str, filename: &str) -> Option<Asset> {
        let folder = self.folder(folder_path).await;
        self.ctx
            .catalog
            .find_asset_in_folder(folder.id, filename)
            .await
            .unwrap()
    }

    /// Write a local file to upload
    pub fn local_file(&self, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = self.cache.path().join("uploads").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        path
    }
}
