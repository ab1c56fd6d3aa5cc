//! Shared engine dependencies
//!
//! [`SyncContext`] is built once per process and cloned into the indexer and
//! the file operations. It holds no per-source state; connections are opened
//! per unit of work through [`SyncContext::connect`].

use bridge_traits::storage::StorageConnector;
use bridge_traits::time::{Clock, SystemClock};
use core_library::models::SourceId;
use core_runtime::config::EngineConfig;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::artifacts::ArtifactCache;
use crate::catalog::AssetCatalog;
use crate::connection::SourceConnection;
use crate::error::Result;
use crate::reconciler::SkipRules;

#[derive(Clone)]
pub struct SyncContext {
    pub config: Arc<EngineConfig>,
    pub connector: Arc<dyn StorageConnector>,
    pub catalog: Arc<AssetCatalog>,
    pub artifacts: Arc<ArtifactCache>,
    pub clock: Arc<dyn Clock>,
}

impl SyncContext {
    /// Context backed by a metadata pool and the system clock
    pub fn new(
        config: EngineConfig,
        pool: SqlitePool,
        connector: Arc<dyn StorageConnector>,
    ) -> Self {
        Self::with_clock(config, pool, connector, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        pool: SqlitePool,
        connector: Arc<dyn StorageConnector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = AssetCatalog::from_pool(pool);
        let artifacts = ArtifactCache::new(&config, catalog.transforms(), Arc::clone(&clock));

        Self {
            config: Arc::new(config),
            connector,
            catalog: Arc::new(catalog),
            artifacts: Arc::new(artifacts),
            clock,
        }
    }

    /// Load a source and open a connection to it
    pub async fn connect(&self, source_id: SourceId) -> Result<SourceConnection> {
        let source = self.catalog.source(source_id).await?;
        SourceConnection::open(source, self.connector.as_ref())
    }

    /// Skip rules from the configured skip names
    pub fn skip_rules(&self) -> SkipRules {
        SkipRules::new(&self.config.skip_names)
    }
}
