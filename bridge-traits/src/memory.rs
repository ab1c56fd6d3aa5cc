//! In-memory object store
//!
//! [`InMemoryObjectStorage`] keeps buckets in ordered maps so listings come back
//! in the same lexicographic key order as S3. It is meant for tests and local
//! development; [`InMemoryConnector`] hands the same store to every unit of
//! work regardless of the credentials presented.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BridgeError, Result};
use crate::storage::{
    ListPage, ObjectStorage, PutBody, RemoteObject, StorageConnector, StorageCredentials,
    WriteOptions,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    options: WriteOptions,
}

impl StoredObject {
    fn describe(&self, key: &str) -> RemoteObject {
        RemoteObject {
            key: key.to_string(),
            size: self.data.len() as u64,
            last_modified: self.last_modified,
        }
    }
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

/// Thread-safe in-memory implementation of [`ObjectStorage`]
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    buckets: Mutex<Buckets>,
    downloads: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bucket (no-op if it exists)
    pub fn create_bucket(&self, bucket: &str) {
        self.lock().entry(bucket.to_string()).or_default();
    }

    /// Seed an object with an explicit modification time
    pub fn insert_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) {
        self.lock().entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
                options: WriteOptions::default(),
            },
        );
    }

    /// All keys of a bucket in lexicographic order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
    }

    /// Options the object was last written with
    pub fn write_options(&self, bucket: &str, key: &str) -> Option<WriteOptions> {
        self.lock()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.options.clone())
    }

    /// Number of completed `download_to` calls
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Make every subsequent `delete` fail, to exercise best-effort paths
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn missing_bucket(bucket: &str) -> BridgeError {
        BridgeError::OperationFailed(format!("NoSuchBucket: {}", bucket))
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: u32,
    ) -> Result<ListPage> {
        let buckets = self.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;

        let lower = match continuation {
            Some(token) => Bound::Excluded(token),
            None => Bound::Included(prefix.to_string()),
        };

        let limit = max_keys.max(1) as usize;
        let mut page: Vec<RemoteObject> = objects
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit + 1)
            .map(|(key, object)| object.describe(key))
            .collect();

        let next_token = if page.len() > limit {
            page.truncate(limit);
            page.last().map(|object| object.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>> {
        let buckets = self.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;
        Ok(objects.get(key).map(|object| object.describe(key)))
    }

    async fn download_to(&self, bucket: &str, key: &str, target: &Path) -> Result<u64> {
        let data = self
            .object_data(bucket, key)
            .ok_or_else(|| BridgeError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, &data).await?;

        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(data.len() as u64)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: PutBody,
        options: &WriteOptions,
    ) -> Result<()> {
        let data = match body {
            PutBody::Empty => Bytes::new(),
            PutBody::Bytes(bytes) => bytes,
            PutBody::File(path) => Bytes::from(tokio::fs::read(&path).await?),
        };

        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        options: &WriteOptions,
    ) -> Result<()> {
        let mut buckets = self.lock();
        let data = buckets
            .get(source_bucket)
            .ok_or_else(|| Self::missing_bucket(source_bucket))?
            .get(source_key)
            .map(|object| object.data.clone())
            .ok_or_else(|| BridgeError::NotFound {
                bucket: source_bucket.to_string(),
                key: source_key.to_string(),
            })?;

        let objects = buckets
            .get_mut(dest_bucket)
            .ok_or_else(|| Self::missing_bucket(dest_bucket))?;
        objects.insert(
            dest_key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(format!(
                "AccessDenied: delete {}/{}",
                bucket, key
            )));
        }

        let mut buckets = self.lock();
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}

/// Connector returning one shared [`InMemoryObjectStorage`]
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    storage: Arc<InMemoryObjectStorage>,
    connections: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    pub fn new(storage: Arc<InMemoryObjectStorage>) -> Self {
        Self {
            storage,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn storage(&self) -> Arc<InMemoryObjectStorage> {
        Arc::clone(&self.storage)
    }

    /// Number of clients handed out so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl StorageConnector for InMemoryConnector {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Arc<dyn ObjectStorage>> {
        if credentials.key_id.is_empty() || credentials.secret.is_empty() {
            return Err(BridgeError::CredentialsRejected(
                "missing key id or secret".to_string(),
            ));
        }

        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(self.storage.clone() as Arc<dyn ObjectStorage>)
    }
}
