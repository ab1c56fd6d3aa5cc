//! Object Storage Abstractions
//!
//! Provides the contract for flat key/value object stores (Amazon S3 and
//! S3-compatible services) together with the connector used to build one
//! client per unit of work.
//!
//! Every call names its bucket explicitly. A client is never bound to a single
//! bucket, which is what makes cross-bucket copies between two sources that
//! share credentials possible.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Object returned by a listing or an existence probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full key, including any source prefix
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time reported by the store
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects in store order (lexicographic by key)
    pub objects: Vec<RemoteObject>,
    /// Continuation token for the next page, `None` when the listing is complete
    pub next_token: Option<String>,
}

/// Payload written by [`ObjectStorage::put`]
#[derive(Debug, Clone)]
pub enum PutBody {
    /// Zero-length object (folder markers)
    Empty,
    /// In-memory bytes
    Bytes(Bytes),
    /// Contents of a local file
    File(PathBuf),
}

impl PutBody {
    pub fn is_empty(&self) -> bool {
        match self {
            PutBody::Empty => true,
            PutBody::Bytes(bytes) => bytes.is_empty(),
            PutBody::File(_) => false,
        }
    }
}

/// Canned access control applied when writing an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectAcl {
    #[default]
    Private,
    PublicRead,
}

/// Options applied to writes (put and copy)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub acl: ObjectAcl,
    /// Value for the `Cache-Control` header, if any
    pub cache_control: Option<String>,
}

impl WriteOptions {
    /// Publicly readable object without caching headers
    pub fn public_read() -> Self {
        Self {
            acl: ObjectAcl::PublicRead,
            cache_control: None,
        }
    }

    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }
}

/// Object store client trait
///
/// Implementations wrap a concrete store and are expected to apply the
/// caller-configured timeouts and transient-error retries themselves.
///
/// # Semantics
///
/// - `list_page` is a *non-delimited* prefix listing: every key under the
///   prefix is returned regardless of depth.
/// - `head` returns `Ok(None)` for a missing object.
/// - `delete` of a missing object succeeds.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{ObjectStorage, WriteOptions, PutBody};
///
/// async fn publish(store: &dyn ObjectStorage) -> Result<()> {
///     if store.head("media", "photos/cat.jpg").await?.is_none() {
///         store
///             .put("media", "photos/cat.jpg", PutBody::File("cat.jpg".into()), &WriteOptions::public_read())
///             .await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// List one page of objects under `prefix`
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: u32,
    ) -> Result<ListPage>;

    /// List every object under `prefix`, following continuation tokens
    ///
    /// Prefer paging through [`list_page`](Self::list_page) for large buckets.
    async fn list_all(&self, bucket: &str, prefix: &str, max_keys: u32) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut continuation = None;

        loop {
            let page = self.list_page(bucket, prefix, continuation, max_keys).await?;
            objects.extend(page.objects);

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(objects)
    }

    /// Fetch object metadata, `None` if the object does not exist
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>>;

    /// Download an object to a local file, creating parent directories
    ///
    /// Returns the number of bytes written.
    async fn download_to(&self, bucket: &str, key: &str, target: &Path) -> Result<u64>;

    /// Write an object
    async fn put(&self, bucket: &str, key: &str, body: PutBody, options: &WriteOptions)
        -> Result<()>;

    /// Server-side copy, possibly across buckets reachable with the same credentials
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        options: &WriteOptions,
    ) -> Result<()>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Credentials and endpoint hints needed to build an [`ObjectStorage`] client
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub key_id: String,
    pub secret: String,
    /// Store location, e.g. `US`, `EU` or a region name
    pub location: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .field("location", &self.location)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Builds a fresh client for each unit of work
///
/// There is no shared client handle: every index step or file operation asks
/// the connector for a client built from the settings it is working with.
pub trait StorageConnector: Send + Sync {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Arc<dyn ObjectStorage>>;
}
