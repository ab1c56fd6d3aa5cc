//! Amazon S3 connector implementation
//!
//! Implements the `ObjectStorage` and `StorageConnector` traits with the AWS SDK.

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use aws_sdk_s3::types::{MetadataDirective, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bridge_traits::error::Result;
use bridge_traits::storage::{
    ListPage, ObjectAcl, ObjectStorage, PutBody, RemoteObject, StorageConnector,
    StorageCredentials, WriteOptions,
};
use chrono::{DateTime, Utc};
use core_runtime::config::StorageClientConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use crate::endpoint::region_for_location;
use crate::error::S3Error;

/// Characters escaped in the `x-amz-copy-source` header; `/` separates key segments
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Builds AWS SDK clients from source credentials
///
/// Every call to [`StorageConnector::connect`] produces an independent client
/// carrying the configured retry and timeout policy.
///
/// # Example
///
/// ```ignore
/// use provider_s3::S3Connector;
/// use bridge_traits::storage::StorageConnector;
///
/// let connector = S3Connector::new(config.storage.clone());
/// let storage = connector.connect(&credentials)?;
/// storage.delete("media", "old.jpg").await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct S3Connector {
    config: StorageClientConfig,
}

impl S3Connector {
    pub fn new(config: StorageClientConfig) -> Self {
        Self { config }
    }

    /// Build a raw SDK client for `credentials`
    ///
    /// A custom endpoint switches the client to path-style addressing, which
    /// S3-compatible services generally require.
    pub fn build_client(&self, credentials: &StorageCredentials) -> crate::error::Result<Client> {
        if credentials.key_id.trim().is_empty() || credentials.secret.trim().is_empty() {
            return Err(S3Error::CredentialsRejected(
                "Access key ID and secret are required".to_string(),
            ));
        }

        let sdk_credentials = Credentials::new(
            credentials.key_id.clone(),
            credentials.secret.clone(),
            None,
            None,
            "asset-source-settings",
        );

        let retry = RetryConfig::standard().with_max_attempts(self.config.max_attempts.max(1));
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(self.config.operation_timeout)
            .connect_timeout(self.config.connect_timeout)
            .build();

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version_latest()
            .region(Region::new(region_for_location(&credentials.location)))
            .credentials_provider(sdk_credentials)
            .retry_config(retry)
            .timeout_config(timeouts);

        if let Some(endpoint) = credentials
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(S3Error::InvalidConfiguration(format!(
                    "Endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Client::from_conf(builder.build()))
    }
}

impl StorageConnector for S3Connector {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Arc<dyn ObjectStorage>> {
        let client = self.build_client(credentials)?;
        debug!(location = %credentials.location, "Built S3 client");
        Ok(Arc::new(S3ObjectStorage::new(client)))
    }
}

/// `ObjectStorage` backed by one SDK client
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: Client,
}

impl S3ObjectStorage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn to_utc(value: Option<&S3DateTime>) -> DateTime<Utc> {
    value
        .and_then(|dt| dt.to_millis().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

fn canned_acl(acl: ObjectAcl) -> Option<ObjectCannedAcl> {
    match acl {
        // Buckets with ACLs disabled reject any explicit grant, so private
        // writes send none.
        ObjectAcl::Private => None,
        ObjectAcl::PublicRead => Some(ObjectCannedAcl::PublicRead),
    }
}

fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(key, COPY_SOURCE_ENCODE_SET))
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    #[instrument(skip(self, continuation), fields(bucket = %bucket, prefix = %prefix))]
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: u32,
    ) -> Result<ListPage> {
        let max_keys = i32::try_from(max_keys.clamp(1, 1000)).unwrap_or(1000);

        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| S3Error::request("ListObjectsV2", e))?;

        let objects: Vec<RemoteObject> = output
            .contents()
            .iter()
            .filter_map(|item| {
                item.key().map(|key| RemoteObject {
                    key: key.to_string(),
                    size: item.size().unwrap_or(0).max(0) as u64,
                    last_modified: to_utc(item.last_modified()),
                })
            })
            .collect();

        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        debug!(
            count = objects.len(),
            has_more = next_token.is_some(),
            "Listed page"
        );

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(RemoteObject {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: to_utc(output.last_modified()),
            })),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);
                if missing {
                    Ok(None)
                } else {
                    Err(S3Error::request("HeadObject", err).into())
                }
            }
        }
    }

    #[instrument(skip(self, target), fields(bucket = %bucket, key = %key))]
    async fn download_to(&self, bucket: &str, key: &str, target: &Path) -> Result<u64> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                return Err(if missing {
                    S3Error::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    S3Error::request("GetObject", err)
                }
                .into());
            }
        };

        let file = tokio::fs::File::create(target).await?;
        let mut writer = BufWriter::new(file);
        let mut body = output.body;
        let mut written: u64 = 0;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| S3Error::request("GetObject", e))?
        {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        writer.flush().await?;
        debug!(bytes = written, "Downloaded object");

        Ok(written)
    }

    #[instrument(skip(self, body, options), fields(bucket = %bucket, key = %key))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: PutBody,
        options: &WriteOptions,
    ) -> Result<()> {
        let stream = match body {
            PutBody::Empty => ByteStream::from(Vec::<u8>::new()),
            PutBody::Bytes(bytes) => ByteStream::from(bytes),
            PutBody::File(path) => ByteStream::from_path(path)
                .await
                .map_err(|e| S3Error::request("PutObject", e))?,
        };

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .set_acl(canned_acl(options.acl))
            .set_cache_control(options.cache_control.clone())
            .send()
            .await
            .map_err(|e| S3Error::request("PutObject", e))?;

        Ok(())
    }

    #[instrument(skip(self, options), fields(from = %source_key, to = %dest_key))]
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        options: &WriteOptions,
    ) -> Result<()> {
        let mut request = self
            .client
            .copy_object()
            .bucket(dest_bucket)
            .key(dest_key)
            .copy_source(copy_source(source_bucket, source_key))
            .set_acl(canned_acl(options.acl));

        if let Some(cache_control) = &options.cache_control {
            request = request
                .metadata_directive(MetadataDirective::Replace)
                .cache_control(cache_control);
        }

        request
            .send()
            .await
            .map_err(|e| S3Error::request("CopyObject", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3Error::request("DeleteObject", e))?;

        Ok(())
    }
}
