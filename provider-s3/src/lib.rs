//! # Amazon S3 Provider
//!
//! Implements the `ObjectStorage` and `StorageConnector` bridge traits on top
//! of the AWS SDK.
//!
//! ## Overview
//!
//! This module provides:
//! - Client construction from source credentials with configured retries and timeouts
//! - Paginated, non-delimited prefix listings
//! - Streaming downloads, uploads, server-side copies and deletes
//! - Legacy location to endpoint mapping used for public URL prefixes
//! - Bucket discovery for a set of credentials
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::StorageClientConfig;
//! use provider_s3::S3Connector;
//!
//! let connector = S3Connector::new(StorageClientConfig::default());
//! let storage = connector.connect(&settings.credentials())?;
//! let page = storage.list_page("media", "site/", None, 1000).await?;
//! ```

pub mod buckets;
pub mod connector;
pub mod endpoint;
pub mod error;

pub use buckets::{build_bucket_list, list_buckets, BucketInfo};
pub use connector::{S3Connector, S3ObjectStorage};
pub use endpoint::{bucket_url_prefix, endpoint_for_location, region_for_location};
pub use error::{Result, S3Error};
