//! Bucket discovery for a set of credentials
//!
//! Used when configuring a new source: the caller supplies an access key and
//! secret and gets back every bucket they can see, with its location and the
//! public URL prefix to suggest.

use bridge_traits::storage::StorageCredentials;
use tracing::{info, instrument, warn};

use crate::connector::S3Connector;
use crate::endpoint::bucket_url_prefix;
use crate::error::{Result, S3Error};

/// Bucket visible to a set of credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub bucket: String,
    /// `US`, `EU` or a region name
    pub location: String,
    /// `http://<endpoint>/<bucket>/`
    pub url_prefix: String,
}

/// Assemble bucket descriptions from `(name, location)` pairs
///
/// # Errors
///
/// An empty list means the credentials were not accepted.
pub fn build_bucket_list(entries: Vec<(String, String)>) -> Result<Vec<BucketInfo>> {
    if entries.is_empty() {
        return Err(S3Error::CredentialsRejected(
            "No buckets returned for these credentials".to_string(),
        ));
    }

    Ok(entries
        .into_iter()
        .map(|(bucket, location)| BucketInfo {
            url_prefix: bucket_url_prefix(&location, &bucket),
            bucket,
            location,
        })
        .collect())
}

/// List the buckets reachable with `credentials`
///
/// Any failure of the bucket listing itself is reported as rejected
/// credentials; location lookups that fail fall back to `US`.
#[instrument(skip_all, fields(location = %credentials.location))]
pub async fn list_buckets(
    connector: &S3Connector,
    credentials: &StorageCredentials,
) -> Result<Vec<BucketInfo>> {
    let client = connector.build_client(credentials)?;

    let output = client.list_buckets().send().await.map_err(|e| {
        warn!(error = %aws_sdk_s3::error::DisplayErrorContext(&e), "Bucket listing failed");
        S3Error::CredentialsRejected("The bucket listing was refused".to_string())
    })?;

    let mut entries = Vec::new();
    for bucket in output.buckets() {
        let Some(name) = bucket.name() else {
            continue;
        };

        let location = match client.get_bucket_location().bucket(name).send().await {
            Ok(location) => location
                .location_constraint()
                .map(|constraint| constraint.as_str().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "US".to_string()),
            Err(e) => {
                warn!(
                    bucket = %name,
                    error = %aws_sdk_s3::error::DisplayErrorContext(&e),
                    "Could not resolve bucket location"
                );
                "US".to_string()
            }
        };

        entries.push((name.to_string(), location));
    }

    let buckets = build_bucket_list(entries)?;
    info!(count = buckets.len(), "Listed buckets");
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::config::StorageClientConfig;
    use std::time::Duration;

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(matches!(
            build_bucket_list(Vec::new()),
            Err(S3Error::CredentialsRejected(_))
        ));
    }

    #[test]
    fn test_bucket_list_prefixes() {
        let buckets = build_bucket_list(vec![
            ("media".to_string(), "US".to_string()),
            ("archive".to_string(), "EU".to_string()),
        ])
        .unwrap();

        assert_eq!(buckets[0].url_prefix, "http://s3.amazonaws.com/media/");
        assert_eq!(buckets[1].location, "EU");
        assert_eq!(
            buckets[1].url_prefix,
            "http://s3-eu-west-1.amazonaws.com/archive/"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_rejects_credentials() {
        let connector = S3Connector::new(StorageClientConfig {
            max_attempts: 1,
            operation_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            list_page_size: 1000,
        });
        let credentials = StorageCredentials {
            key_id: "AKIAEXAMPLE".to_string(),
            secret: "secret".to_string(),
            location: "US".to_string(),
            endpoint: Some("http://127.0.0.1:1".to_string()),
        };

        let result = list_buckets(&connector, &credentials).await;
        assert!(matches!(result, Err(S3Error::CredentialsRejected(_))));
    }
}
