//! # Source Connections
//!
//! A [`SourceConnection`] bundles everything one unit of work needs to talk
//! to a remote source: the decoded settings, the path translator for its key
//! prefix, and a storage client built from its credentials.
//!
//! ## Overview
//!
//! No client outlives the step that opened it. Each index step and each file
//! operation calls [`SourceConnection::open`], which decodes the settings
//! stored on the source record and asks the [`StorageConnector`] for a fresh
//! client. Two concurrent steps against different sources never share state.

use bridge_traits::storage::{ObjectStorage, StorageConnector, WriteOptions};
use chrono::{DateTime, Utc};
use core_library::models::{Source, SourceKind, SourceSettings};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{Result, SyncError};
use crate::expiry::cache_control_header;
use crate::paths::PathTranslator;

/// Decode the settings of a remote source
///
/// # Errors
///
/// - [`SyncError::CorruptedSetting`] when the stored document is `null`
/// - [`SyncError::Configuration`] when it is malformed or misses required values
pub fn settings_for(source: &Source) -> Result<SourceSettings> {
    if source.settings.is_null() {
        error!(source_id = %source.id, "Source settings are null; refusing to continue");
        return Err(SyncError::CorruptedSetting(format!(
            "settings of source {} are null",
            source.id
        )));
    }

    SourceSettings::from_value(&source.settings).map_err(SyncError::Configuration)
}

/// Per-unit-of-work handle to a remote source
#[derive(Clone)]
pub struct SourceConnection {
    source: Source,
    settings: SourceSettings,
    paths: PathTranslator,
    storage: Arc<dyn ObjectStorage>,
}

impl fmt::Debug for SourceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConnection")
            .field("source_id", &self.source.id)
            .field("settings", &self.settings)
            .field("prefix", &self.paths.prefix())
            .finish()
    }
}

impl SourceConnection {
    /// Validate the source settings and build a storage client for them
    pub fn open(source: Source, connector: &dyn StorageConnector) -> Result<Self> {
        if source.kind != SourceKind::S3 {
            return Err(SyncError::Configuration(format!(
                "source {} is not a remote source",
                source.id
            )));
        }

        let settings = settings_for(&source)?;
        let storage = connector.connect(&settings.credentials())?;
        let paths = PathTranslator::new(&settings.subfolder);

        debug!(source_id = %source.id, bucket = %settings.bucket, "Opened source connection");

        Ok(Self {
            source,
            settings,
            paths,
            storage,
        })
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    pub fn paths(&self) -> &PathTranslator {
        &self.paths
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }

    /// Public URL of the source root: `urlPrefix + prefix`
    pub fn base_url(&self) -> String {
        format!("{}{}", self.settings.url_prefix, self.paths.prefix())
    }

    /// S3 sources always keep their originals off-host
    pub fn is_remote(&self) -> bool {
        self.source.kind.is_remote()
    }

    /// Whether files can be copied server-side from `other` into this source
    ///
    /// Requires the same backend and the same account credentials.
    pub fn can_move_file_from(&self, other: &SourceConnection) -> bool {
        self.source.kind == other.source.kind
            && self.settings.shares_credentials_with(&other.settings)
    }

    /// Options for publicly visible uploads, with `Cache-Control` when the
    /// source configures an expiry
    pub fn upload_options(&self, now: DateTime<Utc>) -> WriteOptions {
        let options = WriteOptions::public_read();
        match cache_control_header(&self.settings.expires, now) {
            Some(header) => options.with_cache_control(header),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::memory::{InMemoryConnector, InMemoryObjectStorage};
    use bridge_traits::storage::ObjectAcl;
    use chrono::TimeZone;

    fn settings(key_id: &str) -> SourceSettings {
        SourceSettings {
            key_id: key_id.to_string(),
            secret: "super-secret".to_string(),
            bucket: "media".to_string(),
            location: "US".to_string(),
            url_prefix: "http://s3.amazonaws.com/media/".to_string(),
            subfolder: "site".to_string(),
            expires: "1 hour".to_string(),
            endpoint: None,
        }
    }

    fn connector() -> InMemoryConnector {
        InMemoryConnector::new(Arc::new(InMemoryObjectStorage::new()))
    }

    #[test]
    fn test_open_builds_prefix_and_base_url() {
        let source = Source::s3("Media", &settings("AKIA1"));
        let conn = SourceConnection::open(source, &connector()).unwrap();

        assert_eq!(conn.paths().prefix(), "site/");
        assert_eq!(conn.base_url(), "http://s3.amazonaws.com/media/site/");
        assert_eq!(conn.bucket(), "media");
        assert!(conn.is_remote());
    }

    #[test]
    fn test_null_settings_are_corruption() {
        let source = Source::new("Broken", SourceKind::S3, serde_json::Value::Null);
        assert!(matches!(
            SourceConnection::open(source, &connector()),
            Err(SyncError::CorruptedSetting(_))
        ));
    }

    #[test]
    fn test_missing_settings_are_configuration_errors() {
        let source = Source::new(
            "Partial",
            SourceKind::S3,
            serde_json::json!({ "keyId": "AKIA1", "bucket": "media" }),
        );

        let err = SourceConnection::open(source, &connector()).unwrap_err();
        match err {
            SyncError::Configuration(message) => {
                assert!(message.contains("secret"));
                assert!(message.contains("urlPrefix"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_local_source_is_rejected() {
        let source = Source::new("Disk", SourceKind::Local, serde_json::json!({}));
        assert!(matches!(
            SourceConnection::open(source, &connector()),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_move_eligibility_requires_same_credentials() {
        let connector = connector();
        let a = SourceConnection::open(Source::s3("A", &settings("AKIA1")), &connector).unwrap();
        let b = SourceConnection::open(Source::s3("B", &settings("AKIA1")), &connector).unwrap();
        let c = SourceConnection::open(Source::s3("C", &settings("AKIA2")), &connector).unwrap();

        assert!(a.can_move_file_from(&b));
        assert!(!a.can_move_file_from(&c));
    }

    #[test]
    fn test_upload_options_carry_cache_control() {
        let conn = SourceConnection::open(Source::s3("Media", &settings("AKIA1")), &connector())
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let options = conn.upload_options(now);
        assert_eq!(options.acl, ObjectAcl::PublicRead);
        assert_eq!(
            options.cache_control.as_deref(),
            Some("max-age=3600, must-revalidate")
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let conn = SourceConnection::open(Source::s3("Media", &settings("AKIA1")), &connector())
            .unwrap();
        assert!(!format!("{:?}", conn).contains("super-secret"));
    }
}
