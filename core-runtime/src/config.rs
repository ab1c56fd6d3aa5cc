//! # Engine Configuration Module
//!
//! Provides configuration management for the asset synchronization engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `EngineConfig` holding the settings shared by every source: where the
//! metadata database and local artifact cache live, which file types may be
//! uploaded, which system files are ignored while indexing, and how the
//! object store client times out and retries.
//!
//! Per-source settings (bucket, credentials, key prefix, expiry) are not part
//! of this struct; they live on each source record.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .database_path("/var/lib/cms/assets.db")
//!     .cache_dir("/var/cache/cms/assets")
//!     .max_attempts(5)
//!     .operation_timeout(Duration::from_secs(120))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! `build()` fails fast with [`Error::Config`] naming the offending field:
//!
//! ```should_panic
//! use core_runtime::config::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .database_path("/path/to/assets.db")
//!     .build()
//!     .expect("Should fail - missing cache directory");
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// File extensions accepted on upload unless overridden
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "7z", "aiff", "asf", "avi", "bmp", "csv", "doc", "docx", "flv", "gif", "gz", "gzip", "htm",
    "html", "jp2", "jpe", "jpeg", "jpg", "m2t", "m4a", "m4v", "mid", "mkv", "mov", "mp3", "mp4",
    "mpeg", "mpg", "odp", "ods", "odt", "oga", "ogg", "ogv", "pdf", "png", "pps", "ppsx", "ppt",
    "pptx", "qt", "rar", "rtf", "svg", "tar", "tgz", "tif", "tiff", "txt", "wav", "webm", "webp",
    "wma", "wmv", "xls", "xlsx", "xml", "zip",
];

/// Names skipped while indexing; a trailing `*` matches any suffix
pub const DEFAULT_SKIP_NAMES: &[&str] = &["Thumbs.db", "__MACOSX", ".DS_Store", ".svn", ".git", ".ht*"];

/// Object store client tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClientConfig {
    /// Total attempts per request, including the first (1 disables retries)
    pub max_attempts: u32,
    /// Upper bound for one operation, including retries
    pub operation_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Keys requested per listing page (the S3 maximum is 1000)
    pub list_page_size: u32,
}

impl Default for StorageClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            operation_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            list_page_size: 1000,
        }
    }
}

/// Engine-wide configuration
///
/// Use [`EngineConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the SQLite metadata database
    pub database_path: PathBuf,

    /// Root of the local derived-artifact cache
    pub cache_dir: PathBuf,

    /// Lowercase extensions accepted on upload
    pub allowed_extensions: BTreeSet<String>,

    /// System and hidden names excluded from indexing
    pub skip_names: Vec<String>,

    /// Largest dimension kept for local source copies; 0 disables keeping them
    pub max_cached_image_size: u32,

    /// Object store client settings
    pub storage: StorageClientConfig,
}

impl EngineConfig {
    /// Creates a new builder for constructing an `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Directory holding downloaded source images, `<cache_dir>/sources`
    pub fn source_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("sources")
    }

    /// Directory holding locally generated transforms, `<cache_dir>/transforms`
    pub fn transform_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("transforms")
    }

    /// Directory for throwaway local copies, `<cache_dir>/temp`
    pub fn temp_dir(&self) -> PathBuf {
        self.cache_dir.join("temp")
    }

    /// Whether `extension` (any case, no leading dot) may be uploaded
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .contains(&extension.trim_start_matches('.').to_lowercase())
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path and cache directory are not empty
    /// - At least one extension is allowed
    /// - Storage attempts, timeouts and page size are usable
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.allowed_extensions.is_empty() {
            return Err(Error::Config(
                "At least one file extension must be allowed".to_string(),
            ));
        }

        if self.storage.max_attempts == 0 {
            return Err(Error::Config(
                "Storage max attempts must be at least 1".to_string(),
            ));
        }

        if self.storage.operation_timeout.is_zero() || self.storage.connect_timeout.is_zero() {
            return Err(Error::Config(
                "Storage timeouts must be greater than zero".to_string(),
            ));
        }

        if !(1..=1000).contains(&self.storage.list_page_size) {
            return Err(Error::Config(
                "List page size must be between 1 and 1000".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    database_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    allowed_extensions: Option<BTreeSet<String>>,
    skip_names: Option<Vec<String>>,
    max_cached_image_size: Option<u32>,
    storage: StorageClientConfig,
}

impl EngineConfigBuilder {
    /// Sets the path to the SQLite metadata database.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the local artifact cache directory.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Replaces the upload allow-list. Entries are lowercased and stripped of
    /// a leading dot.
    pub fn allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        );
        self
    }

    /// Replaces the names skipped while indexing.
    pub fn skip_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the largest cached source dimension. Default: 2000. Zero means
    /// downloaded sources are removed right after measuring.
    pub fn max_cached_image_size(mut self, size: u32) -> Self {
        self.max_cached_image_size = Some(size);
        self
    }

    /// Total attempts per storage request. Default: 3
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.storage.max_attempts = attempts;
        self
    }

    /// Default: 60 seconds
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.storage.operation_timeout = timeout;
        self
    }

    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.storage.connect_timeout = timeout;
        self
    }

    /// Default: 1000 keys
    pub fn list_page_size(mut self, size: u32) -> Self {
        self.storage.list_page_size = size;
        self
    }

    /// Builds and validates the `EngineConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required field is missing or a value
    /// is out of range.
    pub fn build(self) -> Result<EngineConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let config = EngineConfig {
            database_path,
            cache_dir,
            allowed_extensions: self.allowed_extensions.unwrap_or_else(|| {
                DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
            skip_names: self.skip_names.unwrap_or_else(|| {
                DEFAULT_SKIP_NAMES.iter().map(|name| name.to_string()).collect()
            }),
            max_cached_image_size: self.max_cached_image_size.unwrap_or(2000),
            storage: self.storage,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> EngineConfigBuilder {
        EngineConfig::builder()
            .database_path("/db/assets.db")
            .cache_dir("/cache")
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = EngineConfig::builder().cache_dir("/cache").build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_builder_requires_cache_dir() {
        let result = EngineConfig::builder()
            .database_path("/db/assets.db")
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Cache directory is required"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.database_path, PathBuf::from("/db/assets.db"));
        assert_eq!(config.source_cache_dir(), PathBuf::from("/cache/sources"));
        assert_eq!(config.temp_dir(), PathBuf::from("/cache/temp"));
        assert_eq!(
            config.transform_cache_dir(),
            PathBuf::from("/cache/transforms")
        );
        assert_eq!(config.max_cached_image_size, 2000);
        assert_eq!(config.storage, StorageClientConfig::default());
        assert!(config.skip_names.iter().any(|name| name == ".DS_Store"));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let config = builder().build().unwrap();

        assert!(config.is_extension_allowed("JPG"));
        assert!(config.is_extension_allowed(".png"));
        assert!(!config.is_extension_allowed("exe"));
    }

    #[test]
    fn test_custom_allowed_extensions() {
        let config = builder()
            .allowed_extensions([".JPG", "png", ""])
            .build()
            .unwrap();

        assert_eq!(config.allowed_extensions.len(), 2);
        assert!(config.is_extension_allowed("jpg"));
        assert!(!config.is_extension_allowed("pdf"));
    }

    #[test]
    fn test_validate_rejects_empty_allow_list() {
        let result = builder().allowed_extensions(Vec::<String>::new()).build();
        assert!(result.unwrap_err().to_string().contains("extension"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let result = builder().max_attempts(0).build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 1"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = builder().operation_timeout(Duration::ZERO).build();
        assert!(result.unwrap_err().to_string().contains("timeouts"));
    }

    #[test]
    fn test_validate_rejects_oversized_pages() {
        assert!(builder().list_page_size(1001).build().is_err());
        assert!(builder().list_page_size(0).build().is_err());
        assert_eq!(
            builder().list_page_size(250).build().unwrap().storage.list_page_size,
            250
        );
    }
}
