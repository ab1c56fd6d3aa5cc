//! Domain models for the asset metadata store
//!
//! Sources, their folder trees, the file records indexed from them, per-session
//! index entries and the transform indexes of derived artifacts.

use bridge_traits::storage::StorageCredentials;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for an asset source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(pub Uuid);

impl FolderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for FolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a file record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Backend type of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Amazon S3 or an S3-compatible service
    S3,
    /// Directory on the web server's disk
    Local,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::S3 => "s3",
            SourceKind::Local => "local",
        }
    }

    /// Remote sources keep their originals off-host and need local caching
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceKind::S3)
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(SourceKind::S3),
            "local" => Ok(SourceKind::Local),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

/// Configured asset source
///
/// `settings` is the raw JSON document persisted with the source. Remote
/// sources decode it into [`SourceSettings`] at the start of each unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub kind: SourceKind,
    pub settings: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Source {
    pub fn new(name: impl Into<String>, kind: SourceKind, settings: serde_json::Value) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: SourceId::new(),
            name: name.into(),
            kind,
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convenience constructor for an S3 source
    pub fn s3(name: impl Into<String>, settings: &SourceSettings) -> Self {
        let value = serde_json::to_value(settings).unwrap_or(serde_json::Value::Null);
        Self::new(name, SourceKind::S3, value)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Source name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Settings of a remote (S3) source
///
/// Stored as camelCase JSON: `keyId`, `secret`, `bucket`, `location`,
/// `urlPrefix` are required; `subfolder` and `expires` default to empty and
/// `endpoint` is only set for S3-compatible services.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSettings {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub url_prefix: String,
    /// Key prefix applied to every path
    #[serde(default)]
    pub subfolder: String,
    /// Relative interval such as "30 days", used for `Cache-Control`
    #[serde(default)]
    pub expires: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl SourceSettings {
    /// Decode and validate a settings document
    pub fn from_value(value: &serde_json::Value) -> Result<Self, String> {
        let settings: SourceSettings = serde_json::from_value(value.clone())
            .map_err(|e| format!("Malformed source settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every required field is present
    pub fn validate(&self) -> Result<(), String> {
        let missing: Vec<&str> = [
            ("keyId", &self.key_id),
            ("secret", &self.secret),
            ("bucket", &self.bucket),
            ("location", &self.location),
            ("urlPrefix", &self.url_prefix),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "Missing required source settings: {}",
                missing.join(", ")
            ))
        }
    }

    /// Credentials handed to the storage connector
    pub fn credentials(&self) -> StorageCredentials {
        StorageCredentials {
            key_id: self.key_id.clone(),
            secret: self.secret.clone(),
            location: self.location.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    /// Two settings documents authenticate as the same account
    pub fn shares_credentials_with(&self, other: &SourceSettings) -> bool {
        self.key_id == other.key_id && self.secret == other.secret
    }
}

impl fmt::Debug for SourceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSettings")
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("location", &self.location)
            .field("url_prefix", &self.url_prefix)
            .field("subfolder", &self.subfolder)
            .field("expires", &self.expires)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

// =============================================================================
// Folders and files
// =============================================================================

/// Folder node of a source's tree
///
/// `path` is relative to the source root and slash-terminated (`a/b/`); the
/// root folder has an empty path and no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub source_id: SourceId,
    pub parent_id: Option<FolderId>,
    pub name: String,
    pub path: String,
    pub created_at: i64,
}

impl Folder {
    pub fn new(
        source_id: SourceId,
        parent_id: Option<FolderId>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: FolderId::new(),
            source_id,
            parent_id,
            name: name.into(),
            path: path.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Validate folder data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Folder name cannot be empty".to_string());
        }

        if self.is_root() {
            if !self.path.is_empty() {
                return Err("Root folder path must be empty".to_string());
            }
        } else if !self.path.ends_with('/') {
            return Err(format!("Folder path must end with '/': {}", self.path));
        }

        Ok(())
    }
}

/// Coarse file kind; only images get derived artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Image,
    Other,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "jpe", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

impl AssetKind {
    pub fn from_extension(extension: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
            AssetKind::Image
        } else {
            AssetKind::Other
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        Self::from_extension(extension_of(filename))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Other => "other",
        }
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AssetKind::Image),
            "other" => Ok(AssetKind::Other),
            other => Err(format!("Unknown asset kind: {}", other)),
        }
    }
}

/// Extension of a filename without the dot, empty if there is none
pub fn extension_of(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

/// File record indexed from a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub source_id: SourceId,
    pub folder_id: FolderId,
    pub filename: String,
    pub kind: AssetKind,
    /// Size in bytes
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Remote modification time (unix seconds) as of the last index
    pub date_modified: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Asset {
    pub fn new(source_id: SourceId, folder_id: FolderId, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let now = chrono::Utc::now().timestamp();
        Self {
            id: AssetId::new(),
            source_id,
            folder_id,
            kind: AssetKind::from_filename(&filename),
            filename,
            size: 0,
            width: None,
            height: None,
            date_modified: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.filename)
    }

    pub fn is_image(&self) -> bool {
        self.kind == AssetKind::Image
    }

    /// Validate file record data
    pub fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("Filename cannot be empty".to_string());
        }

        if self.filename.contains('/') {
            return Err(format!("Filename cannot contain '/': {}", self.filename));
        }

        Ok(())
    }
}

// =============================================================================
// Indexing
// =============================================================================

/// One object discovered during phase 1 of an index session
///
/// `(source_id, session_id, offset)` is unique; offsets are assigned in
/// listing order and define processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Row id, 0 until stored
    pub id: i64,
    pub source_id: SourceId,
    pub session_id: String,
    pub offset: u32,
    /// Path relative to the source root
    pub uri: String,
    pub size: u64,
    /// File record resolved during phase 2
    pub record_id: Option<AssetId>,
}

impl IndexEntry {
    pub fn new(
        source_id: SourceId,
        session_id: impl Into<String>,
        offset: u32,
        uri: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: 0,
            source_id,
            session_id: session_id.into(),
            offset,
            uri: uri.into(),
            size,
            record_id: None,
        }
    }
}

/// Record of a generated image transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformIndex {
    /// Row id, 0 until stored
    pub id: i64,
    pub asset_id: AssetId,
    /// Filename of the transform when it differs from the asset's
    pub filename: Option<String>,
    pub format: Option<String>,
    /// Transform handle, also the sub-folder the transform is stored in
    pub location: String,
    pub file_exists: bool,
    pub in_progress: bool,
    pub date_indexed: i64,
}

impl TransformIndex {
    pub fn new(asset_id: AssetId, location: impl Into<String>) -> Self {
        Self {
            id: 0,
            asset_id,
            filename: None,
            format: None,
            location: location.into(),
            file_exists: false,
            in_progress: false,
            date_indexed: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Whether a custom filename is recorded
    pub fn has_filename(&self) -> bool {
        self.filename.as_deref().is_some_and(|name| !name.is_empty())
    }
}
