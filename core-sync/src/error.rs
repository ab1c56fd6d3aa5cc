use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Source settings are missing required values or cannot be decoded
    #[error("Invalid source configuration: {0}")]
    Configuration(String),

    /// Persisted settings are null or otherwise unusable; nothing was written
    #[error("Corrupted setting: {0}")]
    CorruptedSetting(String),

    #[error("This file type is not allowed: {0}")]
    DisallowedFileType(String),

    #[error("Source {0} not found")]
    SourceNotFound(String),

    #[error("Folder {0} not found")]
    FolderNotFound(String),

    #[error("File {0} not found")]
    FileNotFound(String),

    /// A listed object vanished before it could be processed
    #[error("Remote object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
