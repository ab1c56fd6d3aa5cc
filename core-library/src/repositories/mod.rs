//! # Repository Pattern Implementation
//!
//! This module provides repository traits and implementations for data access.
//! Each entity has a corresponding repository with the operations the sync
//! engine needs.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//! - Identifiers are stored as TEXT and parsed back through `TryFrom` row types
//!
//! ## Available Repositories
//!
//! - `SourceRepository` - Configured sources and their settings
//! - `FolderRepository` - Per-source folder hierarchy addressed by path
//! - `AssetRepository` - Indexed file records
//! - `IndexEntryRepository` - Objects discovered by an index session
//! - `TransformIndexRepository` - Generated image transforms

pub mod asset;
pub mod folder;
pub mod index_entry;
pub mod source;
pub mod transform_index;

pub use asset::{AssetRepository, SqliteAssetRepository};
pub use folder::{FolderRepository, SqliteFolderRepository};
pub use index_entry::{IndexEntryRepository, SqliteIndexEntryRepository};
pub use source::{SourceRepository, SqliteSourceRepository};
pub use transform_index::{SqliteTransformIndexRepository, TransformIndexRepository};

use crate::error::LibraryError;

pub(crate) fn invalid_column(column: &str, message: impl std::fmt::Display) -> LibraryError {
    LibraryError::InvalidInput {
        field: column.to_string(),
        message: message.to_string(),
    }
}

pub(crate) fn validation_error(entity: &str, message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: entity.to_string(),
        message,
    }
}
