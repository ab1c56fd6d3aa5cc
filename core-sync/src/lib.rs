//! # Sync & Indexing Module
//!
//! Treats a remote object-storage bucket as an indexable asset source.
//!
//! ## Overview
//!
//! This module reconciles a flat key namespace with the folder/file model of
//! the asset library:
//! - Translating between relative paths and store keys under a source prefix
//! - Deriving the full folder tree, including implied folders, from a listing
//! - Running resumable two-phase index sessions
//! - Moving, renaming, inserting and deleting files and folders with conflict
//!   detection
//! - Caching downloaded originals and publishing image transforms
//!
//! ## Components
//!
//! - **Path Translator** (`paths`): Key prefix handling and path helpers
//! - **Folder Reconciler** (`reconciler`): Folder arena and index entries from a flat listing
//! - **Index Session Manager** (`indexer`): `start_index` / `process_index`
//! - **File Operations** (`operations`): Mutations returning success, conflict or error data
//! - **Artifact Cache** (`artifacts`): Local sources, transform indexes and remote transforms
//! - **Catalog** (`catalog`): Metadata store facade over the library repositories
//! - **Connections** (`connection`, `context`): Per-unit-of-work storage clients

pub mod artifacts;
pub mod catalog;
pub mod connection;
pub mod context;
pub mod error;
pub mod expiry;
pub mod indexer;
pub mod operations;
pub mod paths;
pub mod reconciler;

pub use artifacts::{ArtifactCache, ArtifactVariant};
pub use catalog::AssetCatalog;
pub use connection::{settings_for, SourceConnection};
pub use context::SyncContext;
pub use error::{Result, SyncError};
pub use indexer::{IndexSessionManager, IndexStartResult, ProcessOutcome};
pub use operations::{
    ConflictPrompt, FileOperations, MergeCoordinator, MergeState, OperationOutcome,
    OperationResponse, PromptOption,
};
pub use paths::PathTranslator;
pub use reconciler::{
    reconcile, FolderReconciler, FolderTree, PendingEntry, Reconciliation, SkipRules,
};
