//! # Host Bridge Traits
//!
//! Abstraction traits that the synchronization engine consumes and that hosts
//! (or provider crates) implement.
//!
//! ## Overview
//!
//! The engine never talks to a concrete object store, wall clock or logging
//! backend directly. It depends on the contracts defined here:
//!
//! ### Object storage
//! - [`ObjectStorage`](storage::ObjectStorage) - list/head/get/put/copy/delete against a bucket
//! - [`StorageConnector`](storage::StorageConnector) - builds a client from credentials for one unit of work
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! An in-memory store ([`memory::InMemoryObjectStorage`]) is provided for
//! tests and local development.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should:
//!
//! - Convert backend-specific errors to `BridgeError`
//! - Report a missing object as `BridgeError::NotFound`, not as a failed call
//! - Include context (bucket, key) in messages
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single client can be shared by
//! the tasks of one unit of work.

pub mod error;
pub mod memory;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use memory::{InMemoryConnector, InMemoryObjectStorage};
pub use storage::{
    ListPage, ObjectAcl, ObjectStorage, PutBody, RemoteObject, StorageConnector,
    StorageCredentials, WriteOptions,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
