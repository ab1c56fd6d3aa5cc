//! Workspace facade crate.
//!
//! Re-exports the synchronization engine (`core-sync`) and, behind the default
//! `s3` feature, the S3 object store client (`provider-s3`). Host applications
//! can depend on `asset-sync-workspace` instead of wiring each crate
//! individually.

pub use core_sync;

#[cfg(feature = "s3")]
pub use provider_s3;
