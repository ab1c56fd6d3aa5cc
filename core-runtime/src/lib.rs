//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the asset synchronization
//! engine:
//! - Logging and tracing infrastructure
//! - Engine configuration with fail-fast validation
//!
//! ## Overview
//!
//! Every other workspace crate logs through the subscriber configured here and
//! reads its tunables (cache location, allow-lists, storage timeouts) from
//! [`EngineConfig`](config::EngineConfig).

pub mod config;
pub mod error;
pub mod logging;

pub use config::{EngineConfig, EngineConfigBuilder, StorageClientConfig};
pub use error::{Error, Result};
