//! # Asset Library Module
//!
//! Owns the metadata database for asset sources and provides repository
//! patterns for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Sources and their JSON settings
//! - Folder trees addressed by relative path
//! - File records, index session entries and image transform indexes

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
