//! # Path Translation
//!
//! Maps between folder-relative paths used by the metadata store and the
//! flat key namespace of a bucket.
//!
//! ## Overview
//!
//! A source may be scoped to a key prefix (its "subfolder"). Every conversion
//! between a relative path and a store key goes through [`PathTranslator`],
//! and every relative path is built by the helpers in this module:
//!
//! - Folder paths are relative to the source root and slash-terminated
//!   (`photos/2024/`); the root folder's path is empty.
//! - File paths are a folder path followed by a filename.
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::paths::PathTranslator;
//!
//! let paths = PathTranslator::new("site/");
//! assert_eq!(paths.to_remote_key("photos/cat.jpg"), "site/photos/cat.jpg");
//! assert_eq!(paths.to_relative_path("site/photos/cat.jpg")?, "photos/cat.jpg");
//! ```

use crate::error::{Result, SyncError};

/// Converts between relative paths and store keys for one source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathTranslator {
    prefix: String,
}

impl PathTranslator {
    /// Build a translator for a `subfolder` setting
    ///
    /// The prefix is `rtrim(subfolder, '/') + '/'`, or empty when no
    /// subfolder is configured.
    pub fn new(subfolder: &str) -> Self {
        let trimmed = subfolder.trim_end_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store key for a relative path
    pub fn to_remote_key(&self, relative_path: &str) -> String {
        format!("{}{}", self.prefix, relative_path)
    }

    /// Store key of `filename` inside the folder at `folder_path`
    pub fn file_key(&self, folder_path: &str, filename: &str) -> String {
        self.to_remote_key(&file_path(folder_path, filename))
    }

    /// Relative path for a store key
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPath`] when the key lies outside the prefix
    /// or is exactly the prefix.
    pub fn to_relative_path(&self, key: &str) -> Result<String> {
        let relative = key
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| SyncError::InvalidPath(format!("{} is outside {}", key, self.prefix)))?;

        if relative.is_empty() {
            return Err(SyncError::InvalidPath(format!(
                "{} has an empty relative path",
                key
            )));
        }

        Ok(relative.to_string())
    }
}

/// Relative path of a file inside a folder
pub fn file_path(folder_path: &str, filename: &str) -> String {
    format!("{}{}", folder_path, filename)
}

/// Path of the child folder `name` under `parent_path`: `rtrim(parent + name, '/') + '/'`
pub fn child_folder_path(parent_path: &str, name: &str) -> String {
    format!("{}/", format!("{}{}", parent_path, name).trim_end_matches('/'))
}

/// Path of the folder containing `path`
///
/// ```
/// use core_sync::paths::parent_folder_path;
///
/// assert_eq!(parent_folder_path("a/b/"), "a/");
/// assert_eq!(parent_folder_path("a/b/c.jpg"), "a/b/");
/// assert_eq!(parent_folder_path("a/"), "");
/// ```
pub fn parent_folder_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => trimmed[..=index].to_string(),
        None => String::new(),
    }
}

/// Last segment of a folder path without the trailing slash
pub fn folder_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Split a relative file path into its folder path and filename
pub fn split_file_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => (&path[..=index], &path[index + 1..]),
        None => ("", path),
    }
}

/// Path of a transform relative to the folder of its file: `location/filename`
pub fn transform_subpath(location: &str, filename: &str) -> String {
    format!("{}/{}", location, filename)
}

const RESERVED_NAME_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Clean a user-supplied filename
///
/// Drops path separators, reserved and control characters, then trims
/// surrounding whitespace and dots.
pub fn clean_asset_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !RESERVED_NAME_CHARS.contains(c))
        .collect();

    cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(PathTranslator::new("").prefix(), "");
        assert_eq!(PathTranslator::new("site").prefix(), "site/");
        assert_eq!(PathTranslator::new("site///").prefix(), "site/");
        assert_eq!(PathTranslator::new("/").prefix(), "");
    }

    #[test]
    fn test_round_trip_with_prefix() {
        let paths = PathTranslator::new("a/b");
        let key = paths.to_remote_key("c/d.jpg");
        assert_eq!(key, "a/b/c/d.jpg");
        assert_eq!(paths.to_relative_path(&key).unwrap(), "c/d.jpg");
    }

    #[test]
    fn test_prefix_key_is_invalid() {
        let paths = PathTranslator::new("site");
        assert!(matches!(
            paths.to_relative_path("site/"),
            Err(SyncError::InvalidPath(_))
        ));
        assert!(paths.to_relative_path("other/x.jpg").is_err());
        assert!(PathTranslator::new("").to_relative_path("").is_err());
    }

    #[test]
    fn test_file_key() {
        let paths = PathTranslator::new("site");
        assert_eq!(paths.file_key("", "a.jpg"), "site/a.jpg");
        assert_eq!(paths.file_key("x/y/", "a.jpg"), "site/x/y/a.jpg");
    }

    #[test]
    fn test_child_folder_path() {
        assert_eq!(child_folder_path("", "new"), "new/");
        assert_eq!(child_folder_path("a/", "new/"), "a/new/");
        assert_eq!(child_folder_path("a/b/", "c"), "a/b/c/");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_folder_path("a/b/c/"), "a/b/");
        assert_eq!(parent_folder_path("file.jpg"), "");
        assert_eq!(folder_name("a/b/"), "b");
        assert_eq!(folder_name("top/"), "top");
    }

    #[test]
    fn test_split_file_path() {
        assert_eq!(split_file_path("a/b/c.jpg"), ("a/b/", "c.jpg"));
        assert_eq!(split_file_path("c.jpg"), ("", "c.jpg"));
        assert_eq!(split_file_path("a/"), ("a/", ""));
    }

    #[test]
    fn test_clean_asset_name() {
        assert_eq!(clean_asset_name("  my photo.jpg "), "my photo.jpg");
        assert_eq!(clean_asset_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(clean_asset_name("a:b*c?.png"), "abc.png");
        assert_eq!(clean_asset_name("tab\there.gif"), "tabhere.gif");
        assert_eq!(clean_asset_name("..."), "");
    }

    #[test]
    fn test_transform_subpath() {
        assert_eq!(transform_subpath("_thumb", "cat.jpg"), "_thumb/cat.jpg");
    }
}
