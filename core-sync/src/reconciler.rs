//! # Folder Reconciliation
//!
//! Derives the folder tree and the list of indexable files from a flat,
//! non-delimited key listing.
//!
//! ## Overview
//!
//! Object stores have no directories. A folder `a/b/` that only contains
//! `a/b/c/file.jpg` never appears as a key of its own, so every ancestor of
//! every key is recorded as an implied folder. Keys ending in `/` are explicit
//! folder markers; everything else becomes an index entry.
//!
//! Keys are filtered before they contribute anything:
//! - a folder segment starting with `_` marks a private folder, and the whole
//!   key is dropped (the filename itself may start with `_`)
//! - any segment matching a skip name (`.DS_Store`, `.git`, `.ht*`...) drops it
//!
//! The reconciler consumes objects one at a time so a listing can be streamed
//! page by page. Entry offsets are assigned in listing order.

use bridge_traits::storage::RemoteObject;
use std::collections::HashMap;
use tracing::debug;

use crate::paths::{parent_folder_path, PathTranslator};

/// Case-insensitive name filter; a trailing `*` matches any suffix
#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl SkipRules {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Self::default();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            match name.strip_suffix('*') {
                Some(prefix) if !prefix.is_empty() => rules.prefixes.push(prefix.to_string()),
                Some(_) => {}
                None => rules.exact.push(name),
            }
        }
        rules
    }

    /// Whether a single path segment is skipped
    pub fn matches(&self, segment: &str) -> bool {
        let segment = segment.to_lowercase();
        self.exact.iter().any(|name| *name == segment)
            || self.prefixes.iter().any(|prefix| segment.starts_with(prefix))
    }

    /// Whether any segment of a relative path is skipped
    pub fn matches_path(&self, relative_path: &str) -> bool {
        relative_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.matches(segment))
    }
}

/// Whether a folder segment of `relative_path` starts with `_`
///
/// The final segment is the filename (or empty for folder markers) and is
/// not considered.
pub fn is_private_path(relative_path: &str) -> bool {
    let mut segments: Vec<&str> = relative_path.split('/').collect();
    segments.pop();
    segments.iter().any(|segment| segment.starts_with('_'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub path: String,
    pub parent: Option<usize>,
}

/// Arena of folder nodes indexed by path
///
/// Inserting a path inserts its missing ancestors first, so iteration order
/// always visits a parent before its children and the tree has no gaps.
#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
    by_path: HashMap<String, usize>,
}

impl FolderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slash-terminated folder path and its ancestors
    pub fn insert(&mut self, path: &str) -> usize {
        if let Some(&index) = self.by_path.get(path) {
            return index;
        }

        let parent_path = parent_folder_path(path);
        let parent = if parent_path.is_empty() {
            None
        } else {
            Some(self.insert(&parent_path))
        };

        let index = self.nodes.len();
        self.nodes.push(FolderNode {
            path: path.to_string(),
            parent,
        });
        self.by_path.insert(path.to_string(), index);
        index
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn get(&self, index: usize) -> Option<&FolderNode> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Paths in insertion order, parents before children
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.path.as_str())
    }
}

/// A file discovered by the listing, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub offset: u32,
    pub uri: String,
    pub size: u64,
}

/// Streaming reconciler for one listing
#[derive(Debug)]
pub struct FolderReconciler {
    paths: PathTranslator,
    skip: SkipRules,
    tree: FolderTree,
    next_offset: u32,
}

impl FolderReconciler {
    pub fn new(paths: PathTranslator, skip: SkipRules) -> Self {
        Self {
            paths,
            skip,
            tree: FolderTree::new(),
            next_offset: 0,
        }
    }

    /// Feed one listed object; returns the index entry it produces, if any
    pub fn ingest(&mut self, object: &RemoteObject) -> Option<PendingEntry> {
        let relative = match self.paths.to_relative_path(&object.key) {
            Ok(relative) => relative,
            Err(e) => {
                debug!(key = %object.key, error = %e, "Skipping key");
                return None;
            }
        };

        if is_private_path(&relative) || self.skip.matches_path(&relative) {
            debug!(key = %object.key, "Skipping excluded key");
            return None;
        }

        if relative.ends_with('/') {
            self.tree.insert(&relative);
            return None;
        }

        let folder = parent_folder_path(&relative);
        if !folder.is_empty() {
            self.tree.insert(&folder);
        }

        let entry = PendingEntry {
            offset: self.next_offset,
            uri: relative,
            size: object.size,
        };
        self.next_offset += 1;
        Some(entry)
    }

    /// Number of entries produced so far
    pub fn entry_count(&self) -> u32 {
        self.next_offset
    }

    pub fn tree(&self) -> &FolderTree {
        &self.tree
    }

    pub fn into_tree(self) -> FolderTree {
        self.tree
    }
}

/// Result of reconciling a complete listing
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub folders: FolderTree,
    pub entries: Vec<PendingEntry>,
}

/// Reconcile a complete listing in one call
pub fn reconcile<'a, I>(paths: &PathTranslator, skip: &SkipRules, objects: I) -> Reconciliation
where
    I: IntoIterator<Item = &'a RemoteObject>,
{
    let mut reconciler = FolderReconciler::new(paths.clone(), skip.clone());
    let entries = objects
        .into_iter()
        .filter_map(|object| reconciler.ingest(object))
        .collect();

    Reconciliation {
        folders: reconciler.into_tree(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn object(key: &str) -> RemoteObject {
        RemoteObject {
            key: key.to_string(),
            size: 3,
            last_modified: Utc::now(),
        }
    }

    fn default_skip() -> SkipRules {
        SkipRules::new(["Thumbs.db", "__MACOSX", ".DS_Store", ".svn", ".git", ".ht*"])
    }

    fn run(prefix: &str, keys: &[&str]) -> Reconciliation {
        let objects: Vec<_> = keys.iter().map(|key| object(key)).collect();
        reconcile(&PathTranslator::new(prefix), &default_skip(), &objects)
    }

    #[test]
    fn test_implied_folders_are_recovered() {
        let result = run("", &["a/b/c/file.jpg"]);

        let folders: Vec<_> = result.folders.paths().collect();
        assert_eq!(folders, vec!["a/", "a/b/", "a/b/c/"]);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].uri, "a/b/c/file.jpg");
        assert_eq!(result.entries[0].offset, 0);
    }

    #[test]
    fn test_private_folders_are_excluded() {
        let result = run("", &["a/_hidden/file.jpg", "a/_hidden/deeper/x.png", "_top/"]);

        assert!(result.entries.is_empty());
        assert!(result.folders.is_empty());
    }

    #[test]
    fn test_private_filename_is_kept() {
        let result = run("", &["a/_draft.jpg"]);
        assert_eq!(result.entries[0].uri, "a/_draft.jpg");
    }

    #[test]
    fn test_explicit_markers_become_folders() {
        let result = run("", &["empty/", "x/y/"]);

        let folders: Vec<_> = result.folders.paths().collect();
        assert_eq!(folders, vec!["empty/", "x/", "x/y/"]);
        assert!(result.entries.is_empty());
    }

    #[test]
    fn test_skip_names_anywhere_in_path() {
        let result = run(
            "",
            &[
                "photos/.DS_Store",
                "photos/Thumbs.DB",
                "__MACOSX/photos/a.jpg",
                "site/.htaccess",
                "photos/ok.jpg",
            ],
        );

        let uris: Vec<_> = result.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["photos/ok.jpg"]);
    }

    #[test]
    fn test_prefix_is_stripped_and_prefix_key_ignored() {
        let result = run("site", &["site/", "site/a.jpg", "site/b/c.jpg"]);

        let uris: Vec<_> = result.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["a.jpg", "b/c.jpg"]);
        let folders: Vec<_> = result.folders.paths().collect();
        assert_eq!(folders, vec!["b/"]);
    }

    #[test]
    fn test_offsets_follow_listing_order() {
        let result = run("", &["z.jpg", "a.jpg", "m/n.jpg"]);

        let pairs: Vec<_> = result
            .entries
            .iter()
            .map(|e| (e.offset, e.uri.as_str()))
            .collect();
        assert_eq!(pairs, vec![(0, "z.jpg"), (1, "a.jpg"), (2, "m/n.jpg")]);
    }

    #[test]
    fn test_tree_links_parents() {
        let mut tree = FolderTree::new();
        let leaf = tree.insert("a/b/c/");
        let node = tree.get(leaf).unwrap();
        let parent = tree.get(node.parent.unwrap()).unwrap();

        assert_eq!(parent.path, "a/b/");
        assert!(tree.get(parent.parent.unwrap()).unwrap().parent.is_none());
        let node_parent = node.parent.unwrap();
        assert_eq!(tree.insert("a/b/"), node_parent);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_skip_rules_wildcard() {
        let rules = SkipRules::new([".ht*", "*", "Thumbs.db"]);
        assert!(rules.matches(".HTpasswd"));
        assert!(rules.matches("thumbs.db"));
        assert!(!rules.matches("photo.jpg"));
    }
}
