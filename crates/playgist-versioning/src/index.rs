// Playgist - Version-controlled playlists
// Copyright (C) 2025 Playgist Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Staging index
//!
//! The index records which file contents go into the next commit. It is
//! persisted as JSON at `.playgist/index`. Paths are repository-relative
//! with `/` separators.

use crate::error::VersioningError;
use crate::lock::LockFile;
use crate::tree::{FileMode, TreeChange};
use crate::Oid;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const INDEX_FILE: &str = "index";

/// Staged content of one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    /// Repository-relative path
    pub path: String,
    /// Blob OID of the staged content
    pub oid: Oid,
    /// Octal file mode
    pub mode: u32,
    /// Content size in bytes
    pub size: u64,
}

impl IndexEntry {
    /// Create an entry
    pub fn new(path: String, oid: Oid, mode: u32, size: u64) -> Self {
        Self {
            path,
            oid,
            mode,
            size,
        }
    }
}

/// Staging area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
    #[serde(default)]
    deleted_entries: BTreeSet<String>,
    version: u32,
}

impl Index {
    /// Empty index
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            deleted_entries: BTreeSet::new(),
            version: 1,
        }
    }

    /// Load the index from a metadata directory; missing file means empty
    pub fn load(meta_dir: &Path) -> Result<Self> {
        let index_path = meta_dir.join(INDEX_FILE);
        if !index_path.exists() {
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(&index_path)
            .with_context(|| format!("Failed to read index file: {}", index_path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse index file")
    }

    /// Load, modify and persist the index while holding `index.lock`
    ///
    /// Updates from other handles on the same repository are serialized, so
    /// each one starts from the result of the previous. The file is replaced
    /// by rename, which keeps plain [`Index::load`] readers consistent.
    pub async fn update<F, T>(meta_dir: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut Index) -> Result<T>,
    {
        let index_path = meta_dir.join(INDEX_FILE);
        let Some(mut lock) = LockFile::acquire(&index_path)
            .await
            .with_context(|| format!("Failed to lock index file: {}", index_path.display()))?
        else {
            return Err(VersioningError::IndexLocked(index_path).into());
        };

        let mut index = Self::load(meta_dir)?;
        let value = f(&mut index)?;

        let contents = serde_json::to_string_pretty(&index).context("Failed to serialize index")?;
        lock.write_all(contents.as_bytes()).await?;
        lock.commit()
            .await
            .with_context(|| format!("Failed to write index file: {}", index_path.display()))?;
        Ok(value)
    }

    /// Stage new content for a path
    pub fn add_entry(&mut self, entry: IndexEntry) {
        self.deleted_entries.remove(&entry.path);
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Stage the removal of a path
    pub fn mark_deleted(&mut self, path: String) {
        self.entries.remove(&path);
        self.deleted_entries.insert(path);
    }

    /// Staged entry for a path
    pub fn get_entry(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// Whether the path is staged for removal
    pub fn is_deleted(&self, path: &str) -> bool {
        self.deleted_entries.contains(path)
    }

    /// Whether anything is staged for the path
    pub fn is_staged(&self, path: &str) -> bool {
        self.entries.contains_key(path) || self.deleted_entries.contains(path)
    }

    /// Number of staged paths (additions and removals)
    pub fn len(&self) -> usize {
        self.entries.len() + self.deleted_entries.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.deleted_entries.is_empty()
    }

    /// Tree changes for `paths`, or for everything staged when `paths` is empty
    ///
    /// Paths without a staged entry are ignored.
    pub fn changes_for(&self, paths: &[String]) -> Result<Vec<(String, TreeChange)>> {
        let selected: Vec<&String> = if paths.is_empty() {
            self.entries.keys().chain(self.deleted_entries.iter()).collect()
        } else {
            paths.iter().filter(|p| self.is_staged(p)).collect()
        };

        let mut changes = Vec::with_capacity(selected.len());
        for path in selected {
            let change = match self.entries.get(path) {
                Some(entry) => TreeChange::Upsert {
                    oid: entry.oid,
                    mode: FileMode::from_u32(entry.mode)?,
                },
                None => TreeChange::Remove,
            };
            changes.push((path.clone(), change));
        }
        Ok(changes)
    }

    /// Forget the staged state a commit recorded
    ///
    /// A path restaged with other content after `changes` were taken stays
    /// staged.
    pub fn clear_committed(&mut self, changes: &[(String, TreeChange)]) {
        for (path, change) in changes {
            match change {
                TreeChange::Upsert { oid, .. } => {
                    if self.entries.get(path).is_some_and(|e| e.oid == *oid) {
                        self.entries.remove(path);
                    }
                }
                TreeChange::Remove => {
                    self.deleted_entries.remove(path);
                }
            }
        }
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(path: &str, content: &[u8]) -> IndexEntry {
        IndexEntry::new(
            path.to_string(),
            Oid::hash(content),
            FileMode::Regular.as_u32(),
            content.len() as u64,
        )
    }

    #[test]
    fn test_index_new() {
        let index = Index::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.version, 1);
    }

    #[test]
    fn test_add_then_delete() {
        let mut index = Index::new();
        index.add_entry(entry("alice/p1", b"x"));
        assert!(index.get_entry("alice/p1").is_some());

        index.mark_deleted("alice/p1".to_string());
        assert!(index.get_entry("alice/p1").is_none());
        assert!(index.is_deleted("alice/p1"));
        assert_eq!(index.len(), 1);

        index.add_entry(entry("alice/p1", b"y"));
        assert!(!index.is_deleted("alice/p1"));
    }

    #[tokio::test]
    async fn test_update_persists() {
        let temp_dir = TempDir::new().unwrap();
        let staged = Index::update(temp_dir.path(), |index| {
            index.add_entry(entry("alice/p1", b"content"));
            index.mark_deleted("alice/p2".to_string());
            Ok(index.len())
        })
        .await
        .unwrap();
        assert_eq!(staged, 2);

        let loaded = Index::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.get_entry("alice/p1"), Some(&entry("alice/p1", b"content")));
        assert!(loaded.is_deleted("alice/p2"));
        assert!(!temp_dir.path().join("index.lock").exists());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_index() {
        let temp_dir = TempDir::new().unwrap();
        Index::update(temp_dir.path(), |index| {
            index.add_entry(entry("alice/p1", b"one"));
            Ok(())
        })
        .await
        .unwrap();

        let result: Result<()> = Index::update(temp_dir.path(), |index| {
            index.mark_deleted("alice/p1".to_string());
            anyhow::bail!("rejected")
        })
        .await;
        assert!(result.is_err());
        assert!(Index::load(temp_dir.path()).unwrap().get_entry("alice/p1").is_some());
        assert!(!temp_dir.path().join("index.lock").exists());
    }

    #[tokio::test]
    async fn test_update_reports_held_lock() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("index.lock"), b"").unwrap();

        let err = Index::update(temp_dir.path(), |_| Ok(())).await.unwrap_err();
        assert!(matches!(
            VersioningError::find(&err),
            Some(VersioningError::IndexLocked(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_serialized() {
        let temp_dir = TempDir::new().unwrap();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let meta_dir = temp_dir.path().to_path_buf();
            tasks.push(tokio::spawn(async move {
                Index::update(&meta_dir, |index| {
                    index.add_entry(entry(&format!("alice/p{i}"), b"x"));
                    Ok(())
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(Index::load(temp_dir.path()).unwrap().len(), 8);
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Index::load(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_changes_for_selected_paths() {
        let mut index = Index::new();
        index.add_entry(entry("alice/p1", b"one"));
        index.add_entry(entry("alice/p2", b"two"));
        index.mark_deleted("alice/p3".to_string());

        let changes = index
            .changes_for(&["alice/p1".to_string(), "alice/p3".to_string(), "nope".to_string()])
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1], ("alice/p3".to_string(), TreeChange::Remove));

        assert_eq!(index.changes_for(&[]).unwrap().len(), 3);
    }

    #[test]
    fn test_clear_committed_only_touches_listed() {
        let mut index = Index::new();
        index.add_entry(entry("alice/p1", b"one"));
        index.add_entry(entry("alice/p2", b"two"));
        index.mark_deleted("alice/p3".to_string());

        let changes = index
            .changes_for(&["alice/p1".to_string(), "alice/p3".to_string()])
            .unwrap();
        index.clear_committed(&changes);
        assert!(!index.is_staged("alice/p1"));
        assert!(index.is_staged("alice/p2"));
        assert!(!index.is_staged("alice/p3"));
    }

    #[test]
    fn test_clear_committed_keeps_restaged_content() {
        let mut index = Index::new();
        index.add_entry(entry("alice/p1", b"one"));
        let changes = index.changes_for(&[]).unwrap();

        index.add_entry(entry("alice/p1", b"newer"));
        index.clear_committed(&changes);
        assert_eq!(index.get_entry("alice/p1"), Some(&entry("alice/p1", b"newer")));
    }
}
