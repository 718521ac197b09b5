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

//! Tree objects and incremental tree rebuilds
//!
//! A tree lists the entries of one directory. Committing a handful of
//! changed files must not require re-reading the whole working tree, so
//! [`apply_changes`] rewrites only the subtrees on the changed paths: it
//! groups changes by their first path segment, recurses into each touched
//! child, and writes the parent after all of its children (post-order).
//! Untouched siblings keep their existing OIDs.

use crate::{ObjectDatabase, ObjectType, Oid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Mode of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileMode {
    /// Regular file (100644)
    Regular,
    /// Executable file (100755)
    Executable,
    /// Subdirectory (040000)
    Directory,
}

impl FileMode {
    /// Mode from the octal value stored in the index
    pub fn from_u32(mode: u32) -> anyhow::Result<Self> {
        match mode {
            0o100644 => Ok(FileMode::Regular),
            0o100755 => Ok(FileMode::Executable),
            0o040000 => Ok(FileMode::Directory),
            _ => anyhow::bail!("Unknown file mode: {:o}", mode),
        }
    }

    /// Octal value
    pub fn as_u32(&self) -> u32 {
        match self {
            FileMode::Regular => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Directory => 0o040000,
        }
    }

    /// Kind of object the entry points at
    pub fn object_type(&self) -> ObjectType {
        match self {
            FileMode::Directory => ObjectType::Tree,
            _ => ObjectType::Blob,
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.as_u32())
    }
}

/// One named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry name (single path segment)
    pub name: String,
    /// Entry mode
    pub mode: FileMode,
    /// Blob or tree OID
    pub oid: Oid,
}

impl TreeEntry {
    /// Create an entry
    pub fn new(name: String, mode: FileMode, oid: Oid) -> Self {
        Self { name, mode, oid }
    }

    /// Whether the entry is a subdirectory
    pub fn is_tree(&self) -> bool {
        self.mode == FileMode::Directory
    }

    /// Whether the entry is a file
    pub fn is_blob(&self) -> bool {
        !self.is_tree()
    }
}

/// Directory snapshot; entries are kept sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Entries keyed by name
    pub entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn add_entry(&mut self, entry: TreeEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Remove an entry by name
    pub fn remove_entry(&mut self, name: &str) -> Option<TreeEntry> {
        self.entries.remove(name)
    }

    /// Look up an entry by name
    pub fn get_entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.values()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode with bincode
    pub fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| anyhow::anyhow!("Tree serialization failed: {}", e))
    }

    /// Decode from bincode
    pub fn deserialize(data: &[u8]) -> anyhow::Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| anyhow::anyhow!("Tree deserialization failed: {}", e))
    }

    /// Store the tree and return its OID
    pub async fn write(&self, odb: &ObjectDatabase) -> anyhow::Result<Oid> {
        let data = self.serialize()?;
        odb.write(ObjectType::Tree, &data).await
    }

    /// Load a tree by OID
    pub async fn read(odb: &ObjectDatabase, oid: &Oid) -> anyhow::Result<Self> {
        let data = odb.read(oid).await?;
        Self::deserialize(&data)
    }
}

/// Change to a single file path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChange {
    /// Point the path at a blob
    Upsert {
        /// Blob OID
        oid: Oid,
        /// File mode
        mode: FileMode,
    },
    /// Drop the path
    Remove,
}

type Segments = Vec<String>;
type BoxedTreeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Option<Oid>>> + Send + 'a>>;

/// Apply path changes on top of `base` and return the new root tree OID
///
/// Paths are repository-relative with `/` separators. Directories left
/// empty by removals are pruned; the root is written even when empty.
pub async fn apply_changes(
    odb: &ObjectDatabase,
    base: Option<Oid>,
    changes: Vec<(String, TreeChange)>,
) -> anyhow::Result<Oid> {
    let mut split = Vec::with_capacity(changes.len());
    for (path, change) in changes {
        let segments: Segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            anyhow::bail!("Empty path in tree change");
        }
        split.push((segments, change));
    }

    match rebuild(odb, base, split).await? {
        Some(oid) => Ok(oid),
        None => Tree::new().write(odb).await,
    }
}

fn rebuild<'a>(
    odb: &'a ObjectDatabase,
    base: Option<Oid>,
    changes: Vec<(Segments, TreeChange)>,
) -> BoxedTreeFuture<'a> {
    Box::pin(async move {
        let mut tree = match base {
            Some(oid) => Tree::read(odb, &oid).await?,
            None => Tree::new(),
        };

        let mut nested: BTreeMap<String, Vec<(Segments, TreeChange)>> = BTreeMap::new();
        for (mut segments, change) in changes {
            let head = segments.remove(0);
            if segments.is_empty() {
                match change {
                    TreeChange::Upsert { oid, mode } => {
                        tree.add_entry(TreeEntry::new(head, mode, oid))
                    }
                    TreeChange::Remove => {
                        tree.remove_entry(&head);
                    }
                }
            } else {
                nested.entry(head).or_default().push((segments, change));
            }
        }

        for (name, child_changes) in nested {
            let child_base = tree
                .get_entry(&name)
                .filter(|entry| entry.is_tree())
                .map(|entry| entry.oid);

            match rebuild(odb, child_base, child_changes).await? {
                Some(oid) => tree.add_entry(TreeEntry::new(name, FileMode::Directory, oid)),
                None => {
                    tree.remove_entry(&name);
                }
            }
        }

        if tree.is_empty() {
            return Ok(None);
        }
        Ok(Some(tree.write(odb).await?))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use playgist_storage::mock::MockBackend;
    use std::sync::Arc;

    fn odb() -> ObjectDatabase {
        ObjectDatabase::new(Arc::new(MockBackend::new()), 64)
    }

    fn upsert(oid: Oid) -> TreeChange {
        TreeChange::Upsert {
            oid,
            mode: FileMode::Regular,
        }
    }

    #[test]
    fn test_file_mode_values() {
        assert_eq!(FileMode::from_u32(0o100644).unwrap(), FileMode::Regular);
        assert_eq!(FileMode::Directory.to_string(), "040000");
        assert_eq!(FileMode::Directory.object_type(), ObjectType::Tree);
        assert!(FileMode::from_u32(0o777).is_err());
    }

    #[test]
    fn test_tree_entries_sorted() {
        let mut tree = Tree::new();
        let oid = Oid::hash(b"x");
        tree.add_entry(TreeEntry::new("b".into(), FileMode::Regular, oid));
        tree.add_entry(TreeEntry::new("a".into(), FileMode::Regular, oid));

        let names: Vec<_> = tree.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(Tree::deserialize(&tree.serialize().unwrap()).unwrap(), tree);
    }

    #[tokio::test]
    async fn test_apply_creates_nested_directories() {
        let odb = odb();
        let blob = odb.write(ObjectType::Blob, b"trackA\n").await.unwrap();

        let root = apply_changes(&odb, None, vec![("alice/abc".into(), upsert(blob))])
            .await
            .unwrap();

        let root_tree = Tree::read(&odb, &root).await.unwrap();
        let alice = root_tree.get_entry("alice").unwrap();
        assert!(alice.is_tree());

        let alice_tree = Tree::read(&odb, &alice.oid).await.unwrap();
        assert_eq!(alice_tree.get_entry("abc").unwrap().oid, blob);
    }

    #[tokio::test]
    async fn test_apply_preserves_untouched_siblings() {
        let odb = odb();
        let one = odb.write(ObjectType::Blob, b"one").await.unwrap();
        let two = odb.write(ObjectType::Blob, b"two").await.unwrap();
        let three = odb.write(ObjectType::Blob, b"three").await.unwrap();

        let first = apply_changes(
            &odb,
            None,
            vec![
                ("alice/p1".into(), upsert(one)),
                ("bob/p2".into(), upsert(two)),
            ],
        )
        .await
        .unwrap();
        let bob_before = Tree::read(&odb, &first).await.unwrap().get_entry("bob").unwrap().oid;

        let second = apply_changes(&odb, Some(first), vec![("alice/p1".into(), upsert(three))])
            .await
            .unwrap();
        let root = Tree::read(&odb, &second).await.unwrap();

        assert_eq!(root.get_entry("bob").unwrap().oid, bob_before);
        let alice = Tree::read(&odb, &root.get_entry("alice").unwrap().oid).await.unwrap();
        assert_eq!(alice.get_entry("p1").unwrap().oid, three);
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_directories() {
        let odb = odb();
        let blob = odb.write(ObjectType::Blob, b"x").await.unwrap();
        let first = apply_changes(&odb, None, vec![("a/b/c".into(), upsert(blob))])
            .await
            .unwrap();

        let second = apply_changes(&odb, Some(first), vec![("a/b/c".into(), TreeChange::Remove)])
            .await
            .unwrap();

        assert!(Tree::read(&odb, &second).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let odb = odb();
        let result = apply_changes(&odb, None, vec![("/".into(), TreeChange::Remove)]).await;
        assert!(result.is_err());
    }
}
