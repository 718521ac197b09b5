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

//! Local filesystem storage backend
//!
//! Objects live under `root/objects/` in a git-like sharded layout:
//! the first two characters of the key name a directory and the rest of
//! the key names the file (`objects/ab/cdef0123...`). Keys shorter than
//! three characters are stored directly under `objects/`.
//!
//! Writes go to a temporary file which is synced and then renamed into
//! place, so readers never observe a partially written object. Each write
//! uses its own temporary name, so concurrent writers of one key don't
//! clobber each other's file.

use crate::error::StorageError;
use crate::{check_key, StorageBackend};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique sibling of `path` ending in `.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}-{}.tmp", std::process::id(), seq));
    path.with_file_name(name)
}

/// Sharded on-disk object storage
#[derive(Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Open (creating if needed) a backend rooted at `root`
    ///
    /// Fails if `root` exists and is not a directory.
    pub async fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root).await?;
        } else if !root.is_dir() {
            return Err(StorageError::InvalidRoot(format!(
                "path exists but is not a directory: {}",
                root.display()
            ))
            .into());
        }

        Ok(LocalBackend { root })
    }

    /// Synchronous variant of [`LocalBackend::new`]
    pub fn new_sync<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        } else if !root.is_dir() {
            return Err(StorageError::InvalidRoot(format!(
                "path exists but is not a directory: {}",
                root.display()
            ))
            .into());
        }

        Ok(LocalBackend { root })
    }

    /// Root directory of this backend
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    /// Map a key to its sharded file path
    ///
    /// Keys may only contain ASCII alphanumerics, `-` and `_`, so a key can
    /// never escape the objects directory.
    fn object_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        check_key(key)?;
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::invalid_key(format!(
                "key contains unsupported characters: {}",
                key
            ))
            .into());
        }

        if key.len() > 2 {
            Ok(self.objects_dir().join(&key[..2]).join(&key[2..]))
        } else {
            Ok(self.objects_dir().join(key))
        }
    }
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBackend")
            .field("root", &self.root)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.object_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(&path);
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &path).await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        debug!(key = %key, size = data.len(), "Stored object file");
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let path = self.object_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.object_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let objects_dir = self.objects_dir();
        if !objects_dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut shards = fs::read_dir(&objects_dir).await?;

        while let Some(entry) = shards.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type().await?;

            if file_type.is_file() {
                if !name.ends_with(".tmp") && name.starts_with(prefix) {
                    results.push(name);
                }
                continue;
            }

            let mut files = fs::read_dir(entry.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let rest = file.file_name().to_string_lossy().to_string();
                if rest.ends_with(".tmp") {
                    continue;
                }
                let key = format!("{}{}", name, rest);
                if key.starts_with(prefix) {
                    results.push(key);
                }
            }
        }

        results.sort();
        Ok(results)
    }
}
