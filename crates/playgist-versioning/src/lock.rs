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

//! Exclusive lock files
//!
//! The lock for `<path>` is `<path>.lock`, created with exclusive create.
//! New content is written into the lock file and renamed over `<path>` on
//! [`LockFile::commit`]. A lock dropped without committing is removed, so
//! `<path>` keeps its old content.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Tries made by [`LockFile::acquire`] before giving up
const LOCK_ATTEMPTS: u32 = 10;

const BACKOFF_BASE: Duration = Duration::from_millis(2);
const BACKOFF_MAX: Duration = Duration::from_millis(64);

/// Backoff before retry number `attempt` (0-based), doubling up to a cap
pub(crate) fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE
        .saturating_mul(1 << attempt.min(16))
        .min(BACKOFF_MAX)
}

pub(crate) fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// A held `<path>.lock`
pub(crate) struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<fs::File>,
    committed: bool,
}

impl LockFile {
    /// Take the lock for `target`; `None` when another writer holds it
    pub(crate) async fn try_acquire(target: &Path) -> io::Result<Option<Self>> {
        let lock_path = lock_path_for(target);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
        {
            Ok(file) => Ok(Some(Self {
                target: target.to_path_buf(),
                lock_path,
                file: Some(file),
                committed: false,
            })),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Take the lock, waiting with backoff while another writer holds it
    ///
    /// Returns `None` if the lock is still held after the last attempt.
    pub(crate) async fn acquire(target: &Path) -> io::Result<Option<Self>> {
        for attempt in 0..LOCK_ATTEMPTS {
            if let Some(lock) = Self::try_acquire(target).await? {
                return Ok(Some(lock));
            }
            tokio::time::sleep(backoff(attempt)).await;
        }
        Self::try_acquire(target).await
    }

    /// Append to the pending content
    pub(crate) async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data).await,
            None => Err(io::Error::other("lock file already closed")),
        }
    }

    /// Flush the pending content and rename it over the target
    pub(crate) async fn commit(mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&self.lock_path, &self.target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_commit_replaces_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("HEAD");
        std::fs::write(&target, b"old").unwrap();

        let mut lock = LockFile::try_acquire(&target).await.unwrap().unwrap();
        assert!(LockFile::try_acquire(&target).await.unwrap().is_none());
        lock.write_all(b"new").await.unwrap();
        lock.commit().await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!lock_path_for(&target).exists());
    }

    #[tokio::test]
    async fn test_drop_releases_without_writing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("index");
        std::fs::write(&target, b"kept").unwrap();

        {
            let mut lock = LockFile::acquire(&target).await.unwrap().unwrap();
            lock.write_all(b"discarded").await.unwrap();
        }

        assert_eq!(std::fs::read(&target).unwrap(), b"kept");
        assert!(LockFile::try_acquire(&target).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("refs-main");
        let held = LockFile::try_acquire(&target).await.unwrap().unwrap();

        let waiter = tokio::spawn({
            let target = target.clone();
            async move { LockFile::acquire(&target).await.unwrap().is_some() }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff(0), Duration::from_millis(2));
        assert_eq!(backoff(3), Duration::from_millis(16));
        assert_eq!(backoff(40), BACKOFF_MAX);
    }
}
