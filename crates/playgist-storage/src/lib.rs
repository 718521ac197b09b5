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

//! Object storage for the playgist object database
//!
//! The object database never touches the filesystem directly. It stores
//! compressed objects under string keys through the [`StorageBackend`] trait:
//!
//! - [`LocalBackend`]: sharded directory layout under a repository's
//!   metadata directory, with atomic temp-file + rename writes
//! - [`mock::MockBackend`]: in-memory map, used by unit tests
//!
//! # Examples
//!
//! ```rust,no_run
//! use playgist_storage::{LocalBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = LocalBackend::new("/tmp/playgists/.playgist").await?;
//!     storage.put("a1b2c3d4", b"compressed object").await?;
//!     assert!(storage.exists("a1b2c3d4").await?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod local;
pub mod mock;

use async_trait::async_trait;
use std::fmt::Debug;

pub use error::{StorageError, StorageResult};
pub use local::LocalBackend;

/// Key/value storage used by the object database
///
/// Keys are non-empty strings (object ids in hex for the object database).
/// Every implementation must reject empty keys and report a missing key from
/// `get` with an error whose message contains "object not found".
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Retrieve the bytes stored under `key`
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;

    /// Store `data` under `key`, replacing any previous value
    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Check whether `key` is present
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Remove `key`; removing a missing key succeeds
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// List keys starting with `prefix`, sorted ascending
    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

/// Reject empty keys with the error every backend reports
pub(crate) fn check_key(key: &str) -> anyhow::Result<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key("key cannot be empty").into());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_object_safe() {
        fn _check_object_safe(_: &dyn StorageBackend) {}
    }

    #[test]
    fn test_check_key() {
        assert!(check_key("").is_err());
        assert!(check_key("abcd").is_ok());
    }
}
