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

//! In-memory storage backend for tests

use crate::error::StorageError;
use crate::{check_key, StorageBackend};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory map; clones see the same data
#[derive(Clone, Default)]
pub struct MockBackend {
    store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MockBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend").finish()
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        check_key(key)?;
        let store = self.store.read().await;
        store
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key).into())
    }

    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        check_key(key)?;
        self.store.write().await.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        check_key(key)?;
        Ok(self.store.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        check_key(key)?;
        self.store.write().await.remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let store = self.store.read().await;
        let mut results: Vec<String> = store
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        results.sort();
        Ok(results)
    }
}
