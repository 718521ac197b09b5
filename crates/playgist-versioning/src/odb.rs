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

//! Content-addressable object database
//!
//! Objects are keyed by the SHA-256 of their uncompressed content and stored
//! zlib-compressed through a [`StorageBackend`]. Recently used objects are
//! kept uncompressed in a moka cache. Every read from storage is verified
//! against its OID.

use crate::{ObjectType, Oid};
use anyhow::Context;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use moka::future::Cache;
use playgist_storage::StorageBackend;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

/// Object database over a pluggable storage backend
pub struct ObjectDatabase {
    storage: Arc<dyn StorageBackend>,
    cache: Cache<Oid, Arc<Vec<u8>>>,
}

impl ObjectDatabase {
    /// Create a database caching up to `cache_capacity` objects
    pub fn new(storage: Arc<dyn StorageBackend>, cache_capacity: u64) -> Self {
        debug!(capacity = cache_capacity, "Creating ObjectDatabase");
        Self {
            storage,
            cache: Cache::new(cache_capacity),
        }
    }

    /// Store `data` and return its OID
    ///
    /// Writing content that is already present is a no-op apart from
    /// refreshing the cache.
    pub async fn write(&self, obj_type: ObjectType, data: &[u8]) -> anyhow::Result<Oid> {
        let oid = Oid::hash(data);
        let key = oid.to_hex();

        if self.storage.exists(&key).await? {
            debug!(oid = %oid, obj_type = %obj_type, "Object already stored");
        } else {
            let compressed = compress(data)?;
            self.storage
                .put(&key, &compressed)
                .await
                .with_context(|| format!("Failed to store {} {}", obj_type, oid))?;
            debug!(
                oid = %oid,
                obj_type = %obj_type,
                size = data.len(),
                stored_size = compressed.len(),
                "Stored new object"
            );
        }

        self.cache.insert(oid, Arc::new(data.to_vec())).await;
        Ok(oid)
    }

    /// Read an object's uncompressed content
    pub async fn read(&self, oid: &Oid) -> anyhow::Result<Vec<u8>> {
        if let Some(cached) = self.cache.get(oid).await {
            return Ok((*cached).clone());
        }

        let stored = self
            .storage
            .get(&oid.to_hex())
            .await
            .with_context(|| format!("Failed to read object {}", oid))?;
        let data = decompress(&stored).with_context(|| format!("Corrupt object {}", oid))?;

        let computed = Oid::hash(&data);
        if computed != *oid {
            warn!(expected = %oid, computed = %computed, "Object integrity check failed");
            anyhow::bail!(
                "Object integrity check failed: expected {}, got {}",
                oid,
                computed
            );
        }

        self.cache.insert(*oid, Arc::new(data.clone())).await;
        Ok(data)
    }

    /// Whether the object is stored
    pub async fn exists(&self, oid: &Oid) -> anyhow::Result<bool> {
        if self.cache.contains_key(oid) {
            return Ok(true);
        }
        self.storage.exists(&oid.to_hex()).await
    }
}

impl fmt::Debug for ObjectDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDatabase")
            .field("storage", &self.storage)
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

fn compress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn decompress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use playgist_storage::mock::MockBackend;

    fn odb_with_backend() -> (ObjectDatabase, MockBackend) {
        let backend = MockBackend::new();
        let odb = ObjectDatabase::new(Arc::new(backend.clone()), 16);
        (odb, backend)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (odb, _) = odb_with_backend();
        let oid = odb.write(ObjectType::Blob, b"trackA\ntrackB\n").await.unwrap();

        assert_eq!(oid, Oid::hash(b"trackA\ntrackB\n"));
        assert_eq!(odb.read(&oid).await.unwrap(), b"trackA\ntrackB\n");
        assert!(odb.exists(&oid).await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_bytes_are_compressed() {
        let (odb, backend) = odb_with_backend();
        let data = b"spotify:track:0000\n".repeat(64);
        let oid = odb.write(ObjectType::Blob, &data).await.unwrap();

        let stored = backend.get(&oid.to_hex()).await.unwrap();
        assert!(stored.len() < data.len());
        assert_eq!(decompress(&stored).unwrap(), data);
    }

    #[tokio::test]
    async fn test_deduplication() {
        let (odb, backend) = odb_with_backend();
        let a = odb.write(ObjectType::Blob, b"same").await.unwrap();
        let b = odb.write(ObjectType::Blob, b"same").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_read_missing_object() {
        let (odb, _) = odb_with_backend();
        let err = odb.read(&Oid::hash(b"never written")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("object not found"));
    }

    #[tokio::test]
    async fn test_integrity_check_on_uncached_read() {
        let backend = MockBackend::new();
        let oid = Oid::hash(b"original");
        backend
            .put(&oid.to_hex(), &compress(b"tampered").unwrap())
            .await
            .unwrap();

        let odb = ObjectDatabase::new(Arc::new(backend), 16);
        let err = odb.read(&oid).await.unwrap_err();
        assert!(err.to_string().contains("integrity check failed"));
    }
}
