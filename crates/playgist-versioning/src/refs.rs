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

//! References: movable names for commits
//!
//! Refs are small text files under the metadata directory:
//! - direct refs hold a hex OID (`refs/heads/main`, `refs/remotes/origin/main`)
//! - symbolic refs hold `ref: <target>` (`HEAD`)
//!
//! Every write goes through the ref's lock file and a rename. Branch advances use
//! [`RefDatabase::compare_and_swap`], which takes the `<ref>.lock` file
//! (waiting briefly while another writer holds it), checks the current
//! value, then renames the lock file over the ref.

use crate::error::VersioningError;
use crate::lock::LockFile;
use crate::Oid;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const MAX_SYMBOLIC_DEPTH: usize = 10;

/// Parsed content of a ref file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    /// Points at a commit
    Direct(Oid),
    /// Points at another ref
    Symbolic(String),
}

impl Ref {
    /// File content for this ref
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Ref::Direct(oid) => format!("{}\n", oid.to_hex()).into_bytes(),
            Ref::Symbolic(target) => format!("ref: {}\n", target).into_bytes(),
        }
    }

    /// Parse ref file content
    pub fn deserialize(data: &[u8]) -> anyhow::Result<Self> {
        let content = std::str::from_utf8(data)
            .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in ref file: {}", e))?
            .trim();

        if let Some(target) = content.strip_prefix("ref: ") {
            if target.is_empty() {
                anyhow::bail!("Symbolic reference has an empty target");
            }
            Ok(Ref::Symbolic(target.to_string()))
        } else {
            let oid = Oid::from_hex(content)
                .map_err(|e| anyhow::anyhow!("Invalid OID in ref file: {}", e))?;
            Ok(Ref::Direct(oid))
        }
    }
}

/// File-backed reference store rooted at a metadata directory
#[derive(Debug, Clone)]
pub struct RefDatabase {
    root: PathBuf,
}

impl RefDatabase {
    /// Reference store rooted at `root` (the `.playgist` directory)
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn ref_path(&self, ref_name: &str) -> PathBuf {
        self.root.join(ref_name)
    }

    /// Overwrite a ref unconditionally
    pub async fn write(&self, ref_name: &str, r: &Ref) -> anyhow::Result<()> {
        if ref_name.is_empty() {
            anyhow::bail!("Reference name cannot be empty");
        }

        let path = self.ref_path(ref_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let Some(mut lock) = LockFile::acquire(&path).await? else {
            return Err(VersioningError::RefLocked(ref_name.to_string()).into());
        };
        lock.write_all(&r.serialize()).await?;
        lock.commit().await?;
        debug!(ref_name = %ref_name, "Reference written");
        Ok(())
    }

    /// Read a ref; `None` when it does not exist
    pub async fn read(&self, ref_name: &str) -> anyhow::Result<Option<Ref>> {
        match fs::read(self.ref_path(ref_name)).await {
            Ok(data) => Ok(Some(Ref::deserialize(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the ref file exists
    pub async fn exists(&self, ref_name: &str) -> anyhow::Result<bool> {
        Ok(fs::try_exists(self.ref_path(ref_name)).await?)
    }

    /// Point a symbolic ref at `target`
    pub async fn update_symbolic(&self, ref_name: &str, target: &str) -> anyhow::Result<()> {
        self.write(ref_name, &Ref::Symbolic(target.to_string())).await
    }

    /// Follow symbolic refs and return the final ref name
    ///
    /// `HEAD` on a fresh repository resolves to `refs/heads/main` even though
    /// that branch has no commits yet.
    pub async fn resolve_name(&self, ref_name: &str) -> anyhow::Result<String> {
        let mut current = ref_name.to_string();
        for _ in 0..MAX_SYMBOLIC_DEPTH {
            match self.read(&current).await? {
                Some(Ref::Symbolic(target)) => current = target,
                _ => return Ok(current),
            }
        }
        anyhow::bail!("Circular reference detected in: {}", ref_name)
    }

    /// Resolve a ref to an OID; `None` for a ref (or branch) without commits
    pub async fn try_resolve(&self, ref_name: &str) -> anyhow::Result<Option<Oid>> {
        let name = self.resolve_name(ref_name).await?;
        match self.read(&name).await? {
            Some(Ref::Direct(oid)) => Ok(Some(oid)),
            Some(Ref::Symbolic(_)) => anyhow::bail!("Unresolved symbolic reference: {}", name),
            None => Ok(None),
        }
    }

    /// Resolve a ref to an OID, failing when it does not exist
    pub async fn resolve(&self, ref_name: &str) -> anyhow::Result<Oid> {
        self.try_resolve(ref_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Reference not found: {}", ref_name))
    }

    /// Set a direct ref to `new_oid` only if it currently equals `expected`
    ///
    /// `expected == None` means the ref must not exist yet. Fails with
    /// [`VersioningError::RefConflict`] on mismatch and
    /// [`VersioningError::RefLocked`] when another writer still holds the
    /// lock after a short wait.
    pub async fn compare_and_swap(
        &self,
        ref_name: &str,
        expected: Option<Oid>,
        new_oid: Oid,
    ) -> anyhow::Result<()> {
        let path = self.ref_path(ref_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let Some(mut lock) = LockFile::acquire(&path).await? else {
            return Err(VersioningError::RefLocked(ref_name.to_string()).into());
        };

        let current = match self.read(ref_name).await? {
            Some(Ref::Direct(oid)) => Some(oid),
            Some(Ref::Symbolic(target)) => {
                anyhow::bail!("Cannot swap symbolic reference {} -> {}", ref_name, target)
            }
            None => None,
        };

        if current != expected {
            return Err(VersioningError::RefConflict {
                name: ref_name.to_string(),
                expected: describe(expected),
                actual: describe(current),
            }
            .into());
        }

        lock.write_all(&Ref::Direct(new_oid).serialize()).await?;
        lock.commit().await?;

        debug!(
            ref_name = %ref_name,
            old = %describe(expected),
            new = %new_oid,
            "Reference swapped"
        );
        Ok(())
    }
}

fn describe(oid: Option<Oid>) -> String {
    oid.map(|o| o.to_hex()).unwrap_or_else(|| "none".to_string())
}

/// Expand a short branch name to its full ref path
///
/// ```
/// use playgist_versioning::normalize_ref_name;
///
/// assert_eq!(normalize_ref_name("main"), "refs/heads/main");
/// assert_eq!(normalize_ref_name("refs/heads/main"), "refs/heads/main");
/// assert_eq!(normalize_ref_name("HEAD"), "HEAD");
/// ```
pub fn normalize_ref_name(input: &str) -> String {
    if input.starts_with("refs/") || input == "HEAD" {
        input.to_string()
    } else {
        format!("refs/heads/{}", input)
    }
}
