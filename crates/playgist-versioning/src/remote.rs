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

//! Remotes and push
//!
//! The only transport is a repository on the local filesystem, named by a
//! `file://` URL or a plain path. A push copies the objects reachable from
//! the local ref that the remote lacks, then advances the remote ref with
//! compare-and-swap. Only fast-forward updates are accepted.

use crate::progress::ProgressSink;
use crate::refs::{normalize_ref_name, Ref};
use crate::tree::FileMode;
use crate::{Commit, ObjectType, Oid, Repository, Tree};
use anyhow::Context;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{info, warn};

/// A named remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Remote name (e.g. "origin")
    pub name: String,
    /// Location: `file:///path` or a plain path
    pub url: String,
}

impl Remote {
    /// Create a remote
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Filesystem path of the remote working tree
    pub fn local_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.url.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if self.url.contains("://") {
            anyhow::bail!("Unsupported remote transport: {}", self.url);
        }
        Ok(PathBuf::from(&self.url))
    }
}

/// Source and destination refs of a push, parsed from `src[:dst]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    /// Local ref
    pub src: String,
    /// Remote ref
    pub dst: String,
}

impl RefSpec {
    /// Parse `src[:dst]`; short names expand to `refs/heads/<name>`
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let spec = spec.strip_prefix('+').unwrap_or(spec);
        let (src, dst) = match spec.split_once(':') {
            Some((src, dst)) => (src, dst),
            None => (spec, spec),
        };
        if src.is_empty() || dst.is_empty() {
            anyhow::bail!("Invalid refspec: {}", spec);
        }

        Ok(Self {
            src: normalize_ref_name(src),
            dst: normalize_ref_name(dst),
        })
    }
}

/// One ref advanced on the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    /// Local ref pushed
    pub src: String,
    /// Remote ref updated
    pub dst: String,
    /// Remote value before the push
    pub old: Option<Oid>,
    /// Remote value after the push
    pub new: Oid,
}

/// Outcome of [`Repository::push`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushResult {
    /// Remote name; empty for a failed push
    pub remote: String,
    /// Refs advanced on the remote
    pub updates: Vec<RefUpdate>,
    /// Objects copied
    pub objects_sent: usize,
}

impl PushResult {
    /// Result reported for a failed push
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing was updated
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

impl Repository {
    /// Register (or replace) a remote
    pub fn add_remote(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let remote = Remote::new(name, url);
        self.remotes.insert(remote.name.clone(), remote);
    }

    /// Look up a remote by name
    pub fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.get(name)
    }

    /// Push `refspec` to `remote`
    ///
    /// Never fails: any error is logged and reported as
    /// [`PushResult::empty`].
    pub async fn push(
        &self,
        remote: &str,
        refspec: &str,
        progress: &mut dyn ProgressSink,
    ) -> PushResult {
        match self.try_push(remote, refspec, progress).await {
            Ok(result) => result,
            Err(e) => {
                warn!(remote = %remote, refspec = %refspec, error = %format!("{:#}", e), "Push failed");
                PushResult::empty()
            }
        }
    }

    async fn try_push(
        &self,
        remote_name: &str,
        refspec: &str,
        progress: &mut dyn ProgressSink,
    ) -> anyhow::Result<PushResult> {
        let remote = self
            .remote(remote_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown remote: {}", remote_name))?;
        let spec = RefSpec::parse(refspec)?;

        let local_tip = self
            .refs
            .try_resolve(&spec.src)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Nothing to push: {} has no commits", spec.src))?;

        let target = Repository::open(remote.local_path()?)
            .await
            .with_context(|| format!("Failed to open remote {}", remote.url))?;
        let remote_old = target.refs.try_resolve(&spec.dst).await?;

        let mut result = PushResult {
            remote: remote_name.to_string(),
            updates: Vec::new(),
            objects_sent: 0,
        };

        if remote_old == Some(local_tip) {
            self.update_tracking_ref(remote_name, &spec.dst, local_tip).await?;
            info!(remote = %remote_name, ref_name = %spec.dst, "Remote already up to date");
            return Ok(result);
        }

        if let Some(old) = remote_old {
            if !self.is_ancestor(old, local_tip).await? {
                anyhow::bail!(
                    "Non-fast-forward push to {}: {} is not an ancestor of {}",
                    spec.dst,
                    old,
                    local_tip
                );
            }
        }

        progress.start(2);
        let missing = self.collect_missing_objects(&target, local_tip).await?;
        progress.begin_task("Sending objects", missing.len());
        for (oid, obj_type) in &missing {
            let data = self.odb.read(oid).await?;
            target.odb.write(*obj_type, &data).await?;
            progress.update(1);
        }
        progress.end_task();
        result.objects_sent = missing.len();

        progress.begin_task("Updating references", 1);
        target
            .refs
            .compare_and_swap(&spec.dst, remote_old, local_tip)
            .await?;
        progress.update(1);
        progress.end_task();

        self.update_tracking_ref(remote_name, &spec.dst, local_tip).await?;

        info!(
            remote = %remote_name,
            ref_name = %spec.dst,
            old = %remote_old.map(|o| o.short()).unwrap_or_default(),
            new = %local_tip.short(),
            objects = result.objects_sent,
            "Push complete"
        );
        result.updates.push(RefUpdate {
            src: spec.src,
            dst: spec.dst,
            old: remote_old,
            new: local_tip,
        });
        Ok(result)
    }

    async fn update_tracking_ref(&self, remote: &str, dst: &str, oid: Oid) -> anyhow::Result<()> {
        let branch = dst.strip_prefix("refs/heads/").unwrap_or(dst);
        let tracking = format!("refs/remotes/{}/{}", remote, branch);
        self.refs.write(&tracking, &Ref::Direct(oid)).await
    }

    /// Whether `ancestor` is reachable from `tip` through parent links
    pub async fn is_ancestor(&self, ancestor: Oid, tip: Oid) -> anyhow::Result<bool> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([tip]);

        while let Some(oid) = queue.pop_front() {
            if oid == ancestor {
                return Ok(true);
            }
            if !visited.insert(oid) {
                continue;
            }
            let commit = Commit::read(&self.odb, &oid).await?;
            queue.extend(commit.parents);
        }
        Ok(false)
    }

    /// Objects reachable from `tip` that `target` does not have
    ///
    /// A commit the target already stores is assumed to come with its whole
    /// history, so traversal stops there.
    async fn collect_missing_objects(
        &self,
        target: &Repository,
        tip: Oid,
    ) -> anyhow::Result<Vec<(Oid, ObjectType)>> {
        let mut visited = HashSet::new();
        let mut missing = Vec::new();
        let mut queue = VecDeque::from([(tip, ObjectType::Commit)]);
        visited.insert(tip);

        while let Some((oid, obj_type)) = queue.pop_front() {
            if target.odb.exists(&oid).await? {
                continue;
            }
            missing.push((oid, obj_type));

            match obj_type {
                ObjectType::Commit => {
                    let commit = Commit::read(&self.odb, &oid)
                        .await
                        .with_context(|| format!("Failed to read commit {}", oid))?;
                    if visited.insert(commit.tree) {
                        queue.push_back((commit.tree, ObjectType::Tree));
                    }
                    for parent in commit.parents {
                        if visited.insert(parent) {
                            queue.push_back((parent, ObjectType::Commit));
                        }
                    }
                }
                ObjectType::Tree => {
                    let tree = Tree::read(&self.odb, &oid)
                        .await
                        .with_context(|| format!("Failed to read tree {}", oid))?;
                    for entry in tree.iter() {
                        if visited.insert(entry.oid) {
                            let entry_type = match entry.mode {
                                FileMode::Directory => ObjectType::Tree,
                                _ => ObjectType::Blob,
                            };
                            queue.push_back((entry.oid, entry_type));
                        }
                    }
                }
                ObjectType::Blob => {}
            }
        }

        // Parents before children so a partially copied remote stays readable
        missing.reverse();
        Ok(missing)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::{LoggingProgress, NoProgress};
    use tempfile::TempDir;

    async fn repo_with_commit(dir: &std::path::Path, content: &str) -> Repository {
        let repo = Repository::init(dir).await.unwrap();
        std::fs::create_dir_all(repo.workdir().join("alice")).unwrap();
        std::fs::write(repo.workdir().join("alice/p1"), content).unwrap();
        repo.stage(&["alice/p1"]).await.unwrap();
        repo.commit("commit", &["alice/p1"]).await.unwrap();
        repo
    }

    #[test]
    fn test_remote_local_path() {
        assert_eq!(
            Remote::new("origin", "file:///srv/playgists").local_path().unwrap(),
            PathBuf::from("/srv/playgists")
        );
        assert_eq!(
            Remote::new("origin", "/srv/playgists").local_path().unwrap(),
            PathBuf::from("/srv/playgists")
        );
        assert!(Remote::new("origin", "https://example.com/x").local_path().is_err());
    }

    #[test]
    fn test_refspec_parse() {
        let spec = RefSpec::parse("main").unwrap();
        assert_eq!(spec.src, "refs/heads/main");
        assert_eq!(spec.dst, "refs/heads/main");

        let spec = RefSpec::parse("+refs/heads/main:refs/heads/backup").unwrap();
        assert_eq!(spec.dst, "refs/heads/backup");

        assert!(RefSpec::parse(":main").is_err());
    }

    #[tokio::test]
    async fn test_push_to_empty_remote() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let mut local = repo_with_commit(local_dir.path(), "a\n").await;
        let remote = Repository::init(remote_dir.path()).await.unwrap();
        local.add_remote("origin", remote_dir.path().to_string_lossy().to_string());

        let mut progress = LoggingProgress::new();
        let result = local.push("origin", "main", &mut progress).await;

        let tip = local.head().await.unwrap().unwrap();
        assert_eq!(result.remote, "origin");
        assert_eq!(result.updates.len(), 1);
        assert_eq!(result.updates[0].old, None);
        assert_eq!(result.updates[0].new, tip);
        // commit + root tree + alice tree + blob
        assert_eq!(result.objects_sent, 4);

        assert_eq!(remote.head().await.unwrap(), Some(tip));
        assert_eq!(
            remote.file_at_head("alice/p1").await.unwrap(),
            Some(b"a\n".to_vec())
        );
        assert_eq!(
            local.refs().resolve("refs/remotes/origin/main").await.unwrap(),
            tip
        );
    }

    #[tokio::test]
    async fn test_incremental_push_sends_only_new_objects() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let mut local = repo_with_commit(local_dir.path(), "a\n").await;
        Repository::init(remote_dir.path()).await.unwrap();
        local.add_remote("origin", format!("file://{}", remote_dir.path().display()));

        local.push("origin", "main", &mut NoProgress).await;

        std::fs::write(local.workdir().join("alice/p1"), "a\nb\n").unwrap();
        local.stage(&["alice/p1"]).await.unwrap();
        local.commit("second", &["alice/p1"]).await.unwrap();

        let result = local.push("origin", "main", &mut NoProgress).await;
        assert_eq!(result.updates.len(), 1);
        assert!(result.updates[0].old.is_some());
        // new commit + root tree + alice tree + blob
        assert_eq!(result.objects_sent, 4);

        let again = local.push("origin", "main", &mut NoProgress).await;
        assert!(again.is_empty());
        assert_eq!(again.remote, "origin");
    }

    #[tokio::test]
    async fn test_push_failures_return_empty() {
        let local_dir = TempDir::new().unwrap();
        let mut local = repo_with_commit(local_dir.path(), "a\n").await;

        let unknown = local.push("nowhere", "main", &mut NoProgress).await;
        assert_eq!(unknown, PushResult::empty());

        let missing_dir = local_dir.path().join("no-such-remote");
        local.add_remote("broken", missing_dir.to_string_lossy().to_string());
        assert!(local.push("broken", "main", &mut NoProgress).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_fast_forward_rejected() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let mut local = repo_with_commit(local_dir.path(), "local\n").await;
        let remote = repo_with_commit(remote_dir.path(), "diverged\n").await;
        let remote_tip = remote.head().await.unwrap();
        local.add_remote("origin", remote_dir.path().to_string_lossy().to_string());

        let result = local.push("origin", "main", &mut NoProgress).await;

        assert!(result.is_empty());
        assert_eq!(remote.head().await.unwrap(), remote_tip);
    }

    #[tokio::test]
    async fn test_is_ancestor() {
        let dir = TempDir::new().unwrap();
        let repo = repo_with_commit(dir.path(), "a\n").await;
        let first = repo.head().await.unwrap().unwrap();

        std::fs::write(repo.workdir().join("alice/p1"), "b\n").unwrap();
        repo.stage(&["alice/p1"]).await.unwrap();
        let second = repo.commit("two", &["alice/p1"]).await.unwrap();

        assert!(repo.is_ancestor(first, second).await.unwrap());
        assert!(!repo.is_ancestor(second, first).await.unwrap());
    }
}
