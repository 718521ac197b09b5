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

//! Repository facade: stage, commit and read back
//!
//! Layout of a repository:
//!
//! ```text
//! <workdir>/                 tracked files
//! <workdir>/.playgist/
//!     HEAD                   ref: refs/heads/main
//!     refs/heads/main        current branch tip
//!     refs/remotes/<r>/main  remote tracking refs
//!     objects/               zlib-compressed objects
//!     index                  staging index (JSON)
//! ```

use crate::error::VersioningError;
use crate::index::{Index, IndexEntry};
use crate::lock;
use crate::refs::RefDatabase;
use crate::remote::Remote;
use crate::tree::{self, FileMode, Tree};
use crate::{Commit, ObjectDatabase, ObjectType, Oid, Signature};
use anyhow::Context;
use playgist_storage::LocalBackend;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the metadata directory inside the working tree
pub const META_DIR: &str = ".playgist";

/// Branch `HEAD` points at in a new repository
pub const DEFAULT_BRANCH: &str = "refs/heads/main";

const OBJECT_CACHE_CAPACITY: u64 = 1024;

/// Name and email recorded on commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

impl Identity {
    /// Create an identity
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Signature for a commit made now
    pub fn signature(&self) -> Signature {
        Signature::now(self.name.clone(), self.email.clone())
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new("playgist", "playgist@localhost")
    }
}

/// A working tree plus its `.playgist` metadata
pub struct Repository {
    workdir: PathBuf,
    meta_dir: PathBuf,
    pub(crate) odb: ObjectDatabase,
    pub(crate) refs: RefDatabase,
    identity: Identity,
    pub(crate) remotes: HashMap<String, Remote>,
}

impl Repository {
    /// Create the metadata layout in `workdir` (if missing) and open it
    ///
    /// Initializing an existing repository leaves its refs untouched.
    pub async fn init<P: AsRef<Path>>(workdir: P) -> anyhow::Result<Self> {
        let workdir = workdir.as_ref();
        let meta_dir = workdir.join(META_DIR);

        tokio::fs::create_dir_all(meta_dir.join("objects"))
            .await
            .with_context(|| format!("Failed to create {}", meta_dir.display()))?;
        tokio::fs::create_dir_all(meta_dir.join("refs").join("heads")).await?;

        let refs = RefDatabase::new(&meta_dir);
        if !refs.exists("HEAD").await? {
            refs.update_symbolic("HEAD", DEFAULT_BRANCH).await?;
            info!(workdir = %workdir.display(), "Initialized repository");
        }

        Self::open(workdir).await
    }

    /// Open an existing repository
    pub async fn open<P: AsRef<Path>>(workdir: P) -> anyhow::Result<Self> {
        let given = workdir.as_ref();
        let meta_dir = given.join(META_DIR);
        if !tokio::fs::try_exists(meta_dir.join("HEAD")).await.unwrap_or(false) {
            return Err(VersioningError::NotARepository(given.to_path_buf()).into());
        }

        let workdir = tokio::fs::canonicalize(given)
            .await
            .with_context(|| format!("Failed to resolve {}", given.display()))?;
        let meta_dir = workdir.join(META_DIR);

        let storage = LocalBackend::new(&meta_dir).await?;
        let odb = ObjectDatabase::new(Arc::new(storage), OBJECT_CACHE_CAPACITY);
        let refs = RefDatabase::new(&meta_dir);

        debug!(workdir = %workdir.display(), "Opened repository");
        Ok(Self {
            workdir,
            meta_dir,
            odb,
            refs,
            identity: Identity::default(),
            remotes: HashMap::new(),
        })
    }

    /// Open `workdir`, initializing it first if it is not a repository
    pub async fn open_or_init<P: AsRef<Path>>(workdir: P) -> anyhow::Result<Self> {
        match Self::open(workdir.as_ref()).await {
            Ok(repo) => Ok(repo),
            Err(e) if matches!(VersioningError::find(&e), Some(VersioningError::NotARepository(_))) => {
                Self::init(workdir).await
            }
            Err(e) => Err(e),
        }
    }

    /// Working tree root (canonical)
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Metadata directory
    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    /// Identity used for new commits
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Replace the commit identity
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    /// Object database
    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    /// Reference database
    pub fn refs(&self) -> &RefDatabase {
        &self.refs
    }

    /// Resolve `path` to a repository-relative, `/`-separated path
    ///
    /// Accepts absolute paths inside the working tree and relative paths
    /// (taken relative to the working tree). `..` is resolved lexically.
    pub fn relative_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<String> {
        let path = path.as_ref();
        let outside = || VersioningError::PathOutsideRepository(path.to_path_buf());

        let relative: PathBuf = if path.is_absolute() {
            match path.strip_prefix(&self.workdir) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    let canonical = std::fs::canonicalize(path).map_err(|_| outside())?;
                    canonical
                        .strip_prefix(&self.workdir)
                        .map_err(|_| outside())?
                        .to_path_buf()
                }
            }
        } else {
            path.to_path_buf()
        };

        let mut segments: Vec<String> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| anyhow::anyhow!("Path is not valid UTF-8: {}", path.display()))?;
                    segments.push(part.to_string());
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if segments.pop().is_none() {
                        return Err(outside().into());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(outside().into()),
            }
        }

        match segments.first() {
            None => Err(outside().into()),
            Some(first) if first == META_DIR => Err(outside().into()),
            Some(_) => Ok(segments.join("/")),
        }
    }

    /// Stage the current content of `paths`
    ///
    /// A path whose file no longer exists is staged as a removal. Returns the
    /// number of staged paths.
    pub async fn stage<P: AsRef<Path>>(&self, paths: &[P]) -> anyhow::Result<usize> {
        let mut staged = Vec::with_capacity(paths.len());
        let mut removed = Vec::new();

        for path in paths {
            let rel = self.relative_path(path)?;
            let abs = self.workdir.join(&rel);

            match tokio::fs::read(&abs).await {
                Ok(data) => {
                    let oid = self.odb.write(ObjectType::Blob, &data).await?;
                    debug!(path = %rel, oid = %oid, size = data.len(), "Staged file");
                    staged.push(IndexEntry::new(
                        rel,
                        oid,
                        FileMode::Regular.as_u32(),
                        data.len() as u64,
                    ));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %rel, "Staged removal");
                    removed.push(rel);
                }
                Err(e) => {
                    return Err(anyhow::Error::from(e)
                        .context(format!("Failed to read {}", abs.display())));
                }
            }
        }

        Index::update(&self.meta_dir, |index| {
            for entry in staged {
                index.add_entry(entry);
            }
            for rel in removed {
                index.mark_deleted(rel);
            }
            Ok(())
        })
        .await?;
        Ok(paths.len())
    }

    /// Commit staged changes for `paths` (all staged paths when empty)
    ///
    /// The new commit's single parent is the branch tip read at the start;
    /// the branch is advanced with compare-and-swap against that value.
    pub async fn commit<P: AsRef<Path>>(&self, message: &str, paths: &[P]) -> anyhow::Result<Oid> {
        let requested = paths
            .iter()
            .map(|p| self.relative_path(p))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let index = Index::load(&self.meta_dir)?;
        let changes = index.changes_for(&requested)?;
        if changes.is_empty() {
            return Err(VersioningError::NothingToCommit.into());
        }

        let branch = self.refs.resolve_name("HEAD").await?;
        let parent = self.refs.try_resolve(&branch).await?;
        let base_tree = match parent {
            Some(oid) => Some(Commit::read(&self.odb, &oid).await?.tree),
            None => None,
        };

        let tree_oid = tree::apply_changes(&self.odb, base_tree, changes.clone())
            .await
            .context("Failed to build tree")?;

        let signature = self.identity.signature();
        let commit = Commit::new(
            tree_oid,
            parent.into_iter().collect(),
            signature.clone(),
            signature,
            message.to_string(),
        );
        let commit_oid = commit.write(&self.odb).await?;

        self.refs
            .compare_and_swap(&branch, parent, commit_oid)
            .await?;

        Index::update(&self.meta_dir, |index| {
            index.clear_committed(&changes);
            Ok(())
        })
        .await?;

        info!(
            oid = %commit_oid,
            branch = %branch,
            paths = changes.len(),
            message = %commit.summary(),
            "Created commit"
        );
        Ok(commit_oid)
    }

    /// Commit, re-reading head and rebuilding on a lost ref race
    ///
    /// A race is lost when the branch moved or its lock stayed held by
    /// another writer. Tries back off briefly between each other; at most
    /// `attempts` are made (at least one).
    pub async fn commit_with_retry<P: AsRef<Path>>(
        &self,
        message: &str,
        paths: &[P],
        attempts: u32,
    ) -> anyhow::Result<Oid> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.commit(message, paths).await {
                Err(e) if attempt < attempts && VersioningError::is_lost_race(&e) => {
                    warn!(attempt, error = %e, "Lost branch race during commit, retrying");
                    tokio::time::sleep(lock::backoff(attempt)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Tip of the current branch, `None` before the first commit
    pub async fn head(&self) -> anyhow::Result<Option<Oid>> {
        self.refs.try_resolve("HEAD").await
    }

    /// Tree of the head commit; empty before the first commit
    pub async fn head_tree(&self) -> anyhow::Result<Tree> {
        match self.head().await? {
            Some(oid) => {
                let commit = self.read_commit(&oid).await?;
                self.read_tree(&commit.tree).await
            }
            None => Ok(Tree::new()),
        }
    }

    /// Content of a blob
    pub async fn read_blob(&self, oid: &Oid) -> anyhow::Result<Vec<u8>> {
        self.odb.read(oid).await
    }

    /// Decode a commit
    pub async fn read_commit(&self, oid: &Oid) -> anyhow::Result<Commit> {
        Commit::read(&self.odb, oid).await
    }

    /// Decode a tree
    pub async fn read_tree(&self, oid: &Oid) -> anyhow::Result<Tree> {
        Tree::read(&self.odb, oid).await
    }

    /// All files under `tree`, depth-first, as `(path, blob oid)`
    ///
    /// Entries whose name starts with `.` are skipped together with
    /// everything beneath them.
    pub async fn walk_tree(&self, tree: &Tree) -> anyhow::Result<Vec<(String, Oid)>> {
        let mut files = Vec::new();
        let mut stack: Vec<(String, Tree)> = vec![(String::new(), tree.clone())];

        while let Some((prefix, current)) = stack.pop() {
            let mut subtrees = Vec::new();
            for entry in current.iter() {
                if entry.name.starts_with('.') {
                    continue;
                }
                let path = if prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{}/{}", prefix, entry.name)
                };

                if entry.is_tree() {
                    subtrees.push((path, entry.oid));
                } else {
                    files.push((path, entry.oid));
                }
            }
            // Reverse so the first subtree is visited next
            for (path, oid) in subtrees.into_iter().rev() {
                stack.push((path, self.read_tree(&oid).await?));
            }
        }

        Ok(files)
    }

    /// First-parent history from head, newest first
    pub async fn log(&self, limit: usize) -> anyhow::Result<Vec<(Oid, Commit)>> {
        let mut history = Vec::new();
        let mut next = self.head().await?;

        while let Some(oid) = next {
            if history.len() >= limit {
                break;
            }
            let commit = self.read_commit(&oid).await?;
            next = commit.first_parent().copied();
            history.push((oid, commit));
        }

        Ok(history)
    }

    /// Content of `path` in the head commit, `None` if absent
    pub async fn file_at_head<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<Option<Vec<u8>>> {
        let rel = self.relative_path(path)?;
        let mut tree = self.head_tree().await?;
        let mut segments = rel.split('/').peekable();

        while let Some(segment) = segments.next() {
            let Some(entry) = tree.get_entry(segment).cloned() else {
                return Ok(None);
            };
            if segments.peek().is_none() {
                if entry.is_blob() {
                    return Ok(Some(self.read_blob(&entry.oid).await?));
                }
                return Ok(None);
            }
            if !entry.is_tree() {
                return Ok(None);
            }
            tree = self.read_tree(&entry.oid).await?;
        }

        Ok(None)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .field("identity", &self.identity)
            .field("remotes", &self.remotes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).await.unwrap();
        (temp, repo)
    }

    fn write_file(repo: &Repository, rel: &str, content: &str) {
        let path = repo.workdir().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_init_layout() {
        let (temp, repo) = repo().await;
        let meta = temp.path().join(META_DIR);

        assert!(meta.join("objects").is_dir());
        assert_eq!(
            std::fs::read_to_string(meta.join("HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
        assert_eq!(repo.head().await.unwrap(), None);
        assert!(repo.head_tree().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_requires_metadata() {
        let temp = TempDir::new().unwrap();
        let err = Repository::open(temp.path()).await.unwrap_err();
        assert!(matches!(
            VersioningError::find(&err),
            Some(VersioningError::NotARepository(_))
        ));

        let repo = Repository::open_or_init(temp.path()).await.unwrap();
        assert!(repo.meta_dir().join("HEAD").exists());
        Repository::open_or_init(temp.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_relative_path() {
        let (_temp, repo) = repo().await;

        assert_eq!(repo.relative_path("alice/p1").unwrap(), "alice/p1");
        assert_eq!(repo.relative_path("./alice/../bob/p2").unwrap(), "bob/p2");
        assert_eq!(
            repo.relative_path(repo.workdir().join("alice").join("p1")).unwrap(),
            "alice/p1"
        );

        assert!(repo.relative_path("../escape").is_err());
        assert!(repo.relative_path("").is_err());
        assert!(repo.relative_path(".playgist/HEAD").is_err());
        assert!(repo.relative_path("/definitely/not/here").is_err());
    }

    #[tokio::test]
    async fn test_stage_and_commit() {
        let (_temp, repo) = repo().await;
        write_file(&repo, "alice/p1", "trackA\n");

        assert_eq!(repo.stage(&["alice/p1"]).await.unwrap(), 1);
        let oid = repo.commit("added playlist: p1", &["alice/p1"]).await.unwrap();

        assert_eq!(repo.head().await.unwrap(), Some(oid));
        let commit = repo.read_commit(&oid).await.unwrap();
        assert!(commit.is_initial());
        assert_eq!(commit.message, "added playlist: p1");
        assert_eq!(
            repo.file_at_head("alice/p1").await.unwrap(),
            Some(b"trackA\n".to_vec())
        );
        assert!(Index::load(repo.meta_dir()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_staged_entry() {
        let (_temp, repo) = repo().await;
        let err = repo.commit("nothing", &["alice/p1"]).await.unwrap_err();
        assert!(matches!(
            VersioningError::find(&err),
            Some(VersioningError::NothingToCommit)
        ));
    }

    #[tokio::test]
    async fn test_commit_chain_and_log() {
        let (_temp, repo) = repo().await;

        write_file(&repo, "alice/p1", "a\n");
        repo.stage(&["alice/p1"]).await.unwrap();
        let first = repo.commit("one", &["alice/p1"]).await.unwrap();

        write_file(&repo, "bob/p2", "b\n");
        repo.stage(&["bob/p2"]).await.unwrap();
        let second = repo.commit_with_retry("two", &["bob/p2"], 3).await.unwrap();

        let log = repo.log(10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, second);
        assert_eq!(log[0].1.parents, vec![first]);
        assert_eq!(log[1].0, first);
        assert_eq!(repo.log(1).await.unwrap().len(), 1);

        // Earlier file survives the second commit
        assert_eq!(
            repo.file_at_head("alice/p1").await.unwrap(),
            Some(b"a\n".to_vec())
        );
    }

    #[tokio::test]
    async fn test_commit_only_requested_paths() {
        let (_temp, repo) = repo().await;
        write_file(&repo, "alice/p1", "a\n");
        write_file(&repo, "alice/p2", "b\n");
        repo.stage(&["alice/p1", "alice/p2"]).await.unwrap();

        repo.commit("only p1", &["alice/p1"]).await.unwrap();
        assert!(repo.file_at_head("alice/p2").await.unwrap().is_none());

        let index = Index::load(repo.meta_dir()).unwrap();
        assert!(index.is_staged("alice/p2"));
    }

    #[tokio::test]
    async fn test_staged_removal() {
        let (_temp, repo) = repo().await;
        write_file(&repo, "alice/p1", "a\n");
        repo.stage(&["alice/p1"]).await.unwrap();
        repo.commit("add", &["alice/p1"]).await.unwrap();

        std::fs::remove_file(repo.workdir().join("alice/p1")).unwrap();
        repo.stage(&["alice/p1"]).await.unwrap();
        repo.commit("remove", &["alice/p1"]).await.unwrap();

        assert!(repo.file_at_head("alice/p1").await.unwrap().is_none());
        assert!(repo.head_tree().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stage_directory_fails() {
        let (_temp, repo) = repo().await;
        std::fs::create_dir_all(repo.workdir().join("alice/p1")).unwrap();
        assert!(repo.stage(&["alice/p1"]).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_fails_when_branch_locked() {
        let (_temp, repo) = repo().await;
        write_file(&repo, "alice/p1", "a\n");
        repo.stage(&["alice/p1"]).await.unwrap();
        std::fs::write(repo.meta_dir().join("refs/heads/main.lock"), b"").unwrap();

        let err = repo.commit_with_retry("x", &["alice/p1"], 3).await.unwrap_err();
        assert!(matches!(
            VersioningError::find(&err),
            Some(VersioningError::RefLocked(_))
        ));
        assert_eq!(repo.head().await.unwrap(), None);
        assert!(Index::load(repo.meta_dir()).unwrap().is_staged("alice/p1"));
    }

    #[tokio::test]
    async fn test_walk_tree_skips_dot_entries() {
        let (_temp, repo) = repo().await;
        write_file(&repo, "alice/p1", "a\n");
        write_file(&repo, "alice/sub/p2", "b\n");
        write_file(&repo, ".hidden/p3", "c\n");
        write_file(&repo, "alice/.p4", "d\n");
        repo.stage(&["alice/p1", "alice/sub/p2", ".hidden/p3", "alice/.p4"])
            .await
            .unwrap();
        repo.commit("all", &[] as &[&str]).await.unwrap();

        let tree = repo.head_tree().await.unwrap();
        let paths: Vec<String> = repo
            .walk_tree(&tree)
            .await
            .unwrap()
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(paths, vec!["alice/p1".to_string(), "alice/sub/p2".to_string()]);
    }

    #[tokio::test]
    async fn test_identity_used_for_commits() {
        let (_temp, mut repo) = repo().await;
        repo.set_identity(Identity::new("Alice", "alice@example.com"));
        write_file(&repo, "alice/p1", "a\n");
        repo.stage(&["alice/p1"]).await.unwrap();
        let oid = repo.commit("x", &["alice/p1"]).await.unwrap();

        let commit = repo.read_commit(&oid).await.unwrap();
        assert_eq!(commit.author.name, "Alice");
        assert_eq!(commit.committer.email, "alice@example.com");
    }
}
