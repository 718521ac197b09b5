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

//! Minimal version control for playlist files
//!
//! This crate implements exactly what a write-through playlist store needs:
//! - Content-addressable object database with SHA-256 addressing, zlib on
//!   disk and a moka cache
//! - Trees rebuilt incrementally along changed paths
//! - Single-parent commits advancing a branch with ref compare-and-swap
//! - A JSON staging index
//! - Push to a repository on the local filesystem
//!
//! Merging, branching workflows and history rewriting are not provided.
//!
//! # Examples
//!
//! ```no_run
//! use playgist_versioning::{NoProgress, Repository};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut repo = Repository::open_or_init("/tmp/playgists").await?;
//!     std::fs::create_dir_all("/tmp/playgists/alice")?;
//!     std::fs::write("/tmp/playgists/alice/notes", "trackA\n")?;
//!
//!     repo.stage(&["alice/notes"]).await?;
//!     let oid = repo.commit("updated playlist: notes", &["alice/notes"]).await?;
//!     println!("Committed {}", oid);
//!
//!     repo.add_remote("backup", "file:///tmp/playgists-backup");
//!     let result = repo.push("backup", "main", &mut NoProgress).await;
//!     println!("Pushed {} objects", result.objects_sent);
//!     Ok(())
//! }
//! ```

mod commit;
mod error;
mod index;
mod lock;
mod object;
mod odb;
mod oid;
mod progress;
mod refs;
mod remote;
mod repository;
mod tree;

pub use commit::{Commit, Signature};
pub use error::VersioningError;
pub use index::{Index, IndexEntry};
pub use object::ObjectType;
pub use odb::ObjectDatabase;
pub use oid::Oid;
pub use progress::{LoggingProgress, NoProgress, ProgressSink};
pub use refs::{normalize_ref_name, Ref, RefDatabase};
pub use remote::{PushResult, RefSpec, RefUpdate, Remote};
pub use repository::{Identity, Repository, DEFAULT_BRANCH, META_DIR};
pub use tree::{apply_changes, FileMode, Tree, TreeChange, TreeEntry};
