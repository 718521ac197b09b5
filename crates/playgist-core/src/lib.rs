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

//! Version-controlled playlists
//!
//! Playlists are stored as small text files in a repository, one file per
//! playlist at `<owner>/<id>`. Every change made through a
//! [`PlaylistStore`] is written, staged and committed immediately, so the
//! repository history is the audit trail of the collection.
//!
//! # Examples
//!
//! ```no_run
//! use playgist_core::PlaylistStore;
//! use playgist_versioning::Repository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let repo = Repository::open_or_init("/tmp/playgists").await?;
//!     let mut store = PlaylistStore::open("alice", repo).await?;
//!
//!     let id = store.create("Road Trip").await?;
//!     store.add_track(&id, "spotify:track:6rqhFgbbKwnb9MLmUQDhG6").await;
//!
//!     for commit in store.repository().log(10).await? {
//!         println!("{} {}", commit.0.short(), commit.1.summary());
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod identifier;
pub mod pipeline;
pub mod playlist;
pub mod store;

pub use client::{same_playlist, ClientPlaylist, ExternalPlaylist};
pub use error::{CodecError, PipelineError, StoreError};
pub use pipeline::{ChangeEvent, PipelineReport, PipelineStage};
pub use playlist::{Playlist, PlaylistContent, PlaylistListener, TrackRef};
pub use store::{PlaylistStore, PushTarget, StoreOptions};
