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

//! Playlists as seen by a streaming client
//!
//! Store records and playlists fetched from elsewhere share the
//! [`ClientPlaylist`] view, so a client can list them side by side.

use crate::playlist::{Playlist, TrackRef};

/// Read-only playlist view
pub trait ClientPlaylist {
    /// Playlist id
    fn id(&self) -> &str;

    /// Display name, if known
    fn name(&self) -> Option<&str>;

    /// Author, if known
    fn author(&self) -> Option<&str>;

    /// Tracks in order
    fn tracks(&self) -> &[TrackRef];

    /// Whether others may edit the playlist
    fn is_collaborative(&self) -> bool;

    /// Whether there is at least one track
    fn has_tracks(&self) -> bool {
        !self.tracks().is_empty()
    }

    /// Service-side revision, if the source has one
    fn revision(&self) -> Option<&str>;

    /// Service-side content checksum, 0 when unknown
    fn checksum(&self) -> u64;
}

/// Store records carry no service revision or checksum
impl ClientPlaylist for Playlist {
    fn id(&self) -> &str {
        Playlist::id(self)
    }

    fn name(&self) -> Option<&str> {
        Playlist::name(self)
    }

    fn author(&self) -> Option<&str> {
        Playlist::author(self)
    }

    fn tracks(&self) -> &[TrackRef] {
        Playlist::tracks(self)
    }

    fn is_collaborative(&self) -> bool {
        Playlist::is_collaborative(self)
    }

    fn revision(&self) -> Option<&str> {
        None
    }

    fn checksum(&self) -> u64 {
        0
    }
}

/// A playlist owned by an external service
///
/// The id is fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalPlaylist {
    id: String,
    /// Display name
    pub name: Option<String>,
    /// Author
    pub author: Option<String>,
    /// Tracks in order
    pub tracks: Vec<TrackRef>,
    /// Collaborative flag
    pub collaborative: bool,
    /// Service-side revision
    pub revision: Option<String>,
    /// Service-side checksum, 0 when unknown
    pub checksum: u64,
}

impl ExternalPlaylist {
    /// Empty playlist with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

impl ClientPlaylist for ExternalPlaylist {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    fn is_collaborative(&self) -> bool {
        self.collaborative
    }

    fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn checksum(&self) -> u64 {
        self.checksum
    }
}

/// Whether `a` and `b` are the same playlist (ids compared ignoring case)
pub fn same_playlist(a: &dyn ClientPlaylist, b: &dyn ClientPlaylist) -> bool {
    a.id().eq_ignore_ascii_case(b.id())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::playlist::PlaylistContent;

    #[test]
    fn test_record_view() {
        let mut playlist = Playlist::new("abc", "alice/abc", PlaylistContent::default());
        playlist.set_name("Mix");
        let view: &dyn ClientPlaylist = &playlist;

        assert_eq!(view.name(), Some("Mix"));
        assert!(!view.has_tracks());
        assert_eq!(view.revision(), None);
        assert_eq!(view.checksum(), 0);
    }

    #[test]
    fn test_same_playlist_ignores_case() {
        let a = ExternalPlaylist::new("ABC");
        let b = Playlist::new("abc", "alice/abc", PlaylistContent::default());
        let c = ExternalPlaylist::new("abd");
        assert!(same_playlist(&a, &b));
        assert!(!same_playlist(&a, &c));
    }
}
