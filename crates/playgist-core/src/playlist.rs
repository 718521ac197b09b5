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

//! The playlist record
//!
//! A [`Playlist`] is plain in-memory state plus an optional
//! [`PlaylistListener`]. Every mutator that changes something notifies the
//! listener exactly once; mutators that change nothing stay silent, except
//! `add_tracks`, which notifies once for any list. The
//! record itself never touches the filesystem.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Metadata key holding the display name
pub const NAME_KEY: &str = "name";

/// Metadata key holding the collaborative flag
pub const COLLABORATIVE_KEY: &str = "collaborative";

/// Opaque reference to a track held by an external catalogue
///
/// Ordering compares the track ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackRef(String);

impl TrackRef {
    /// Wrap a track id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The track id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap the track id
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TrackRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The persisted part of a playlist: tracks and metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistContent {
    /// Tracks in playlist order
    pub tracks: Vec<TrackRef>,
    /// Free-form key/value pairs, including `name` and `collaborative`
    pub metadata: BTreeMap<String, String>,
}

impl PlaylistContent {
    /// Display name, if set
    pub fn name(&self) -> Option<&str> {
        self.metadata.get(NAME_KEY).map(String::as_str)
    }

    /// Collaborative flag (`"true"` in any case)
    pub fn is_collaborative(&self) -> bool {
        self.metadata
            .get(COLLABORATIVE_KEY)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

/// Receives change notifications from a [`Playlist`]
pub trait PlaylistListener: Send + Sync {
    /// Called once after each mutation that changed `playlist`
    fn playlist_changed(&self, playlist: &Playlist);
}

/// A versioned playlist
pub struct Playlist {
    id: String,
    path: PathBuf,
    author: Option<String>,
    content: PlaylistContent,
    dirty: bool,
    listener: Option<Arc<dyn PlaylistListener>>,
}

impl Playlist {
    /// Create a record from parsed content
    ///
    /// `path` is the repository-relative location of the backing file.
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, content: PlaylistContent) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            author: None,
            content,
            dirty: false,
            listener: None,
        }
    }

    /// Record id, fixed for the record's life
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Repository-relative path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name, if set
    pub fn name(&self) -> Option<&str> {
        self.content.name()
    }

    /// Author, if set
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Whether others may edit the playlist
    pub fn is_collaborative(&self) -> bool {
        self.content.is_collaborative()
    }

    /// Tracks in playlist order
    pub fn tracks(&self) -> &[TrackRef] {
        &self.content.tracks
    }

    /// All metadata entries
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.content.metadata
    }

    /// Metadata value for `key`
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.content.metadata.get(key).map(String::as_str)
    }

    /// Tracks and metadata as they would be written
    pub fn content(&self) -> &PlaylistContent {
        &self.content
    }

    /// True when the last durable write of this record failed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Register the listener, replacing any previous one
    pub fn set_listener(&mut self, listener: Arc<dyn PlaylistListener>) {
        self.listener = Some(listener);
    }

    /// Detach the listener; later mutations go unnoticed
    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Rename the playlist
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.set_metadata(NAME_KEY, name)
    }

    /// Set the collaborative flag
    pub fn set_collaborative(&mut self, collaborative: bool) -> &mut Self {
        if self.is_collaborative() == collaborative {
            return self;
        }
        self.set_metadata(COLLABORATIVE_KEY, collaborative.to_string())
    }

    /// Owner label; not written to the file
    pub fn set_author(&mut self, author: impl Into<String>) -> &mut Self {
        let author = author.into();
        if self.author.as_deref() == Some(author.as_str()) {
            return self;
        }
        self.author = Some(author);
        self.notify()
    }

    /// Set one metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if self.content.metadata.get(&key) == Some(&value) {
            return self;
        }
        self.content.metadata.insert(key, value);
        self.notify()
    }

    /// Append one track
    pub fn add_track(&mut self, track: impl Into<TrackRef>) -> &mut Self {
        self.content.tracks.push(track.into());
        self.notify()
    }

    /// Insert at `index`; an index past the end appends
    pub fn insert_track(&mut self, index: usize, track: impl Into<TrackRef>) -> &mut Self {
        let index = index.min(self.content.tracks.len());
        self.content.tracks.insert(index, track.into());
        self.notify()
    }

    /// Append `tracks` with a single notification, even when empty
    pub fn add_tracks<I, T>(&mut self, tracks: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TrackRef>,
    {
        self.content.tracks.extend(tracks.into_iter().map(Into::into));
        self.notify()
    }

    /// Remove the first occurrence of `track`
    pub fn remove_track(&mut self, track: &TrackRef) -> &mut Self {
        if self.take_first(track) {
            self.notify()
        } else {
            self
        }
    }

    /// Remove, for each listed track, its first remaining occurrence
    pub fn remove_tracks<'a, I>(&mut self, tracks: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a TrackRef>,
    {
        let mut removed = false;
        for track in tracks {
            removed |= self.take_first(track);
        }
        if removed {
            self.notify()
        } else {
            self
        }
    }

    /// Replace all tracks
    pub fn set_tracks<I, T>(&mut self, tracks: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TrackRef>,
    {
        let tracks: Vec<TrackRef> = tracks.into_iter().map(Into::into).collect();
        if tracks == self.content.tracks {
            return self;
        }
        self.content.tracks = tracks;
        self.notify()
    }

    fn take_first(&mut self, track: &TrackRef) -> bool {
        match self.content.tracks.iter().position(|t| t == track) {
            Some(pos) => {
                self.content.tracks.remove(pos);
                true
            }
            None => false,
        }
    }

    fn notify(&mut self) -> &mut Self {
        if let Some(listener) = &self.listener {
            listener.playlist_changed(self);
        }
        self
    }
}

impl fmt::Debug for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playlist")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("tracks", &self.content.tracks.len())
            .field("dirty", &self.dirty)
            .field("listening", &self.listener.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        snapshots: Mutex<Vec<Vec<TrackRef>>>,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.snapshots.lock().unwrap().len()
        }
    }

    impl PlaylistListener for Recorder {
        fn playlist_changed(&self, playlist: &Playlist) {
            self.snapshots.lock().unwrap().push(playlist.tracks().to_vec());
        }
    }

    fn listening(tracks: &[&str]) -> (Playlist, Arc<Recorder>) {
        let content = PlaylistContent {
            tracks: tracks.iter().map(|t| TrackRef::from(*t)).collect(),
            metadata: BTreeMap::new(),
        };
        let mut playlist = Playlist::new("id", "alice/id", content);
        let recorder = Arc::new(Recorder::default());
        playlist.set_listener(Arc::clone(&recorder) as Arc<dyn PlaylistListener>);
        (playlist, recorder)
    }

    fn ids(playlist: &Playlist) -> Vec<&str> {
        playlist.tracks().iter().map(TrackRef::as_str).collect()
    }

    #[test]
    fn test_set_name_twice_notifies_once() {
        let (mut playlist, recorder) = listening(&[]);
        playlist.set_name("Road Trip").set_name("Road Trip");
        assert_eq!(recorder.count(), 1);
        assert_eq!(playlist.name(), Some("Road Trip"));
        assert_eq!(playlist.metadata_value(NAME_KEY), Some("Road Trip"));
    }

    #[test]
    fn test_bulk_operations_notify_once() {
        let (mut playlist, recorder) = listening(&[]);
        playlist.add_tracks(["a", "b", "c"]);
        assert_eq!(recorder.count(), 1);

        playlist.set_tracks(["x", "y"]);
        assert_eq!(recorder.count(), 2);

        playlist.remove_tracks(&[TrackRef::from("x"), TrackRef::from("y")]);
        assert_eq!(recorder.count(), 3);
        assert!(playlist.tracks().is_empty());
    }

    #[test]
    fn test_noops_are_silent() {
        let (mut playlist, recorder) = listening(&["a", "b"]);
        playlist
            .remove_track(&TrackRef::from("zzz"))
            .remove_tracks(&[TrackRef::from("zzz")])
            .set_tracks(["a", "b"])
            .set_collaborative(false);
        assert_eq!(recorder.count(), 0);

        playlist.set_metadata("mood", "calm").set_metadata("mood", "calm");
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_add_tracks_notifies_once_even_when_empty() {
        let (mut playlist, recorder) = listening(&["a"]);
        playlist.add_tracks(Vec::<TrackRef>::new());
        assert_eq!(recorder.count(), 1);
        assert_eq!(ids(&playlist), ["a"]);

        playlist.add_tracks(["b", "c"]);
        assert_eq!(recorder.count(), 2);
        assert_eq!(ids(&playlist), ["a", "b", "c"]);
    }

    #[test]
    fn test_insert_track_positions() {
        let (mut playlist, _) = listening(&["a", "b", "c"]);
        playlist.insert_track(2, "t");
        assert_eq!(ids(&playlist), ["a", "b", "t", "c"]);

        playlist.insert_track(99, "z");
        assert_eq!(ids(&playlist), ["a", "b", "t", "c", "z"]);
    }

    #[test]
    fn test_remove_first_occurrence_only() {
        let (mut playlist, recorder) = listening(&["a", "b", "a", "c"]);
        playlist.remove_track(&TrackRef::from("a"));
        assert_eq!(ids(&playlist), ["b", "a", "c"]);

        playlist.remove_tracks(&[TrackRef::from("a"), TrackRef::from("a"), TrackRef::from("c")]);
        assert_eq!(ids(&playlist), ["b"]);
        assert_eq!(recorder.count(), 2);
    }

    #[test]
    fn test_listener_sees_state_after_mutation() {
        let (mut playlist, recorder) = listening(&["a"]);
        playlist.add_track("b");
        let seen = recorder.snapshots.lock().unwrap().clone();
        assert_eq!(seen, vec![vec![TrackRef::from("a"), TrackRef::from("b")]]);
    }

    #[test]
    fn test_collaborative_flag() {
        let (mut playlist, recorder) = listening(&[]);
        assert!(!playlist.is_collaborative());
        playlist.set_collaborative(true).set_collaborative(true);
        assert!(playlist.is_collaborative());
        assert_eq!(playlist.metadata_value(COLLABORATIVE_KEY), Some("true"));
        assert_eq!(recorder.count(), 1);

        playlist.set_metadata(COLLABORATIVE_KEY, "TRUE");
        assert!(playlist.is_collaborative());
    }

    #[test]
    fn test_without_listener() {
        let mut playlist = Playlist::new("id", "alice/id", PlaylistContent::default());
        playlist.set_name("Quiet").add_track("a");
        playlist.clear_listener();
        assert_eq!(playlist.tracks().len(), 1);
        assert!(!playlist.is_dirty());
    }

    #[test]
    fn test_track_ordering() {
        let mut tracks = vec![TrackRef::from("c"), TrackRef::from("a"), TrackRef::from("b")];
        tracks.sort();
        assert_eq!(tracks, [TrackRef::from("a"), TrackRef::from("b"), TrackRef::from("c")]);
    }
}
