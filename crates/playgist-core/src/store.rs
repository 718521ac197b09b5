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

//! Playlist store
//!
//! A [`PlaylistStore`] owns every playlist of one owner inside a
//! repository. Records live at `<owner>/<id>` in the working tree and are
//! discovered from the head commit when the store opens. [`PlaylistStore::modify`]
//! is the only way to change a record; every change it observes is written,
//! staged and committed before it returns.

use crate::client::ClientPlaylist;
use crate::codec;
use crate::error::StoreError;
use crate::identifier;
use crate::pipeline::{ChangeEvent, ChangeQueue, Pipeline, PipelineReport};
use crate::playlist::{Playlist, PlaylistListener, TrackRef};
use playgist_config::Config;
use playgist_versioning::{Identity, Repository, DEFAULT_BRANCH};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Remote and refspec a store pushes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    /// Configured remote name
    pub remote: String,
    /// Refspec pushed after each commit
    pub refspec: String,
}

impl PushTarget {
    /// Push `refspec` to `remote`
    pub fn new(remote: impl Into<String>, refspec: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            refspec: refspec.into(),
        }
    }
}

/// Store behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Commit author and committer
    pub identity: Identity,
    /// Where to push; `None` disables pushing
    pub push_target: Option<PushTarget>,
    /// Push after each successful commit
    pub push_on_commit: bool,
    /// Attempts per commit on a lost ref race
    pub commit_retries: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            identity: Identity::default(),
            push_target: None,
            push_on_commit: false,
            commit_retries: 3,
        }
    }
}

impl StoreOptions {
    /// Options described by `config`
    pub fn from_config(config: &Config) -> Self {
        let push_target = config
            .push_target()
            .map(|(name, remote)| PushTarget::new(name, remote.refspec.clone()));
        Self {
            identity: Identity::new(config.identity.name.clone(), config.identity.email.clone()),
            push_target,
            push_on_commit: config.store.push_on_commit,
            commit_retries: config.store.commit_retries,
        }
    }

    /// Push every commit to `remote`
    pub fn with_push(mut self, remote: impl Into<String>) -> Self {
        self.push_target = Some(PushTarget::new(remote, DEFAULT_BRANCH));
        self.push_on_commit = true;
        self
    }
}

/// All playlists of one owner
pub struct PlaylistStore {
    owner: String,
    repository: Repository,
    options: StoreOptions,
    records: HashMap<String, Playlist>,
    queue: Arc<ChangeQueue>,
    events: UnboundedReceiver<ChangeEvent>,
    last_report: Option<PipelineReport>,
}

impl PlaylistStore {
    /// Open the store for `owner` with default options
    pub async fn open(owner: impl Into<String>, repository: Repository) -> Result<Self, StoreError> {
        Self::open_with(owner, repository, StoreOptions::default()).await
    }

    /// Open the store for `owner`, discovering its playlists at head
    ///
    /// Files that fail to parse are skipped with a warning.
    pub async fn open_with(
        owner: impl Into<String>,
        mut repository: Repository,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let owner = owner.into();
        if owner.is_empty() || owner.contains(['/', '\\']) || owner.starts_with('.') {
            return Err(StoreError::InvalidOwner(owner));
        }
        repository.set_identity(options.identity.clone());

        let (queue, events) = ChangeQueue::channel();
        let mut store = Self {
            owner,
            repository,
            options,
            records: HashMap::new(),
            queue,
            events,
            last_report: None,
        };
        store.discover().await?;
        Ok(store)
    }

    /// Open the repository and store described by `config`
    ///
    /// The repository is initialized if needed and every configured remote
    /// is registered on it.
    pub async fn open_from_config(config: &Config) -> Result<Self, StoreError> {
        let mut repository = Repository::open_or_init(&config.store.repository).await?;
        for (name, remote) in &config.remotes {
            repository.add_remote(name.clone(), remote.url.clone());
        }
        Self::open_with(
            config.store.owner.clone(),
            repository,
            StoreOptions::from_config(config),
        )
        .await
    }

    async fn discover(&mut self) -> Result<(), StoreError> {
        let tree = self.repository.head_tree().await?;
        let prefix = format!("{}/", self.owner);

        for (path, oid) in self.repository.walk_tree(&tree).await? {
            let Some(name) = path.strip_prefix(&prefix) else {
                continue;
            };
            if !identifier::is_valid(name) {
                continue;
            }

            let content = match self.repository.read_blob(&oid).await {
                Ok(data) => codec::parse(&data).map_err(anyhow::Error::from),
                Err(e) => Err(e),
            };
            match content {
                Ok(content) => {
                    let mut playlist = Playlist::new(name, &path, content);
                    playlist.set_author(self.owner.clone());
                    playlist.set_listener(self.listener());
                    debug!(playlist_id = %name, tracks = playlist.tracks().len(), "Loaded playlist");
                    self.records.insert(name.to_string(), playlist);
                }
                Err(e) => {
                    warn!(path = %path, error = %format!("{:#}", e), "Skipping unreadable playlist file");
                }
            }
        }

        info!(owner = %self.owner, count = self.records.len(), "Discovered playlists");
        Ok(())
    }

    fn listener(&self) -> Arc<dyn PlaylistListener> {
        Arc::clone(&self.queue) as Arc<dyn PlaylistListener>
    }

    fn path_of(&self, id: &str) -> String {
        format!("{}/{}", self.owner, id)
    }

    /// Create a playlist named `name` and commit it
    ///
    /// Fails only when the file cannot be created. A failed commit leaves
    /// the new record dirty.
    pub async fn create(&mut self, name: &str) -> Result<String, StoreError> {
        let id = identifier::generate(&self.owner, self.records.len());
        let path = self.path_of(&id);
        let abs = self.repository.workdir().join(&path);

        if self.records.contains_key(&id) || abs.exists() {
            warn!(playlist_id = %id, "Generated playlist id already exists, overwriting");
        }

        let create_err = |source: std::io::Error| StoreError::Create {
            path: abs.clone(),
            source,
        };
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(create_err)?;
        }
        tokio::fs::write(&abs, b"").await.map_err(create_err)?;
        let data = tokio::fs::read(&abs).await.map_err(create_err)?;

        let mut playlist = Playlist::new(id.clone(), &path, codec::parse(&data)?);
        playlist.set_author(self.owner.clone());
        playlist.set_name(name);

        let message = format!("added playlist: {}", name);
        let report = Pipeline::new(&self.repository, &self.options)
            .run(&ChangeEvent::of(&playlist), &path, &message)
            .await;
        playlist.set_dirty(!report.is_success());
        playlist.set_listener(self.listener());

        self.records.insert(id.clone(), playlist);
        self.last_report = Some(report);
        Ok(id)
    }

    /// Change the playlist `id` and persist every change it emits
    ///
    /// Returns `None` for an unknown id. Persistence failures do not undo
    /// the change; they mark the record dirty.
    pub async fn modify<F, R>(&mut self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Playlist) -> R,
    {
        let result = f(self.records.get_mut(id)?);
        self.flush().await;
        Some(result)
    }

    async fn flush(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let path = self.path_of(&event.id);
            let report = Pipeline::new(&self.repository, &self.options)
                .run(&event, &path, &event.update_message())
                .await;
            if let Some(playlist) = self.records.get_mut(&event.id) {
                playlist.set_dirty(!report.is_success());
            }
            self.last_report = Some(report);
        }
    }

    /// Rename playlist `id`
    pub async fn set_name(&mut self, id: &str, name: &str) -> Option<()> {
        self.modify(id, |p| {
            p.set_name(name);
        })
        .await
    }

    /// Set the collaborative flag of playlist `id`
    pub async fn set_collaborative(&mut self, id: &str, collaborative: bool) -> Option<()> {
        self.modify(id, |p| {
            p.set_collaborative(collaborative);
        })
        .await
    }

    /// Append a track to playlist `id`
    pub async fn add_track(&mut self, id: &str, track: impl Into<TrackRef>) -> Option<()> {
        let track = track.into();
        self.modify(id, |p| {
            p.add_track(track);
        })
        .await
    }

    /// Insert a track into playlist `id` at `index`, clamped to its length
    pub async fn insert_track(&mut self, id: &str, index: usize, track: impl Into<TrackRef>) -> Option<()> {
        let track = track.into();
        self.modify(id, |p| {
            p.insert_track(index, track);
        })
        .await
    }

    /// Append tracks to playlist `id` in one commit
    pub async fn add_tracks(&mut self, id: &str, tracks: Vec<TrackRef>) -> Option<()> {
        self.modify(id, |p| {
            p.add_tracks(tracks);
        })
        .await
    }

    /// Remove the first occurrence of `track` from playlist `id`
    pub async fn remove_track(&mut self, id: &str, track: &TrackRef) -> Option<()> {
        self.modify(id, |p| {
            p.remove_track(track);
        })
        .await
    }

    /// Remove each of `tracks` from playlist `id` in one commit
    pub async fn remove_tracks(&mut self, id: &str, tracks: &[TrackRef]) -> Option<()> {
        self.modify(id, |p| {
            p.remove_tracks(tracks);
        })
        .await
    }

    /// Replace the tracks of playlist `id` in one commit
    pub async fn set_tracks(&mut self, id: &str, tracks: Vec<TrackRef>) -> Option<()> {
        self.modify(id, |p| {
            p.set_tracks(tracks);
        })
        .await
    }

    /// Stop tracking `id`; its file stays in the repository
    pub fn remove(&mut self, id: &str) -> Option<Playlist> {
        let mut playlist = self.records.remove(id)?;
        playlist.clear_listener();
        debug!(playlist_id = %id, "Stopped tracking playlist");
        Some(playlist)
    }

    /// Playlist `id`, if the store holds it
    pub fn get(&self, id: &str) -> Option<&Playlist> {
        self.records.get(id)
    }

    /// Whether the store holds playlist `id`
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Playlist> {
        self.records.values()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.records.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of playlists held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no playlists
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owner whose directory this store manages
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Options the store was opened with
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Outcome of the most recent pipeline run
    pub fn last_report(&self) -> Option<&PipelineReport> {
        self.last_report.as_ref()
    }

    /// Own records (by id) followed by `external`, untouched
    pub fn merged_with<'a, E>(&'a self, external: &'a [E]) -> Vec<&'a dyn ClientPlaylist>
    where
        E: ClientPlaylist,
    {
        let mut own: Vec<&Playlist> = self.records.values().collect();
        own.sort_by(|a, b| a.id().cmp(b.id()));

        own.into_iter()
            .map(|p| p as &dyn ClientPlaylist)
            .chain(external.iter().map(|e| e as &dyn ClientPlaylist))
            .collect()
    }
}

impl std::fmt::Debug for PlaylistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistStore")
            .field("owner", &self.owner)
            .field("records", &self.records.len())
            .field("repository", &self.repository)
            .finish()
    }
}
