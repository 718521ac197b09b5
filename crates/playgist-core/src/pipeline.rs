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

//! Write-through commit pipeline
//!
//! Each change notification becomes one run:
//!
//! ```text
//! Received -> Serialize -> Write -> Stage -> Commit -> [Push] -> Success
//!                 |          |        |        |
//!                 +----------+--------+--------+----> Failed (record dirty)
//! ```
//!
//! Push failures are logged and never fail the run. There is no retry
//! beyond the commit's ref race; the next mutation rewrites the whole file.

use crate::codec;
use crate::error::PipelineError;
use crate::playlist::{Playlist, PlaylistContent, PlaylistListener};
use crate::store::StoreOptions;
use playgist_versioning::{LoggingProgress, Oid, PushResult, Repository};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

/// A queued change: the record's state at notification time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Playlist id
    pub id: String,
    /// Tracks and metadata to persist
    pub snapshot: PlaylistContent,
}

impl ChangeEvent {
    /// Snapshot `playlist`
    pub fn of(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id().to_string(),
            snapshot: playlist.content().clone(),
        }
    }

    /// Commit message for an update of this playlist
    pub fn update_message(&self) -> String {
        format!(
            "updated playlist: {}",
            self.snapshot.name().unwrap_or(&self.id)
        )
    }
}

/// Listener that queues a [`ChangeEvent`] per notification
pub(crate) struct ChangeQueue {
    sender: UnboundedSender<ChangeEvent>,
}

impl ChangeQueue {
    pub(crate) fn channel() -> (Arc<Self>, UnboundedReceiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl PlaylistListener for ChangeQueue {
    fn playlist_changed(&self, playlist: &Playlist) {
        if self.sender.send(ChangeEvent::of(playlist)).is_err() {
            debug!(playlist_id = %playlist.id(), "Store dropped, change not persisted");
        }
    }
}

/// Pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Encoding the record
    Serialize,
    /// Writing the record file
    Write,
    /// Staging the file
    Stage,
    /// Committing the change
    Commit,
    /// Pushing to the remote
    Push,
}

impl PipelineError {
    /// Step that produced this error
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Serialize(_) => PipelineStage::Serialize,
            PipelineError::Write { .. } => PipelineStage::Write,
            PipelineError::Stage { .. } => PipelineStage::Stage,
            PipelineError::Commit { .. } => PipelineStage::Commit,
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Playlist the run persisted
    pub playlist_id: String,
    /// Commit message used
    pub message: String,
    /// New commit, or the failed step
    pub outcome: Result<Oid, PipelineError>,
    /// Push result when a push was attempted
    pub push: Option<PushResult>,
}

impl PipelineReport {
    /// Whether the record was committed
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Commit created by the run
    pub fn commit(&self) -> Option<Oid> {
        self.outcome.as_ref().ok().copied()
    }

    /// Failure of the run, if any
    pub fn error(&self) -> Option<&PipelineError> {
        self.outcome.as_ref().err()
    }

    /// Last step reached: the failed one, `Push` when a push ran, else `Commit`
    pub fn last_stage(&self) -> PipelineStage {
        match (&self.outcome, &self.push) {
            (Err(e), _) => e.stage(),
            (Ok(_), Some(_)) => PipelineStage::Push,
            (Ok(_), None) => PipelineStage::Commit,
        }
    }
}

/// Persists snapshots through one repository
pub(crate) struct Pipeline<'a> {
    repository: &'a Repository,
    options: &'a StoreOptions,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(repository: &'a Repository, options: &'a StoreOptions) -> Self {
        Self {
            repository,
            options,
        }
    }

    /// Run all steps for `event`, whose file lives at `path`
    pub(crate) async fn run(&self, event: &ChangeEvent, path: &str, message: &str) -> PipelineReport {
        let outcome = self.persist(event, path, message).await;

        let push = match &outcome {
            Ok(oid) => {
                info!(playlist_id = %event.id, oid = %oid, path = %path, "Persisted playlist");
                self.push().await
            }
            Err(e) => {
                error!(
                    playlist_id = %event.id,
                    message = %message,
                    stage = ?e.stage(),
                    error = %e,
                    "Failed to persist playlist"
                );
                None
            }
        };

        PipelineReport {
            playlist_id: event.id.clone(),
            message: message.to_string(),
            outcome,
            push,
        }
    }

    async fn persist(&self, event: &ChangeEvent, path: &str, message: &str) -> Result<Oid, PipelineError> {
        let text = codec::write(&event.snapshot)?;

        let abs = self.repository.workdir().join(path);
        write_file(&abs, text.as_bytes())
            .await
            .map_err(|e| PipelineError::Write {
                path: abs.clone(),
                reason: e.to_string(),
            })?;
        debug!(path = %path, bytes = text.len(), "Wrote playlist file");

        self.repository
            .stage(&[path])
            .await
            .map_err(|e| PipelineError::Stage {
                path: path.to_string(),
                reason: format!("{:#}", e),
            })?;

        self.repository
            .commit_with_retry(message, &[path], self.options.commit_retries)
            .await
            .map_err(|e| PipelineError::Commit {
                message: message.to_string(),
                reason: format!("{:#}", e),
            })
    }

    async fn push(&self) -> Option<PushResult> {
        if !self.options.push_on_commit {
            return None;
        }
        let target = self.options.push_target.as_ref()?;

        let mut progress = LoggingProgress::new();
        let result = self
            .repository
            .push(&target.remote, &target.refspec, &mut progress)
            .await;
        debug!(
            remote = %target.remote,
            updates = result.updates.len(),
            objects = result.objects_sent,
            "Push finished"
        );
        Some(result)
    }
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::playlist::TrackRef;

    fn event(name: Option<&str>) -> ChangeEvent {
        let mut snapshot = PlaylistContent::default();
        if let Some(name) = name {
            snapshot.metadata.insert("name".to_string(), name.to_string());
        }
        snapshot.tracks.push(TrackRef::from("trackA"));
        ChangeEvent {
            id: "abc".to_string(),
            snapshot,
        }
    }

    #[test]
    fn test_update_message() {
        assert_eq!(event(Some("Road Trip")).update_message(), "updated playlist: Road Trip");
        assert_eq!(event(None).update_message(), "updated playlist: abc");
    }

    #[test]
    fn test_queue_forwards_snapshots() {
        let (queue, mut receiver) = ChangeQueue::channel();
        let mut playlist = Playlist::new("abc", "alice/abc", PlaylistContent::default());
        playlist.set_listener(queue);
        playlist.add_track("a").add_track("b");

        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        assert_eq!(first.snapshot.tracks.len(), 1);
        assert_eq!(second.snapshot.tracks.len(), 2);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_report_stages() {
        let failed = PipelineReport {
            playlist_id: "abc".to_string(),
            message: "m".to_string(),
            outcome: Err(PipelineError::Stage {
                path: "alice/abc".to_string(),
                reason: "boom".to_string(),
            }),
            push: None,
        };
        assert!(!failed.is_success());
        assert_eq!(failed.last_stage(), PipelineStage::Stage);
        assert!(failed.commit().is_none());
    }
}
