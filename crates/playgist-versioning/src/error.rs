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

//! Typed errors for conditions callers need to match on
//!
//! Everything else in this crate is reported through `anyhow::Error` with
//! context attached. These variants travel inside an `anyhow::Error` and can
//! be recovered with [`VersioningError::find`].

use std::path::PathBuf;
use thiserror::Error;

/// Version-control failures with a meaning beyond "I/O went wrong"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersioningError {
    /// The ref moved between reading it and swapping it
    #[error("reference {name} moved: expected {expected}, found {actual}")]
    RefConflict {
        /// Full ref name
        name: String,
        /// Value the caller read ("none" when the ref did not exist)
        expected: String,
        /// Value found at swap time
        actual: String,
    },

    /// Another writer holds the ref lock file
    #[error("reference {0} is locked by another writer")]
    RefLocked(String),

    /// Another writer held the staging index lock for too long
    #[error("staging index is locked by another writer: {}", .0.display())]
    IndexLocked(PathBuf),

    /// No staged entry for the requested paths
    #[error("nothing to commit")]
    NothingToCommit,

    /// Path resolves outside the working tree or into the metadata directory
    #[error("path is outside the repository: {0}")]
    PathOutsideRepository(PathBuf),

    /// Directory has no `.playgist` metadata
    #[error("not a playgist repository: {0}")]
    NotARepository(PathBuf),
}

impl VersioningError {
    /// Find a typed error anywhere in an `anyhow` error chain
    pub fn find(err: &anyhow::Error) -> Option<&VersioningError> {
        err.chain().find_map(|cause| cause.downcast_ref::<VersioningError>())
    }

    /// Whether `err` is a lost compare-and-swap race
    pub fn is_ref_conflict(err: &anyhow::Error) -> bool {
        matches!(Self::find(err), Some(VersioningError::RefConflict { .. }))
    }

    /// Whether `err` means another writer got to the branch first
    ///
    /// Covers a moved ref and a ref lock that stayed held.
    pub fn is_lost_race(err: &anyhow::Error) -> bool {
        matches!(
            Self::find(err),
            Some(VersioningError::RefConflict { .. } | VersioningError::RefLocked(_))
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_find_through_context() {
        let err: anyhow::Result<()> = Err(VersioningError::NothingToCommit.into());
        let err = err.context("committing playlist").unwrap_err();

        assert_eq!(
            VersioningError::find(&err),
            Some(&VersioningError::NothingToCommit)
        );
        assert!(!VersioningError::is_ref_conflict(&err));
    }

    #[test]
    fn test_ref_conflict_detection() {
        let err: anyhow::Error = VersioningError::RefConflict {
            name: "refs/heads/main".to_string(),
            expected: "none".to_string(),
            actual: "abc".to_string(),
        }
        .into();

        assert!(VersioningError::is_ref_conflict(&err));
        assert!(VersioningError::is_lost_race(&err));
        assert!(err.to_string().contains("refs/heads/main"));
    }

    #[test]
    fn test_locked_ref_is_a_lost_race() {
        let err = anyhow::Error::from(VersioningError::RefLocked("refs/heads/main".to_string()))
            .context("advancing branch");
        assert!(VersioningError::is_lost_race(&err));
        assert!(!VersioningError::is_ref_conflict(&err));

        let err: anyhow::Error = VersioningError::NothingToCommit.into();
        assert!(!VersioningError::is_lost_race(&err));
    }

    #[test]
    fn test_unrelated_error() {
        let err = anyhow::anyhow!("disk on fire");
        assert!(VersioningError::find(&err).is_none());
    }
}
