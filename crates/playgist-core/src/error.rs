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

//! Error types for records, the pipeline and the store

use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or render a playlist file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The file is not UTF-8
    #[error("playlist file is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A metadata line has no key
    #[error("line {line}: metadata entry has an empty key")]
    EmptyKey {
        /// 1-based line number
        line: usize,
    },

    /// A `\uXXXX` escape is malformed
    #[error("line {line}: malformed escape sequence '\\u{sequence}'")]
    InvalidEscape {
        /// 1-based line number
        line: usize,
        /// Text following `\u`
        sequence: String,
    },

    /// A track id cannot be written as a single track line
    #[error("track {0:?} cannot be stored as a track line")]
    UnrepresentableTrack(String),
}

/// Step of the write-through pipeline that failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Rendering the record failed
    #[error("serialize failed: {0}")]
    Serialize(#[from] CodecError),

    /// Writing the file failed
    #[error("write to {} failed: {reason}", path.display())]
    Write {
        /// Absolute file path
        path: PathBuf,
        /// I/O error text
        reason: String,
    },

    /// Staging failed
    #[error("stage of {path} failed: {reason}")]
    Stage {
        /// Repository-relative path
        path: String,
        /// Error chain
        reason: String,
    },

    /// Building the tree or commit, or advancing the branch, failed
    #[error("commit '{message}' failed: {reason}")]
    Commit {
        /// Commit message
        message: String,
        /// Error chain
        reason: String,
    },
}

/// Errors returned by [`crate::PlaylistStore`] construction and creation
#[derive(Error, Debug)]
pub enum StoreError {
    /// Owner is not usable as a directory name
    #[error("invalid owner '{0}': must be a single directory name not starting with '.'")]
    InvalidOwner(String),

    /// The playlist file could not be created
    #[error("cannot create playlist file {}: {source}", path.display())]
    Create {
        /// Absolute file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The freshly created file did not parse
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Repository access failed
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}
