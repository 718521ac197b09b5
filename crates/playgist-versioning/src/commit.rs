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

//! Commit objects and signatures

use crate::{ObjectDatabase, ObjectType, Oid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author or committer of a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// When the commit was made
    pub timestamp: DateTime<Utc>,
}

impl Signature {
    /// Signature with an explicit timestamp
    pub fn new(name: String, email: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            name,
            email,
            timestamp,
        }
    }

    /// Signature stamped with the current time
    pub fn now(name: String, email: String) -> Self {
        Self::new(name, email, Utc::now())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {}",
            self.name,
            self.email,
            self.timestamp.timestamp()
        )
    }
}

/// Snapshot of the working tree plus history links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Root tree
    pub tree: Oid,
    /// Parent commits (at most one for commits made by [`crate::Repository`])
    pub parents: Vec<Oid>,
    /// Author
    pub author: Signature,
    /// Committer
    pub committer: Signature,
    /// Message
    pub message: String,
}

impl Commit {
    /// Create a commit
    pub fn new(
        tree: Oid,
        parents: Vec<Oid>,
        author: Signature,
        committer: Signature,
        message: String,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            message,
        }
    }

    /// Whether the commit starts history
    pub fn is_initial(&self) -> bool {
        self.parents.is_empty()
    }

    /// First parent, if any
    pub fn first_parent(&self) -> Option<&Oid> {
        self.parents.first()
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Encode with bincode
    pub fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| anyhow::anyhow!("Commit serialization failed: {}", e))
    }

    /// Decode from bincode
    pub fn deserialize(data: &[u8]) -> anyhow::Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| anyhow::anyhow!("Commit deserialization failed: {}", e))
    }

    /// Store the commit and return its OID
    pub async fn write(&self, odb: &ObjectDatabase) -> anyhow::Result<Oid> {
        let data = self.serialize()?;
        odb.write(ObjectType::Commit, &data).await
    }

    /// Load a commit by OID
    pub async fn read(odb: &ObjectDatabase, oid: &Oid) -> anyhow::Result<Self> {
        let data = odb.read(oid).await?;
        Self::deserialize(&data)
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree {}", self.tree)?;
        for parent in &self.parents {
            writeln!(f, "parent {}", parent)?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f)?;
        write!(f, "{}", self.message)
    }
}
