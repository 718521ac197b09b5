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

//! Playlist identifiers
//!
//! An identifier is the SHA-1 of `"<owner>-<count>"`, where `count` is the
//! number of records the store held when the playlist was created. Removing
//! a record and creating another can therefore reproduce an existing id.

use sha1::{Digest, Sha1};

/// Length of an identifier in hex characters
pub const ID_LEN: usize = 40;

/// Identifier for the next playlist of `owner`
pub fn generate(owner: &str, count: usize) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{}-{}", owner, count).as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `name` looks like an identifier (40 lowercase hex characters)
pub fn is_valid(name: &str) -> bool {
    name.len() == ID_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
