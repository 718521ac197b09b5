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

//! Object identifiers
//!
//! An OID is the SHA-256 digest of an object's uncompressed content, so
//! identical content always maps to the same object.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// SHA-256 object identifier
///
/// # Examples
///
/// ```
/// use playgist_versioning::Oid;
///
/// let oid = Oid::hash(b"> name = Road Trip\n");
/// assert_eq!(oid.to_hex().len(), 64);
/// assert_eq!(Oid::from_hex(&oid.to_hex()).unwrap(), oid);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid([u8; 32]);

impl Oid {
    /// Hash `data` into an OID
    pub fn hash(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Oid(bytes)
    }

    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Oid(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 64-character hex form
    pub fn from_hex(s: &str) -> anyhow::Result<Self> {
        if s.len() != 64 {
            anyhow::bail!("OID hex string must be 64 characters, got {}", s.len());
        }

        let bytes = hex::decode(s)?;
        let mut oid_bytes = [0u8; 32];
        oid_bytes.copy_from_slice(&bytes);
        Ok(Oid(oid_bytes))
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl FromStr for Oid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Oid::from_hex(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(Oid::hash(b"trackA\n"), Oid::hash(b"trackA\n"));
        assert_ne!(Oid::hash(b"trackA\n"), Oid::hash(b"trackB\n"));
    }

    #[test]
    fn test_known_digest() {
        // SHA-256 of the empty string
        assert_eq!(
            Oid::hash(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_roundtrip_and_parse() {
        let oid = Oid::hash(b"content");
        let parsed: Oid = oid.to_hex().parse().unwrap();
        assert_eq!(parsed, oid);
        assert_eq!(parsed.as_bytes(), oid.as_bytes());
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Oid::from_hex("abc").is_err());
        assert!(Oid::from_hex(&"z".repeat(64)).is_err());
    }

    #[test]
    fn test_short_and_debug() {
        let oid = Oid::from_bytes([0xab; 32]);
        assert_eq!(oid.short(), "abababab");
        assert_eq!(format!("{:?}", oid), "Oid(abababab)");
    }
}
