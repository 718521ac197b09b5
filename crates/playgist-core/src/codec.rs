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

//! Playlist file format
//!
//! A playlist file is UTF-8 text. Lines starting with `"> "` carry metadata
//! in properties-line syntax (`key = value`, `key: value`, `key value`,
//! with backslash escapes). Every other non-blank line is one track id.
//!
//! ```text
//! > collaborative = false
//! > name = Road Trip
//! spotify:track:6rqhFgbbKwnb9MLmUQDhG6
//! spotify:track:3n3Ppam7vgaVa1iaRUc9Lp
//! ```
//!
//! Writing emits the metadata in key order followed by the tracks, so the
//! same content always produces the same bytes.

use crate::error::CodecError;
use crate::playlist::{PlaylistContent, TrackRef};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Prefix marking a metadata line
pub const METADATA_PREFIX: &str = "> ";

/// Parse a playlist file
///
/// Later metadata lines override earlier ones with the same key.
pub fn parse(data: &[u8]) -> Result<PlaylistContent, CodecError> {
    let text = std::str::from_utf8(data)?;
    let mut tracks = Vec::new();
    let mut metadata = BTreeMap::new();

    for (n, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(property) = line.strip_prefix(METADATA_PREFIX) {
            if let Some((key, value)) = parse_property(property, n + 1)? {
                metadata.insert(key, value);
            }
        } else if !line.trim().is_empty() {
            tracks.push(TrackRef::new(line));
        }
    }

    Ok(PlaylistContent { tracks, metadata })
}

/// Render a playlist file
///
/// Fails when a metadata key is empty or a track id would not read back
/// as the same single track line.
pub fn write(content: &PlaylistContent) -> Result<String, CodecError> {
    let mut out = String::new();

    for (i, (key, value)) in content.metadata.iter().enumerate() {
        if key.is_empty() {
            return Err(CodecError::EmptyKey { line: i + 1 });
        }
        out.push_str(METADATA_PREFIX);
        escape_into(&mut out, key, true);
        out.push_str(" = ");
        escape_into(&mut out, value, false);
        out.push('\n');
    }

    for track in &content.tracks {
        let id = track.as_str();
        if id.trim().is_empty()
            || id.contains('\n')
            || id.ends_with('\r')
            || id.starts_with(METADATA_PREFIX)
        {
            return Err(CodecError::UnrepresentableTrack(id.to_string()));
        }
        out.push_str(id);
        out.push('\n');
    }

    Ok(out)
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

/// One properties line: `None` for blank lines and comments
fn parse_property(line: &str, line_no: usize) -> Result<Option<(String, String)>, CodecError> {
    let line = line.trim_start_matches(is_separator);
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return Ok(None);
    }

    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_separator(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let raw_key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_separator);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_separator);
    }

    let key = unescape(raw_key, line_no)?;
    if key.is_empty() {
        return Err(CodecError::EmptyKey { line: line_no });
    }
    let value = unescape(rest, line_no)?;
    Ok(Some((key, value)))
}

fn unescape(raw: &str, line_no: usize) -> Result<String, CodecError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            // dangling backslash
            None => break,
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let sequence: String = chars.by_ref().take(4).collect();
                let decoded = (sequence.len() == 4 && sequence.chars().all(|c| c.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&sequence, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        return Err(CodecError::InvalidEscape {
                            line: line_no,
                            sequence,
                        })
                    }
                }
            }
            Some(other) => out.push(other),
        }
    }

    Ok(out)
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if is_key && i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_tracks_and_metadata() {
        let content = parse(b"> name = Road Trip\ntrackA\n\ntrackB\r\n> collaborative: TRUE\n").unwrap();
        assert_eq!(content.tracks, [TrackRef::from("trackA"), TrackRef::from("trackB")]);
        assert_eq!(content.name(), Some("Road Trip"));
        assert!(content.is_collaborative());
    }

    #[test]
    fn test_separator_variants() {
        let content = parse(b"> a = 1\n> b: 2\n> c=3\n> d 4\n> e\n").unwrap();
        assert_eq!(
            content.metadata,
            meta(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "")])
        );
    }

    #[test]
    fn test_comments_and_blank_metadata_lines() {
        let content = parse(b"> # comment\n> ! also\n> \ntrack\n").unwrap();
        assert!(content.metadata.is_empty());
        assert_eq!(content.tracks.len(), 1);
    }

    #[test]
    fn test_last_metadata_wins() {
        let content = parse(b"> name = first\n> name = second\n").unwrap();
        assert_eq!(content.name(), Some("second"));
    }

    #[test]
    fn test_escapes() {
        let content = parse(b"> a\\=b = x\\ty\n> k = \\u0041\\\\z\n").unwrap();
        assert_eq!(content.metadata["a=b"], "x\ty");
        assert_eq!(content.metadata["k"], "A\\z");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(&[0xff, 0xfe, b'\n']), Err(CodecError::InvalidUtf8(_))));
        assert!(matches!(parse(b"> = value\n"), Err(CodecError::EmptyKey { line: 1 })));
        assert!(matches!(
            parse(b"ok\n> k = \\u00zz\n"),
            Err(CodecError::InvalidEscape { line: 2, .. })
        ));
    }

    #[test]
    fn test_write_is_ordered() {
        let content = PlaylistContent {
            tracks: vec![TrackRef::from("t1"), TrackRef::from("t1")],
            metadata: meta(&[("name", "Mix"), ("collaborative", "false")]),
        };
        assert_eq!(
            write(&content).unwrap(),
            "> collaborative = false\n> name = Mix\nt1\nt1\n"
        );
        assert_eq!(write(&PlaylistContent::default()).unwrap(), "");
    }

    #[test]
    fn test_unrepresentable_content() {
        let bad_track = PlaylistContent {
            tracks: vec![TrackRef::from("> looks like metadata")],
            ..Default::default()
        };
        assert!(matches!(write(&bad_track), Err(CodecError::UnrepresentableTrack(_))));

        let empty_key = PlaylistContent {
            metadata: meta(&[("", "v")]),
            ..Default::default()
        };
        assert!(write(&empty_key).is_err());
    }

    fn track_id() -> impl Strategy<Value = String> {
        "[A-Za-z0-9:_ -]{0,30}".prop_filter("representable track", |s| {
            !s.trim().is_empty() && !s.starts_with(METADATA_PREFIX)
        })
    }

    proptest! {
        #[test]
        fn test_round_trip(
            tracks in prop::collection::vec(track_id(), 0..16),
            metadata in prop::collection::btree_map(".{1,12}", any::<String>(), 0..8),
        ) {
            let content = PlaylistContent {
                tracks: tracks.into_iter().map(TrackRef::new).collect(),
                metadata,
            };
            let text = write(&content).unwrap();
            prop_assert_eq!(parse(text.as_bytes()).unwrap(), content);
        }
    }
}
