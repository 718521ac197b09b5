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

//! Global subscriber installation
//!
//! The global subscriber can be set once per process, so the whole
//! lifecycle lives in a single test.

#![allow(clippy::unwrap_used)]

use playgist_observability::{
    init_tracing, init_tracing_with_config, LogConfig, LogError, LogFormat, LogOutput,
};

#[test]
fn subscriber_installs_once() {
    let config = LogConfig::new()
        .with_format(LogFormat::Json)
        .with_level("playgist_core=debug,info")
        .with_timestamps(false)
        .with_output(LogOutput::Stdout);

    init_tracing_with_config(config).unwrap();
    tracing::info!(playlist_id = "abc", "subscriber installed");

    let second = init_tracing(LogFormat::Compact, Some("debug"));
    assert!(matches!(second, Err(LogError::AlreadyInitialized(_))));
}

#[test]
fn invalid_filter_is_rejected_before_install() {
    let result = init_tracing_with_config(LogConfig::new().with_level("playgist_core=loud"));
    assert!(result.is_err());
}
