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

//! Structured logging for playgist
//!
//! Library crates only emit `tracing` events. An embedding application
//! calls [`init_tracing`] or [`init_tracing_with_config`] once to install a
//! subscriber in one of three formats:
//!
//! - `Pretty`: multi-line, human readable
//! - `Compact`: one line per event
//! - `Json`: one JSON object per event
//!
//! The level filter uses `EnvFilter` syntax (`info`,
//! `playgist_core=debug,info`, ...). Without an explicit level, `RUST_LOG`
//! is consulted, then `info`.

pub mod config;
pub mod initialization;

pub use config::{LogConfig, LogError, LogFormat, LogOutput};
pub use initialization::{init_tracing, init_tracing_with_config};
