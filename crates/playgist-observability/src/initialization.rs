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

use crate::config::{LogConfig, LogError, LogFormat, LogOutput};
use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install a subscriber with the given format and level
///
/// ```ignore
/// use playgist_observability::{init_tracing, LogFormat};
///
/// init_tracing(LogFormat::Compact, Some("debug")).unwrap();
/// tracing::info!("store opened");
/// ```
pub fn init_tracing(format: LogFormat, level: Option<&str>) -> Result<(), LogError> {
    let mut config = LogConfig::new().with_format(format);
    if let Some(level) = level {
        config = config.with_level(level);
    }
    init_tracing_with_config(config)
}

/// Install a subscriber described by `config`
///
/// Fails with [`LogError::AlreadyInitialized`] when a global subscriber is
/// already set.
pub fn init_tracing_with_config(config: LogConfig) -> Result<(), LogError> {
    let env_filter = build_env_filter(&config)?;
    let registry = Registry::default().with(env_filter);
    let writer = get_writer(config.output);

    let result = match (config.format, config.use_timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(config.include_targets)
                    .with_ansi(config.use_color)
                    .pretty(),
            )
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(config.include_targets)
                    .with_ansi(config.use_color)
                    .without_time()
                    .pretty(),
            )
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(config.include_targets)
                    .with_ansi(config.use_color)
                    .compact(),
            )
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(config.include_targets)
                    .with_ansi(config.use_color)
                    .without_time()
                    .compact(),
            )
            .try_init(),
        (LogFormat::Json, true) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .with_target(config.include_targets),
            )
            .try_init(),
        (LogFormat::Json, false) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .with_target(config.include_targets)
                    .without_time(),
            )
            .try_init(),
    };

    result.map_err(|e| LogError::AlreadyInitialized(e.to_string()))
}

fn get_writer(output: LogOutput) -> fn() -> Box<dyn io::Write + Send> {
    match output {
        LogOutput::Stderr => || Box::new(io::stderr()),
        LogOutput::Stdout => || Box::new(io::stdout()),
    }
}

fn build_env_filter(config: &LogConfig) -> Result<EnvFilter, LogError> {
    let filter = config.effective_level();
    EnvFilter::try_new(&filter).map_err(|e| LogError::InvalidFilter {
        filter: filter.clone(),
        reason: e.to_string(),
    })
}
