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

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Config, IdentityConfig, ObservabilityConfig, StoreConfig};

/// Log formats understood by the observability layer
pub const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validation trait for configuration sections
pub trait Validator {
    /// Check the section, returning the first problem found
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.store.validate()?;
        self.identity.validate()?;
        self.observability.validate()?;

        if let Some(remote) = &self.store.remote {
            if !self.remotes.contains_key(remote) {
                return Err(ConfigError::invalid_value(
                    "store.remote",
                    format!("remote '{}' is not configured", remote),
                ));
            }
        } else if self.store.push_on_commit {
            return Err(ConfigError::MissingRequired("store.remote".to_string()));
        }

        for (name, remote) in &self.remotes {
            if remote.url.is_empty() {
                return Err(ConfigError::MissingRequired(format!("remotes.{}.url", name)));
            }
        }

        Ok(())
    }
}

impl Validator for StoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.owner.is_empty() {
            return Err(ConfigError::MissingRequired("store.owner".to_string()));
        }

        if self.owner.contains('/') || self.owner.contains('\\') || self.owner.starts_with('.') {
            return Err(ConfigError::invalid_value(
                "store.owner",
                format!(
                    "must be a single directory name not starting with '.', got {}",
                    self.owner
                ),
            ));
        }

        if self.commit_retries == 0 {
            return Err(ConfigError::invalid_value(
                "store.commit_retries",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

impl Validator for IdentityConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("identity.name".to_string()));
        }
        if self.email.contains(['<', '>', '\n']) {
            return Err(ConfigError::invalid_value(
                "identity.email",
                format!("contains reserved characters: {}", self.email),
            ));
        }
        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !LOG_FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", LOG_FORMATS.join(", ")),
            ));
        }

        if !is_valid_log_filter(&self.log_level) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!(
                    "expected a level ({}) or target=level directives, got {}",
                    LOG_LEVELS.join(", "),
                    self.log_level
                ),
            ));
        }

        Ok(())
    }
}

/// Accepts `level` and comma-separated `target=level` directives
fn is_valid_log_filter(filter: &str) -> bool {
    !filter.trim().is_empty()
        && filter.split(',').all(|directive| {
            let level = match directive.rsplit_once('=') {
                Some((target, level)) if !target.trim().is_empty() => level,
                Some(_) => return false,
                None => directive,
            };
            LOG_LEVELS.contains(&level.trim().to_lowercase().as_str())
        })
}
