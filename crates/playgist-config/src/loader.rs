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
use crate::schema::Config;
use crate::validation::Validator;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    validate: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).await?;

        info!(
            "Loaded {} configuration file: {}",
            format.name(),
            path.display()
        );

        self.load_from_string(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let config: Config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };

        if self.validate {
            config.validate()?;
            debug!("Configuration validated successfully");
        }

        Ok(config)
    }

    /// Load configuration with environment variable overrides
    ///
    /// Overrides are validated together with the file contents.
    pub async fn load_with_overrides<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let mut config = Self::without_validation().load_file(path).await?;
        self.apply_env_overrides(&mut config)?;
        if self.validate {
            config.validate()?;
        }
        Ok(config)
    }

    /// Apply `PLAYGIST_*` environment variable overrides
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        // Store settings
        if let Ok(value) = std::env::var("PLAYGIST_OWNER") {
            config.store.owner = value;
        }
        if let Ok(value) = std::env::var("PLAYGIST_REPOSITORY") {
            config.store.repository = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("PLAYGIST_REMOTE") {
            config.store.remote = if value.is_empty() { None } else { Some(value) };
        }
        if let Ok(value) = std::env::var("PLAYGIST_PUSH_ON_COMMIT") {
            config.store.push_on_commit = parse_bool("PLAYGIST_PUSH_ON_COMMIT", &value)?;
        }
        if let Ok(value) = std::env::var("PLAYGIST_COMMIT_RETRIES") {
            config.store.commit_retries = value.parse().map_err(|_| {
                ConfigError::env_var_parsing_error(
                    "PLAYGIST_COMMIT_RETRIES",
                    &value,
                    "expected a positive integer",
                )
            })?;
        }

        // Identity
        if let Ok(value) = std::env::var("PLAYGIST_AUTHOR_NAME") {
            config.identity.name = value;
        }
        if let Ok(value) = std::env::var("PLAYGIST_AUTHOR_EMAIL") {
            config.identity.email = value;
        }

        // Observability settings
        if let Ok(value) = std::env::var("PLAYGIST_LOG_LEVEL") {
            config.observability.log_level = value;
        }
        if let Ok(value) = std::env::var("PLAYGIST_LOG_FORMAT") {
            config.observability.log_format = value;
        }

        Ok(())
    }
}

fn parse_bool(variable: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::env_var_parsing_error(
            variable,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}
