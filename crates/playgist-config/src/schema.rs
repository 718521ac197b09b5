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

//! Configuration schema
//!
//! Every section defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the repository metadata directory holding `config.toml`
pub const CONFIG_DIR: &str = ".playgist";

/// File name of the per-repository configuration
pub const CONFIG_FILE: &str = "config.toml";

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Playlist store settings
    pub store: StoreConfig,

    /// Commit author
    pub identity: IdentityConfig,

    /// Remote repositories by name
    pub remotes: HashMap<String, RemoteConfig>,

    /// Logging settings
    pub observability: ObservabilityConfig,
}

/// Playlist store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace; playlists live under `<repository>/<owner>/`
    pub owner: String,

    /// Working directory of the backing repository
    pub repository: PathBuf,

    /// Push after every successful commit
    pub push_on_commit: bool,

    /// Attempts per commit when the branch moves underneath us
    pub commit_retries: u32,

    /// Remote to push to (must name an entry in `remotes`)
    pub remote: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repository: PathBuf::from("."),
            push_on_commit: false,
            commit_retries: default_commit_retries(),
            remote: None,
        }
    }
}

/// Commit author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "playgist".to_string(),
            email: "playgist@localhost".to_string(),
        }
    }
}

/// A remote repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// `file://` URL or plain path
    pub url: String,

    /// Refspec pushed to this remote
    #[serde(default = "default_refspec")]
    pub refspec: String,
}

impl RemoteConfig {
    /// Remote with the default refspec
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            refspec: default_refspec(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive
    pub log_level: String,

    /// `pretty`, `compact` or `json`
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Add or update a remote
    pub fn set_remote(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.remotes.insert(name.into(), RemoteConfig::new(url));
    }

    /// Remote the store pushes to, with its settings
    pub fn push_target(&self) -> Option<(&str, &RemoteConfig)> {
        let name = self.store.remote.as_deref()?;
        self.remotes.get(name).map(|remote| (name, remote))
    }

    /// Path of the configuration file inside `repo_root`
    pub fn path_in(repo_root: impl AsRef<Path>) -> PathBuf {
        repo_root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load config from repository root
    ///
    /// A missing file yields the default configuration.
    pub async fn load(repo_root: impl AsRef<Path>) -> anyhow::Result<Self> {
        use crate::ConfigLoader;
        let config_path = Self::path_in(repo_root);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let loader = ConfigLoader::new();
        Ok(loader.load_file(&config_path).await?)
    }

    /// Save config to repository root
    pub fn save(&self, repo_root: impl AsRef<Path>) -> anyhow::Result<()> {
        let config_path = Self::path_in(repo_root);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, toml_str)?;
        Ok(())
    }
}

fn default_owner() -> String {
    "default".to_string()
}

fn default_commit_retries() -> u32 {
    3
}

fn default_refspec() -> String {
    "refs/heads/main".to_string()
}
