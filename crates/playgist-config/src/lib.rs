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

//! Configuration for playgist stores
//!
//! A store is configured from `<repository>/.playgist/config.toml` (or any
//! TOML/JSON file) with `PLAYGIST_*` environment overrides on top.
//!
//! # Example
//!
//! ```no_run
//! use playgist_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new();
//!     let config = loader.load_with_overrides("playgist.toml").await?;
//!
//!     println!("Playlists for {} in {}", config.store.owner, config.store.repository.display());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};
pub use schema::*;
pub use validation::{Validator, LOG_FORMATS};
