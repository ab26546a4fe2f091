// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Application configuration.
//!
//! This module manages the application configuration file and the locations
//! derived from it: the catalog database and the inbox index both live under
//! the library directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{import::DEFAULT_BATCH_SIZE, player::DEFAULT_POLL_INTERVAL};

const CONFIG_NAME: &str = "musiq";

const DATABASE_FILE: &str = "musiq.db";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    /// Where the catalog and inbox are stored. Defaults to the directory
    /// holding the configuration file.
    pub library_dir: Option<PathBuf>,
    /// Folders imported by a full library scan.
    pub media_dirs: Vec<PathBuf>,
    pub import_batch_size: usize,
    pub poll_interval_ms: u64,
    pub volume: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            library_dir: None,
            media_dirs: vec![],
            import_batch_size: DEFAULT_BATCH_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            volume: 1.0,
        }
    }
}

impl AppConfig {
    pub fn library_dir(&self) -> PathBuf {
        if let Some(dir) = &self.library_dir {
            return dir.clone();
        }

        confy::get_configuration_file_path(CONFIG_NAME, None)
            .ok()
            .and_then(|path| path.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn database_path(&self) -> PathBuf {
        self.library_dir().join(DATABASE_FILE)
    }

    pub fn inbox_index_path(&self) -> PathBuf {
        self.library_dir().join("inbox").join("inbox.json")
    }

    /// Adds `dir` to the media directories, returning `false` if it is
    /// already there.
    pub fn add_media_dir(&mut self, dir: PathBuf) -> bool {
        if self.media_dirs.contains(&dir) {
            return false;
        }
        self.media_dirs.push(dir);
        true
    }
}

/// Loads the configuration, falling back to defaults if it is missing or
/// cannot be parsed.
pub fn load_config() -> AppConfig {
    confy::load(CONFIG_NAME, None).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load configuration, using defaults");
        AppConfig::default()
    })
}

pub fn save_config(cfg: &AppConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}
