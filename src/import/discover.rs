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

//! Discovery of audio files beneath an import root.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::{import::ImportError, metadata};

/// Directory extensions treated as opaque bundles and never descended into.
const BUNDLE_EXTENSIONS: &[&str] = &[
    "app",
    "bundle",
    "framework",
    "plugin",
    "pkg",
    "kext",
    "photoslibrary",
    "musiclibrary",
    "logicx",
    "band",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AudioFile {
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
}

/// Finds every supported audio file under `root`, in file name order.
///
/// If `root` is itself a supported audio file it is returned on its own.
/// Hidden entries and bundle directories below the root are skipped, as are
/// entries that cannot be read.
///
/// # Errors
///
/// Returns [`ImportError::CannotAccess`] if the root itself cannot be read.
pub(crate) fn discover(root: &Path) -> Result<Vec<AudioFile>, ImportError> {
    let root_meta = fs::metadata(root).map_err(|source| ImportError::CannotAccess {
        path: root.to_path_buf(),
        source,
    })?;

    if root_meta.is_file() {
        return Ok(if metadata::is_supported(root) {
            vec![AudioFile {
                path: root.to_path_buf(),
                size: root_meta.len(),
            }]
        } else {
            vec![]
        });
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(is_hidden(e) || is_bundle(e)))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(ImportError::CannotAccess {
                    path: root.to_path_buf(),
                    source: e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop")),
                });
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !metadata::is_supported(entry.path()) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        files.push(AudioFile {
            path: entry.into_path(),
            size,
        });
    }

    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_bundle(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| BUNDLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}
