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

//! JSON persistence of the inbox item list.
//!
//! Only the items are stored. Per-track descriptors are rebuilt by scanning
//! the staged folder again when they are needed.

use std::{fs, io, path::Path};

use thiserror::Error;

use crate::model::InboxItem;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("inbox index I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("inbox index is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads the item list, returning an empty list if no index exists yet.
pub(crate) fn load(path: &Path) -> Result<Vec<InboxItem>, IndexError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(serde_json::from_slice(&data)?)
}

/// Writes the item list, replacing the previous index atomically.
pub(crate) fn save(path: &Path, items: &[InboxItem]) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_vec_pretty(items)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;

    Ok(())
}
