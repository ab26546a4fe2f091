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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("a track with file path {file_path} already exists")]
    Conflict { file_path: String },

    #[error("track {file_path} has an invalid duration of {duration}s")]
    InvalidDuration { file_path: String, duration: f64 },

    #[error("no track with id {0}")]
    NotFound(i64),

    #[error("catalog setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl CatalogError {
    /// Classifies an error raised by an `INSERT` or `UPDATE`, turning a
    /// violation of the unique file path constraint into a conflict.
    pub(crate) fn from_write(err: rusqlite::Error, file_path: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                CatalogError::Conflict {
                    file_path: file_path.to_string(),
                }
            }
            _ => CatalogError::Sqlite(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict { .. })
    }
}
