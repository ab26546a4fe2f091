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

//! Mapping between `tracks` rows and domain models.

use rusqlite::Row;

use crate::model::Track;

impl Track {
    /// Builds a [`Track`] from a row selected with the catalog's standard
    /// column list.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            artist: row.get("artist")?,
            album: row.get("album")?,
            album_artist: row.get("album_artist")?,
            genre: row.get("genre")?,
            year: row.get("year")?,
            track_number: row.get("track_number")?,
            disc_number: row.get("disc_number")?,
            duration: row.get("duration")?,
            bitrate: row.get("bitrate")?,
            sample_rate: row.get("sample_rate")?,
            format: row.get("format")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
            date_added: row.get("date_added")?,
            date_modified: row.get("date_modified")?,
            play_count: row.get("play_count")?,
            rating: row.get("rating")?,
            last_played: row.get("last_played")?,
        })
    }
}
