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

//! Domain models and core data structures.
//!
//! This module defines the central entities of the library: the committed
//! [`Track`], the [`TrackDescriptor`] extracted from an audio file before it
//! is persisted, the derived artist/album aggregates, and the inbox entities
//! used while folders are staged for import.

mod inbox;

pub use inbox::{InboxItem, InboxStatus, InboxTrack};

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Structured metadata extracted from one audio file, prior to persistence.
///
/// A descriptor is what the extractor produces, what the inbox stages and
/// what the playback controller consumes. It carries no catalog identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    /// Duration in seconds, always finite and positive.
    pub duration: f64,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    /// Lower-case file extension, e.g. `flac`.
    pub format: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub date_modified: Option<DateTime<Utc>>,
}

/// A committed catalog track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration: f64,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub format: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub date_added: DateTime<Utc>,
    pub date_modified: Option<DateTime<Utc>>,
    pub play_count: u32,
    pub rating: Rating,
    pub last_played: Option<DateTime<Utc>>,
}

impl Track {
    /// Returns the descriptor view of this track, suitable for playback.
    pub fn descriptor(&self) -> TrackDescriptor {
        TrackDescriptor {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            album_artist: self.album_artist.clone(),
            genre: self.genre.clone(),
            year: self.year,
            track_number: self.track_number,
            disc_number: self.disc_number,
            duration: self.duration,
            bitrate: self.bitrate,
            sample_rate: self.sample_rate,
            format: self.format.clone(),
            file_path: self.file_path.clone(),
            file_size: self.file_size,
            date_modified: self.date_modified,
        }
    }
}

/// A track rating, from zero (unrated) to five stars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Option<Self> {
        (stars <= Self::MAX).then_some(Self(stars))
    }

    pub fn stars(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

impl ToSql for Rating {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.0)))
    }
}

impl FromSql for Rating {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let stars = value.as_i64()?;
        u8::try_from(stars)
            .ok()
            .and_then(Rating::new)
            .ok_or(FromSqlError::OutOfRange(stars))
    }
}

/// An artist derived by grouping catalog tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistSummary {
    pub name: String,
    pub track_count: u64,
}

/// An album derived by grouping catalog tracks by album and artist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumSummary {
    pub title: String,
    pub artist: String,
    pub track_count: u64,
    pub year: Option<i32>,
}
