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

//! Audio file metadata extraction.
//!
//! This module turns a single audio file into a [`TrackDescriptor`] using
//! `Lofty` to read container properties and tags. Extraction never fails
//! outright: a file that cannot be read, or that does not report a usable
//! duration, yields a [`Skip`] which callers log and move past.


use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use thiserror::Error;

use crate::model::{TrackDescriptor, UNKNOWN_ALBUM, UNKNOWN_ARTIST};

/// File extensions accepted by the importer and the inbox, lower case.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "aiff", "m4a", "ogg", "opus", "dsd", "dsf", "dff", "ape", "wv",
];

/// Tag fields that may carry a release or recording date, in order of
/// preference.
const DATE_KEYS: &[ItemKey] = &[
    ItemKey::RecordingDate,
    ItemKey::Year,
    ItemKey::ReleaseDate,
    ItemKey::OriginalReleaseDate,
];

/// The reason a file was not turned into a descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Skip {
    #[error("unreadable file: {0}")]
    Unreadable(String),

    #[error("no usable duration ({0}s)")]
    NoDuration(f64),

    #[error("path is not valid UTF-8")]
    InvalidPath,
}

/// Returns `true` if the file extension is one of [`SUPPORTED_EXTENSIONS`],
/// ignoring case.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reads duration, audio properties and tags from the file at `path`.
///
/// Missing tags fall back to defaults: the title to the file name without
/// its extension, the artist to "Unknown Artist" and the album to
/// "Unknown Album". Everything else is left absent.
///
/// # Errors
///
/// Returns a [`Skip`] if the container cannot be read, if it reports a zero
/// or non-finite duration, or if the path cannot be stored as text.
pub fn extract(path: &Path) -> Result<TrackDescriptor, Skip> {
    let file_path = path.to_str().ok_or(Skip::InvalidPath)?.to_string();

    let tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|e| Skip::Unreadable(e.to_string()))?;

    let properties = tagged_file.properties();

    let duration = properties.duration().as_secs_f64();
    if !duration.is_finite() || duration <= 0.0 {
        return Err(Skip::NoDuration(duration));
    }

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let title = tag
        .and_then(|t| t.title())
        .and_then(|s| non_blank(&s))
        .unwrap_or_else(|| file_stem(path));
    let artist = tag
        .and_then(|t| t.artist())
        .and_then(|s| non_blank(&s))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let album = tag
        .and_then(|t| t.album())
        .and_then(|s| non_blank(&s))
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    let genre = tag.and_then(|t| t.genre()).and_then(|s| non_blank(&s));
    let album_artist = tag.and_then(|t| tag_text(t, &ItemKey::AlbumArtist));
    let year = tag.and_then(tag_year);

    let file_meta = fs::metadata(path).ok();

    Ok(TrackDescriptor {
        title,
        artist,
        album,
        album_artist,
        genre,
        year,
        track_number: tag.and_then(|t| t.track()),
        disc_number: tag.and_then(|t| t.disk()),
        duration,
        bitrate: properties.audio_bitrate(),
        sample_rate: properties.sample_rate(),
        format: extension(path),
        file_path,
        file_size: file_meta
            .as_ref()
            .and_then(|m| i64::try_from(m.len()).ok()),
        date_modified: file_meta
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from),
    })
}

/// Extracts the first run of four digits from a date-like tag value.
pub fn parse_year(value: &str) -> Option<i32> {
    let mut run = 0;
    for (i, c) in value.char_indices() {
        if c.is_ascii_digit() {
            run += 1;
            if run == 4 {
                return value[i - 3..=i].parse().ok();
            }
        } else {
            run = 0;
        }
    }
    None
}

/// The year of the first date-like field in `tag` that carries one.
fn tag_year(tag: &Tag) -> Option<i32> {
    DATE_KEYS
        .iter()
        .filter_map(|key| tag_text(tag, key))
        .find_map(|date| parse_year(&date))
}

fn tag_text(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get(*key)
        .and_then(|item| item.value().text())
        .and_then(non_blank)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
