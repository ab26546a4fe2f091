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

//! Data access layer.
//!
//! This module handles all interactions with the SQLite catalog, including
//! schema creation, track persistence and the aggregate queries used to
//! browse the library. It uses cached statements to optimize frequently
//! executed queries.
//!
//! # Tables
//!
//! * `tracks` - Individual audio files with metadata, file paths and play
//!   statistics. Artists and albums are derived by grouping this table.
//!
//! # Concurrency
//!
//! The [`Catalog`] holds two connections to the same database file. All
//! writes are serialised through the writer connection, while reads go
//! through a separate reader connection and so never wait for a running
//! import transaction under WAL isolation.

mod error;
mod model;
#[cfg(test)]
mod tests;

pub use error::CatalogError;

use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError, mpsc::Receiver},
};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use tracing::{debug, info};

use crate::{
    model::{AlbumSummary, ArtistSummary, Rating, Track, TrackDescriptor},
    notify::Notifier,
};

const TRACK_COLUMNS: &str = "id, title, artist, album, album_artist, genre, year, track_number, \
     disc_number, duration, bitrate, sample_rate, format, file_path, file_size, date_added, \
     date_modified, play_count, rating, last_played";

const DEFAULT_ORDER: &str =
    "ORDER BY artist COLLATE NOCASE, album COLLATE NOCASE, disc_number, track_number, title";

/// Broadcast after any operation that mutates the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogChanged;

/// The persistent store of committed tracks.
pub struct Catalog {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    notifier: Notifier<CatalogChanged>,
}

impl Catalog {
    /// Opens (creating if needed) the catalog database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The database file cannot be opened.
    /// * The initial PRAGMA configurations fail.
    /// * The schema initialization fails.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let writer = init_db(path)?;
        create_schema(&writer)?;

        let reader = init_db(path)?;

        info!(path = %path.display(), "Opened catalog");

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            notifier: Notifier::new(),
        })
    }

    /// Subscribes to catalog change notifications.
    pub fn subscribe(&self) -> Receiver<CatalogChanged> {
        self.notifier.subscribe()
    }

    /// Inserts a single track and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] if a track with the same file path
    /// already exists, or [`CatalogError::InvalidDuration`] if the descriptor
    /// does not carry a finite positive duration.
    pub fn insert(&self, track: &TrackDescriptor) -> Result<i64, CatalogError> {
        let id = {
            let mut conn = self.writer();
            let tx = conn.transaction()?;
            let id = insert_track(&tx, track)?;
            tx.commit()?;
            id
        };

        self.notifier.broadcast(CatalogChanged);

        Ok(id)
    }

    /// Inserts every descriptor within a single transaction.
    ///
    /// The `progress` callback is invoked after each row with the number of
    /// rows inserted so far and the batch size. If any row fails, the whole
    /// batch is rolled back and the catalog is left as it was before the
    /// call.
    pub fn insert_batch<F>(
        &self,
        tracks: &[TrackDescriptor],
        mut progress: F,
    ) -> Result<Vec<i64>, CatalogError>
    where
        F: FnMut(usize, usize),
    {
        let ids = {
            let mut conn = self.writer();
            let tx = conn.transaction()?;

            let mut ids = Vec::with_capacity(tracks.len());
            for (index, track) in tracks.iter().enumerate() {
                ids.push(insert_track(&tx, track)?);
                progress(index + 1, tracks.len());
            }

            tx.commit()?;
            ids
        };

        debug!(rows = ids.len(), "Committed track batch");

        self.notifier.broadcast(CatalogChanged);

        Ok(ids)
    }

    /// Replaces the stored fields of an existing track.
    ///
    /// The `date_added` timestamp is immutable and is not touched.
    pub fn update(&self, track: &Track) -> Result<(), CatalogError> {
        validate_duration(&track.file_path, track.duration)?;

        let rows = {
            let conn = self.writer();
            let mut stmt = conn.prepare_cached(
                "UPDATE tracks SET
                    title = ?2, artist = ?3, album = ?4, album_artist = ?5, genre = ?6,
                    year = ?7, track_number = ?8, disc_number = ?9, duration = ?10,
                    bitrate = ?11, sample_rate = ?12, format = ?13, file_path = ?14,
                    file_size = ?15, date_modified = ?16, play_count = ?17, rating = ?18,
                    last_played = ?19
                 WHERE id = ?1",
            )?;

            stmt.execute(params![
                track.id,
                track.title,
                track.artist,
                track.album,
                track.album_artist,
                track.genre,
                track.year,
                track.track_number,
                track.disc_number,
                track.duration,
                track.bitrate,
                track.sample_rate,
                track.format,
                track.file_path,
                track.file_size,
                track.date_modified,
                track.play_count,
                track.rating,
                track.last_played,
            ])
            .map_err(|e| CatalogError::from_write(e, &track.file_path))?
        };

        if rows == 0 {
            return Err(CatalogError::NotFound(track.id));
        }

        self.notifier.broadcast(CatalogChanged);

        Ok(())
    }

    /// Deletes the track with the given id.
    pub fn delete(&self, id: i64) -> Result<(), CatalogError> {
        let rows = self
            .writer()
            .prepare_cached("DELETE FROM tracks WHERE id = ?")?
            .execute([id])?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }

        self.notifier.broadcast(CatalogChanged);

        Ok(())
    }

    /// Increments the play count of a track and stamps its last played time.
    pub fn record_play(&self, id: i64) -> Result<(), CatalogError> {
        let rows = self
            .writer()
            .prepare_cached(
                "UPDATE tracks SET play_count = play_count + 1, last_played = ?2 WHERE id = ?1",
            )?
            .execute(params![id, Utc::now()])?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }

        self.notifier.broadcast(CatalogChanged);

        Ok(())
    }

    pub fn set_rating(&self, id: i64, rating: Rating) -> Result<(), CatalogError> {
        let rows = self
            .writer()
            .prepare_cached("UPDATE tracks SET rating = ?2 WHERE id = ?1")?
            .execute(params![id, rating])?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }

        self.notifier.broadcast(CatalogChanged);

        Ok(())
    }

    /// Fetches a single track by id.
    pub fn get(&self, id: i64) -> Result<Option<Track>, CatalogError> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?");

        let conn = self.reader();
        let mut stmt = conn.prepare_cached(&sql)?;
        let track = stmt.query_row([id], Track::from_row).optional()?;

        Ok(track)
    }

    /// Fetches a single track by its file path.
    pub fn get_by_path(&self, file_path: &str) -> Result<Option<Track>, CatalogError> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE file_path = ?");

        let conn = self.reader();
        let mut stmt = conn.prepare_cached(&sql)?;
        let track = stmt.query_row([file_path], Track::from_row).optional()?;

        Ok(track)
    }

    /// Fetches every track in the catalog, ordered by artist, album and
    /// track number.
    pub fn all(&self) -> Result<Vec<Track>, CatalogError> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks {DEFAULT_ORDER}");
        self.query_tracks(&sql, [])
    }

    /// Case-insensitive substring search over title, artist, album and genre.
    ///
    /// A blank query matches every track.
    pub fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return self.all();
        }

        let sql = format!(
            "SELECT {TRACK_COLUMNS} FROM tracks
             WHERE title LIKE ?1 ESCAPE '\\'
                OR artist LIKE ?1 ESCAPE '\\'
                OR album LIKE ?1 ESCAPE '\\'
                OR genre LIKE ?1 ESCAPE '\\'
             {DEFAULT_ORDER}"
        );

        self.query_tracks(&sql, [like_pattern(query)])
    }

    pub fn by_artist(&self, artist: &str) -> Result<Vec<Track>, CatalogError> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE artist = ? {DEFAULT_ORDER}");
        self.query_tracks(&sql, [artist])
    }

    pub fn by_album(&self, album: &str) -> Result<Vec<Track>, CatalogError> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE album = ? {DEFAULT_ORDER}");
        self.query_tracks(&sql, [album])
    }

    /// Fetches the `limit` most recently added tracks, newest first.
    pub fn recently_added(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let sql = format!(
            "SELECT {TRACK_COLUMNS} FROM tracks ORDER BY date_added DESC, id DESC LIMIT ?"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_tracks(&sql, [limit])
    }

    /// Fetches every distinct artist with its track count, sorted by name.
    pub fn all_artists(&self) -> Result<Vec<ArtistSummary>, CatalogError> {
        let conn = self.reader();
        let mut stmt = conn.prepare_cached(
            "SELECT artist, COUNT(*) FROM tracks GROUP BY artist ORDER BY artist COLLATE NOCASE",
        )?;

        let artists = stmt
            .query_map([], |row| {
                Ok(ArtistSummary {
                    name: row.get(0)?,
                    track_count: get_count(row, 1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(artists)
    }

    /// Fetches every distinct album/artist pairing with its track count and
    /// year, sorted by artist then album.
    pub fn all_albums(&self) -> Result<Vec<AlbumSummary>, CatalogError> {
        let conn = self.reader();
        let mut stmt = conn.prepare_cached(
            "SELECT album, artist, COUNT(*), MAX(year)
             FROM tracks
             GROUP BY album, artist
             ORDER BY artist COLLATE NOCASE, album COLLATE NOCASE",
        )?;

        let albums = stmt
            .query_map([], |row| {
                Ok(AlbumSummary {
                    title: row.get(0)?,
                    artist: row.get(1)?,
                    track_count: get_count(row, 2)?,
                    year: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(albums)
    }

    pub fn total_count(&self) -> Result<u64, CatalogError> {
        let count = self
            .reader()
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| get_count(row, 0))?;
        Ok(count)
    }

    /// Sum of all track durations, in seconds.
    pub fn total_duration(&self) -> Result<f64, CatalogError> {
        let total = self.reader().query_row(
            "SELECT COALESCE(SUM(duration), 0.0) FROM tracks",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn query_tracks<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<Track>, CatalogError> {
        let conn = self.reader();
        let mut stmt = conn.prepare_cached(sql)?;
        let tracks = stmt
            .query_map(params, Track::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tracks)
    }

    // The connection stays usable after a panic elsewhere, any open
    // transaction was rolled back when it was dropped.
    fn writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reader(&self) -> MutexGuard<'_, Connection> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Opens a connection to the SQLite database and configures performance
/// settings.
///
/// * **WAL Mode**: Enables Write-Ahead Logging so readers never block the
///   writer.
/// * **Performance Tuning**: Sets synchronous mode to `NORMAL` and increases
///   the cache size.
/// * **Busy Timeout**: Waits for a competing writer rather than failing.
fn init_db(path: &Path) -> Result<Connection, CatalogError> {
    let conn = Connection::open(path)?;

    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    if journal_mode != "wal" {
        return Err(CatalogError::Setup(format!(
            "Failed to switch to WAL mode. Current mode: {journal_mode}"
        )));
    }

    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -64000; -- Use 64MB of RAM for cache
    ",
    )?;

    conn.set_prepared_statement_cache_capacity(100);

    Ok(conn)
}

/// Create the database schema.
///
/// The `tracks` table enforces the catalog invariants directly: file paths
/// are unique, durations positive, ratings within range. Indices cover the
/// columns used for browsing and sorting.
///
/// This operation is wrapped in a single SQL transaction so the schema is
/// created atomically.
fn create_schema(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            album TEXT NOT NULL,
            album_artist TEXT,
            genre TEXT,
            year INTEGER,
            track_number INTEGER,
            disc_number INTEGER,
            duration REAL NOT NULL CHECK (duration > 0),
            bitrate INTEGER,
            sample_rate INTEGER,
            format TEXT NOT NULL,
            file_path TEXT NOT NULL UNIQUE,
            file_size INTEGER,
            date_added TEXT NOT NULL,
            date_modified TEXT,
            play_count INTEGER NOT NULL DEFAULT 0 CHECK (play_count >= 0),
            rating INTEGER NOT NULL DEFAULT 0 CHECK (rating BETWEEN 0 AND 5),
            last_played TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks (artist);
        CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks (album);
        CREATE INDEX IF NOT EXISTS idx_tracks_genre ON tracks (genre);
        CREATE INDEX IF NOT EXISTS idx_tracks_date_added ON tracks (date_added);

        COMMIT;",
    )
    .map_err(|e| CatalogError::Setup(format!("Failed to create schema: {e}")))
}

fn insert_track(tx: &Transaction, track: &TrackDescriptor) -> Result<i64, CatalogError> {
    validate_duration(&track.file_path, track.duration)?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO tracks (
            title, artist, album, album_artist, genre, year, track_number, disc_number,
            duration, bitrate, sample_rate, format, file_path, file_size, date_added,
            date_modified
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )?;

    stmt.execute(params![
        track.title,
        track.artist,
        track.album,
        track.album_artist,
        track.genre,
        track.year,
        track.track_number,
        track.disc_number,
        track.duration,
        track.bitrate,
        track.sample_rate,
        track.format,
        track.file_path,
        track.file_size,
        Utc::now(),
        track.date_modified,
    ])
    .map_err(|e| CatalogError::from_write(e, &track.file_path))?;

    Ok(tx.last_insert_rowid())
}

fn validate_duration(file_path: &str, duration: f64) -> Result<(), CatalogError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidDuration {
            file_path: file_path.to_string(),
            duration,
        })
    }
}

/// Builds a `LIKE` pattern matching `query` anywhere, with the wildcard
/// characters in the query itself escaped.
/// Reads a `COUNT(*)` column, which SQLite stores as a signed integer.
fn get_count(row: &Row, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
