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

use chrono::{TimeZone, Utc};
use tempfile::{TempDir, tempdir};

use super::*;
use crate::model::{Rating, TrackDescriptor};

fn open_catalog() -> (TempDir, Catalog) {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(&dir.path().join("musiq.db")).unwrap();
    (dir, catalog)
}

fn descriptor(path: &str, title: &str, artist: &str, album: &str) -> TrackDescriptor {
    TrackDescriptor {
        title: title.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        album_artist: None,
        genre: None,
        year: None,
        track_number: None,
        disc_number: None,
        duration: 180.0,
        bitrate: None,
        sample_rate: None,
        format: "flac".to_string(),
        file_path: path.to_string(),
        file_size: None,
        date_modified: None,
    }
}

fn seed(catalog: &Catalog) {
    let tracks = vec![
        TrackDescriptor {
            genre: Some("Synthpop".to_string()),
            year: Some(1981),
            track_number: Some(1),
            ..descriptor("/m/dm/1.flac", "New Life", "Depeche Mode", "Speak & Spell")
        },
        TrackDescriptor {
            year: Some(1981),
            track_number: Some(2),
            ..descriptor("/m/dm/2.flac", "Just Can't Get Enough", "Depeche Mode", "Speak & Spell")
        },
        TrackDescriptor {
            genre: Some("Synthpop".to_string()),
            year: Some(1990),
            ..descriptor("/m/dm/3.flac", "Enjoy the Silence", "Depeche Mode", "Violator")
        },
        TrackDescriptor {
            genre: Some("Krautrock".to_string()),
            ..descriptor("/m/kw/1.flac", "Autobahn", "Kraftwerk", "Autobahn")
        },
        descriptor("/m/ab/1.flac", "Dancing Queen", "ABBA", "Arrival"),
    ];
    catalog.insert_batch(&tracks, |_, _| {}).unwrap();
}

#[test]
fn insert_then_get_round_trips_all_fields() {
    let (_dir, catalog) = open_catalog();

    let track = TrackDescriptor {
        album_artist: Some("Various".to_string()),
        genre: Some("Jazz".to_string()),
        year: Some(1959),
        track_number: Some(3),
        disc_number: Some(1),
        duration: 562.123_456,
        bitrate: Some(1411),
        sample_rate: Some(44100),
        file_size: Some(99_000_000),
        date_modified: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()),
        ..descriptor("/m/kob/3.flac", "Blue in Green", "Miles Davis", "Kind of Blue")
    };

    let id = catalog.insert(&track).unwrap();
    let stored = catalog.get(id).unwrap().unwrap();

    assert_eq!(stored.id, id);
    assert!((stored.duration - track.duration).abs() < f64::EPSILON);
    assert_eq!(stored.descriptor(), track);
    assert_eq!(stored.play_count, 0);
    assert_eq!(stored.rating, Rating::default());
    assert_eq!(stored.last_played, None);
}

#[test]
fn get_missing_track_returns_none() {
    let (_dir, catalog) = open_catalog();

    assert_eq!(catalog.get(42).unwrap(), None);
}

#[test]
fn duplicate_file_path_conflicts_and_keeps_existing_row() {
    let (_dir, catalog) = open_catalog();
    let id = catalog
        .insert(&descriptor("/m/a.flac", "Original", "A", "B"))
        .unwrap();

    let err = catalog
        .insert(&descriptor("/m/a.flac", "Impostor", "C", "D"))
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(catalog.total_count().unwrap(), 1);
    assert_eq!(catalog.get(id).unwrap().unwrap().title, "Original");
}

#[test]
fn invalid_duration_is_never_stored() {
    let (_dir, catalog) = open_catalog();

    for duration in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let track = TrackDescriptor {
            duration,
            ..descriptor("/m/x.flac", "X", "Y", "Z")
        };
        assert!(matches!(
            catalog.insert(&track),
            Err(CatalogError::InvalidDuration { .. })
        ));
    }

    assert_eq!(catalog.total_count().unwrap(), 0);
}

#[test]
fn insert_batch_is_all_or_nothing() {
    let (_dir, catalog) = open_catalog();
    catalog
        .insert(&descriptor("/m/2.flac", "Existing", "A", "B"))
        .unwrap();

    let batch = vec![
        descriptor("/m/1.flac", "One", "A", "B"),
        descriptor("/m/2.flac", "Two", "A", "B"),
        descriptor("/m/3.flac", "Three", "A", "B"),
    ];

    let mut calls = Vec::new();
    let err = catalog
        .insert_batch(&batch, |done, total| calls.push((done, total)))
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(calls, vec![(1, 3)]);
    assert_eq!(catalog.total_count().unwrap(), 1);
    assert!(catalog.get_by_path("/m/1.flac").unwrap().is_none());
}

#[test]
fn insert_batch_reports_progress_per_row() {
    let (_dir, catalog) = open_catalog();
    let batch = vec![
        descriptor("/m/1.flac", "One", "A", "B"),
        descriptor("/m/2.flac", "Two", "A", "B"),
    ];

    let mut calls = Vec::new();
    let ids = catalog
        .insert_batch(&batch, |done, total| calls.push((done, total)))
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert_eq!(calls, vec![(1, 2), (2, 2)]);
}

#[test]
fn update_replaces_fields_and_delete_removes_row() {
    let (_dir, catalog) = open_catalog();
    let id = catalog
        .insert(&descriptor("/m/a.flac", "Draft", "A", "B"))
        .unwrap();

    let mut track = catalog.get(id).unwrap().unwrap();
    track.title = "Final".to_string();
    track.genre = Some("Ambient".to_string());
    track.rating = Rating::new(4).unwrap();
    catalog.update(&track).unwrap();

    let stored = catalog.get(id).unwrap().unwrap();
    assert_eq!(stored, track);

    catalog.delete(id).unwrap();
    assert_eq!(catalog.get(id).unwrap(), None);
    assert!(matches!(catalog.delete(id), Err(CatalogError::NotFound(_))));
}

#[test]
fn update_unknown_track_is_not_found() {
    let (_dir, catalog) = open_catalog();
    let id = catalog
        .insert(&descriptor("/m/a.flac", "A", "A", "A"))
        .unwrap();
    let mut track = catalog.get(id).unwrap().unwrap();
    track.id = id + 100;

    assert!(matches!(
        catalog.update(&track),
        Err(CatalogError::NotFound(_))
    ));
}

#[test]
fn update_to_existing_path_conflicts() {
    let (_dir, catalog) = open_catalog();
    catalog
        .insert(&descriptor("/m/a.flac", "A", "A", "A"))
        .unwrap();
    let id = catalog
        .insert(&descriptor("/m/b.flac", "B", "A", "A"))
        .unwrap();

    let mut track = catalog.get(id).unwrap().unwrap();
    track.file_path = "/m/a.flac".to_string();

    assert!(catalog.update(&track).unwrap_err().is_conflict());
}

#[test]
fn record_play_and_rating_update_statistics() {
    let (_dir, catalog) = open_catalog();
    let id = catalog
        .insert(&descriptor("/m/a.flac", "A", "A", "A"))
        .unwrap();

    catalog.record_play(id).unwrap();
    catalog.record_play(id).unwrap();
    catalog.set_rating(id, Rating::new(5).unwrap()).unwrap();

    let track = catalog.get(id).unwrap().unwrap();
    assert_eq!(track.play_count, 2);
    assert!(track.last_played.is_some());
    assert_eq!(track.rating.stars(), 5);
    assert!(Rating::new(6).is_none());
}

#[test]
fn search_is_case_insensitive_over_text_fields() {
    let (_dir, catalog) = open_catalog();
    seed(&catalog);

    let titles = |query: &str| -> Vec<String> {
        catalog
            .search(query)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect()
    };

    assert_eq!(titles("SILENCE"), vec!["Enjoy the Silence"]);
    assert_eq!(titles("kraft"), vec!["Autobahn"]);
    assert_eq!(titles("spell").len(), 2);
    assert_eq!(titles("synthpop").len(), 2);
    assert_eq!(titles("   ").len(), 5);
    assert!(titles("100%").is_empty());
}

#[test]
fn exact_artist_and_album_lookups() {
    let (_dir, catalog) = open_catalog();
    seed(&catalog);

    assert_eq!(catalog.by_artist("Depeche Mode").unwrap().len(), 3);
    assert!(catalog.by_artist("Depeche").unwrap().is_empty());

    let album: Vec<_> = catalog
        .by_album("Speak & Spell")
        .unwrap()
        .into_iter()
        .map(|t| t.track_number)
        .collect();
    assert_eq!(album, vec![Some(1), Some(2)]);
}

#[test]
fn recently_added_returns_newest_first() {
    let (_dir, catalog) = open_catalog();
    let first = catalog
        .insert(&descriptor("/m/1.flac", "First", "A", "A"))
        .unwrap();
    let second = catalog
        .insert(&descriptor("/m/2.flac", "Second", "A", "A"))
        .unwrap();
    let third = catalog
        .insert(&descriptor("/m/3.flac", "Third", "A", "A"))
        .unwrap();

    let ids: Vec<_> = catalog
        .recently_added(2)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();

    assert_eq!(ids, vec![third, second]);
    assert!(first < second);
}

#[test]
fn artist_counts_sum_to_total_count() {
    let (_dir, catalog) = open_catalog();
    seed(&catalog);

    let artists = catalog.all_artists().unwrap();
    let names: Vec<_> = artists.iter().map(|a| a.name.as_str()).collect();

    assert_eq!(names, vec!["ABBA", "Depeche Mode", "Kraftwerk"]);
    assert_eq!(
        artists.iter().map(|a| a.track_count).sum::<u64>(),
        catalog.total_count().unwrap()
    );
}

#[test]
fn albums_are_grouped_by_album_and_artist() {
    let (_dir, catalog) = open_catalog();
    seed(&catalog);

    let albums = catalog.all_albums().unwrap();

    assert_eq!(
        albums,
        vec![
            AlbumSummary {
                title: "Arrival".to_string(),
                artist: "ABBA".to_string(),
                track_count: 1,
                year: None,
            },
            AlbumSummary {
                title: "Speak & Spell".to_string(),
                artist: "Depeche Mode".to_string(),
                track_count: 2,
                year: Some(1981),
            },
            AlbumSummary {
                title: "Violator".to_string(),
                artist: "Depeche Mode".to_string(),
                track_count: 1,
                year: Some(1990),
            },
            AlbumSummary {
                title: "Autobahn".to_string(),
                artist: "Kraftwerk".to_string(),
                track_count: 1,
                year: None,
            },
        ]
    );
}

#[test]
fn totals_cover_the_whole_catalog() {
    let (_dir, catalog) = open_catalog();
    assert_eq!(catalog.total_count().unwrap(), 0);
    assert_eq!(catalog.total_duration().unwrap(), 0.0);

    seed(&catalog);

    assert_eq!(catalog.total_count().unwrap(), 5);
    assert!((catalog.total_duration().unwrap() - 900.0).abs() < 1e-9);
}

#[test]
fn mutations_notify_subscribers() {
    let (_dir, catalog) = open_catalog();
    let changes = catalog.subscribe();

    let id = catalog
        .insert(&descriptor("/m/a.flac", "A", "A", "A"))
        .unwrap();
    catalog.record_play(id).unwrap();
    catalog.delete(id).unwrap();
    let _ = catalog.insert(&descriptor("/m/a.flac", "A", "A", "A"));
    let _ = catalog.insert(&descriptor("/m/a.flac", "A", "A", "A"));

    assert_eq!(changes.try_iter().count(), 4);
}

#[test]
fn catalog_reopens_with_existing_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("musiq.db");

    {
        let catalog = Catalog::open(&path).unwrap();
        catalog
            .insert(&descriptor("/m/a.flac", "A", "A", "A"))
            .unwrap();
    }

    let catalog = Catalog::open(&path).unwrap();
    assert_eq!(catalog.total_count().unwrap(), 1);
}
