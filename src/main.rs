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

//! # musiq command-line interface.
//!
//! A thin plain-text frontend over the library: it loads the configuration,
//! constructs the catalog, importer, inbox and player services, and runs a
//! single command against them.
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use musiq::{
    config::{self, AppConfig},
    db::Catalog,
    import::{self, CancelToken, ImportEvent, Importer},
    inbox::InboxStore,
    metadata,
    model::{InboxItem, Track},
    player::{PlaybackController, PlaybackEvent},
    util::format::{format_size, format_time},
};

#[derive(Parser, Debug)]
#[command(name = "musiq")]
#[command(about = "Personal music library import and playback")]
#[command(version)]
struct Args {
    /// Directory holding the catalog and inbox, overriding the configuration
    #[arg(long, env = "MUSIQ_LIBRARY_DIR")]
    library_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a folder or a single audio file into the catalog
    Import { path: PathBuf },

    /// Import every configured media directory
    Scan,

    /// Add a folder to the media directories imported by `scan`
    AddDir { path: PathBuf },

    /// Stage folders for review before importing them
    #[command(subcommand)]
    Inbox(InboxCommand),

    /// Search titles, artists, albums and genres
    Search { query: String },

    /// List artists with their track counts
    Artists,

    /// List albums with their track counts
    Albums,

    /// Show the most recently added tracks
    Recent {
        #[arg(default_value_t = 20)]
        limit: usize,
    },

    /// Show catalog totals
    Stats,

    /// Play an audio file until it ends
    Play { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum InboxCommand {
    /// Stage a folder and scan it
    Add { path: PathBuf },

    /// List staged folders
    List,

    /// List the tracks found in a staged folder
    Tracks { id: Uuid },

    /// Import a staged folder into the catalog
    Import { id: Uuid },

    /// Drop a staged folder without importing it
    Remove { id: Uuid },

    /// Drop every staged folder
    Clear,
}

/// The services a command runs against.
struct Library {
    config: AppConfig,
    catalog: Arc<Catalog>,
    importer: Arc<Importer>,
}

impl Library {
    fn open(config: AppConfig) -> Result<Self> {
        let db_path = config.database_path();
        info!(path = %db_path.display(), "Opening catalog");

        let catalog = Arc::new(
            Catalog::open(&db_path)
                .with_context(|| format!("Failed to open catalog at {}", db_path.display()))?,
        );
        let importer = Arc::new(Importer::new(
            Arc::clone(&catalog),
            config.import_batch_size,
        ));

        Ok(Self {
            config,
            catalog,
            importer,
        })
    }

    fn inbox(&self) -> Result<InboxStore> {
        let index_path = self.config.inbox_index_path();
        InboxStore::open(&index_path, Arc::clone(&self.importer))
            .with_context(|| format!("Failed to open inbox at {}", index_path.display()))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = config::load_config();
    if let Some(dir) = args.library_dir {
        config.library_dir = Some(dir);
    }

    let library = Library::open(config).context("Failed to initialise library")?;

    match args.command {
        Command::Import { path } => import_path(&library, path),
        Command::Scan => scan(&library),
        Command::AddDir { path } => add_media_dir(path),
        Command::Inbox(command) => run_inbox(&library, command),
        Command::Search { query } => {
            print_tracks(&library.catalog.search(&query)?);
            Ok(())
        }
        Command::Artists => {
            for artist in library.catalog.all_artists()? {
                println!("{:>5}  {}", artist.track_count, artist.name);
            }
            Ok(())
        }
        Command::Albums => {
            for album in library.catalog.all_albums()? {
                let year = album.year.map(|y| y.to_string()).unwrap_or_default();
                println!(
                    "{:>5}  {:<4}  {} - {}",
                    album.track_count, year, album.artist, album.title
                );
            }
            Ok(())
        }
        Command::Recent { limit } => {
            print_tracks(&library.catalog.recently_added(limit)?);
            Ok(())
        }
        Command::Stats => {
            println!("Tracks:   {}", library.catalog.total_count()?);
            println!(
                "Duration: {}",
                format_time(library.catalog.total_duration()?)
            );
            Ok(())
        }
        Command::Play { file } => play(&library, &file),
    }
}

fn import_path(library: &Library, path: PathBuf) -> Result<()> {
    let handle = import::spawn_import(Arc::clone(&library.importer), path.clone());

    for event in &handle.events {
        print_import_event(&event);
    }

    let imported = handle
        .wait()
        .with_context(|| format!("Failed to import {}", path.display()))?;
    println!("Imported {imported} tracks from {}", path.display());

    Ok(())
}

fn scan(library: &Library) -> Result<()> {
    if library.config.media_dirs.is_empty() {
        bail!("No media directories configured");
    }

    for dir in &library.config.media_dirs {
        import_path(library, dir.clone())?;
    }

    Ok(())
}

fn add_media_dir(path: PathBuf) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))?;

    // Reload so a --library-dir override is not written back
    let mut config = config::load_config();
    if config.add_media_dir(path.clone()) {
        config::save_config(&config).context("Failed to save configuration")?;
        println!("Added {}", path.display());
    } else {
        println!("{} is already configured", path.display());
    }

    Ok(())
}

fn run_inbox(library: &Library, command: InboxCommand) -> Result<()> {
    let inbox = library.inbox()?;

    match command {
        InboxCommand::Add { path } => {
            let id = inbox
                .add_folder(&path)
                .with_context(|| format!("Failed to stage {}", path.display()))?
                .wait();
            if let Some(item) = inbox.get(id) {
                print_item(&item);
            }
        }
        InboxCommand::List => {
            for item in inbox.list_items() {
                print_item(&item);
            }
        }
        InboxCommand::Tracks { id } => {
            for track in inbox.tracks_for(id)? {
                let d = &track.descriptor;
                println!(
                    "{}  {} - {} ({})",
                    format_time(d.duration),
                    d.artist,
                    d.title,
                    d.album
                );
            }
        }
        InboxCommand::Import { id } => {
            let (tx, rx) = mpsc::channel::<ImportEvent>();
            let printer = thread::spawn(move || {
                for event in rx {
                    print_import_event(&event);
                }
            });

            let result = inbox.import_item(id, &tx, &CancelToken::new());
            drop(tx);
            let _ = printer.join();

            let imported = result.context("Failed to import inbox item")?;
            println!("Imported {imported} tracks");
        }
        InboxCommand::Remove { id } => inbox.remove_item(id)?,
        InboxCommand::Clear => inbox.clear_all()?,
    }

    Ok(())
}

fn play(library: &Library, file: &Path) -> Result<()> {
    let descriptor = match library.catalog.get_by_path(&file.to_string_lossy())? {
        Some(track) => track.descriptor(),
        None => metadata::extract(file)
            .with_context(|| format!("Cannot play {}", file.display()))?,
    };

    let player = PlaybackController::with_mpv(
        Duration::from_millis(library.config.poll_interval_ms),
        library.config.volume,
    )
    .context("Failed to start audio player")?;
    let events = player.subscribe();

    player.play(&descriptor)?;
    println!("Playing {} - {}", descriptor.artist, descriptor.title);

    loop {
        match events.recv_timeout(Duration::from_secs(1)) {
            Ok(PlaybackEvent::TrackFinished(_)) => break,
            Ok(_) | Err(mpsc::RecvTimeoutError::Timeout) => {
                println!(
                    "{} / {}",
                    format_time(player.current_time()),
                    format_time(player.duration())
                );
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(track) = library.catalog.get_by_path(&descriptor.file_path)? {
        library.catalog.record_play(track.id)?;
    }

    Ok(())
}

fn print_import_event(event: &ImportEvent) {
    match event {
        ImportEvent::Discovered { total } => println!("Found {total} audio files"),
        ImportEvent::Progress {
            processed,
            total,
            file_name,
        } => println!("[{processed}/{total}] {file_name}"),
        ImportEvent::BatchCommitted { committed, .. } => {
            println!("Committed {committed} tracks")
        }
        ImportEvent::Failed { committed, reason } => {
            println!("Import stopped after {committed} tracks: {reason}")
        }
        ImportEvent::Finished { .. } => {}
    }
}

fn print_item(item: &InboxItem) {
    let tracks = item
        .track_count
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());
    let size = item.total_size.map(format_size).unwrap_or_default();
    println!(
        "{}  {:<9}  {:>5} tracks  {:>9}  {}",
        item.id, item.status, tracks, size, item.folder_path.display()
    );
}

fn print_tracks(tracks: &[Track]) {
    for track in tracks {
        println!(
            "{:>6}  {}  {} - {} ({})",
            track.id,
            format_time(track.duration),
            track.artist,
            track.title,
            track.album
        );
    }
}
