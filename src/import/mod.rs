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

//! Media library import pipeline.
//!
//! This module turns a filesystem tree into catalog tracks. It discovers
//! supported audio files with `WalkDir`, extracts each one with the
//! [`metadata`](crate::metadata) module and commits the descriptors to the
//! [`Catalog`] in bounded batches, one transaction per batch.
//!
//! # Progress and cancellation
//!
//! Progress is reported as a stream of [`ImportEvent`]s sent to a
//! [`ProgressSink`], usually the sending half of an `mpsc` channel. An import
//! can be stopped between files with a [`CancelToken`]; batches committed
//! before the cancellation are kept.
//!
//! # Failure model
//!
//! Unreadable files are skipped and logged. A failing batch is rolled back
//! in full, earlier batches stay committed, and the error is returned to the
//! caller together with the number of tracks already committed.

mod discover;

pub(crate) use discover::discover;

use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender, SyncSender},
    },
    thread::{self, JoinHandle},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    db::{Catalog, CatalogError},
    metadata,
    model::TrackDescriptor,
};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an import operation is already in progress")]
    ImportInProgress,

    #[error("cannot access {path}: {source}")]
    CannotAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("import cancelled after committing {committed} tracks")]
    Cancelled { committed: usize },

    #[error("batch commit failed after committing {committed} tracks: {source}")]
    Commit {
        committed: usize,
        #[source]
        source: CatalogError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    /// The walk finished and found `total` candidate files.
    Discovered { total: usize },

    /// A file was processed, whether it was kept or skipped.
    Progress {
        processed: usize,
        total: usize,
        file_name: String,
    },

    /// A batch of `rows` tracks was committed, bringing the run total to
    /// `committed`.
    BatchCommitted { rows: usize, committed: usize },

    /// The import stopped early; `committed` tracks remain in the catalog.
    Failed { committed: usize, reason: String },

    Finished { imported: usize },
}

/// Receives import progress events.
///
/// Events are fire-and-forget: a sink whose receiver has gone away silently
/// drops them and the import carries on.
pub trait ProgressSink {
    fn send(&self, event: ImportEvent);
}

impl ProgressSink for Sender<ImportEvent> {
    fn send(&self, event: ImportEvent) {
        let _ = Sender::send(self, event);
    }
}

impl ProgressSink for SyncSender<ImportEvent> {
    fn send(&self, event: ImportEvent) {
        let _ = SyncSender::send(self, event);
    }
}

/// A sink that discards every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn send(&self, _event: ImportEvent) {}
}

/// Requests that a running import stop at the next file boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Imports folders into the catalog, one import at a time.
pub struct Importer {
    catalog: Arc<Catalog>,
    batch_size: usize,
    active: AtomicBool,
}

impl Importer {
    pub fn new(catalog: Arc<Catalog>, batch_size: usize) -> Self {
        Self {
            catalog,
            batch_size: batch_size.max(1),
            active: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_importing(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Imports every supported audio file under `root` and returns the number
    /// of tracks committed.
    ///
    /// `root` may also be a single audio file. Files that cannot be read are
    /// skipped and not counted.
    ///
    /// # Errors
    ///
    /// * [`ImportError::ImportInProgress`] if another import is running on
    ///   this importer; nothing else happens in that case.
    /// * [`ImportError::CannotAccess`] if `root` cannot be read.
    /// * [`ImportError::Cancelled`] if `cancel` was triggered.
    /// * [`ImportError::Commit`] if a batch could not be committed.
    pub fn import_folder(
        &self,
        root: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<usize, ImportError> {
        let _guard = ImportGuard::acquire(&self.active).ok_or(ImportError::ImportInProgress)?;

        info!(root = %root.display(), "Starting import");

        let files = discover(root)?;
        let total = files.len();

        info!(total, "Found audio files");
        progress.send(ImportEvent::Discovered { total });

        let mut run = ImportRun {
            catalog: &self.catalog,
            progress,
            batch: Vec::with_capacity(self.batch_size.min(total)),
            committed: 0,
        };

        for (index, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(committed = run.committed, "Import cancelled");
                let committed = run.committed;
                run.fail("cancelled");
                return Err(ImportError::Cancelled { committed });
            }

            match metadata::extract(&file.path) {
                Ok(track) => run.batch.push(track),
                Err(skip) => warn!(path = %file.path.display(), reason = %skip, "Skipping file"),
            }

            progress.send(ImportEvent::Progress {
                processed: index + 1,
                total,
                file_name: file_name(&file.path),
            });

            if run.batch.len() >= self.batch_size {
                run.commit()?;
            }
        }

        if !run.batch.is_empty() {
            run.commit()?;
        }

        info!(imported = run.committed, "Import finished");
        progress.send(ImportEvent::Finished {
            imported: run.committed,
        });

        Ok(run.committed)
    }
}

/// Accumulates descriptors for one import run and commits them in batches.
struct ImportRun<'a> {
    catalog: &'a Catalog,
    progress: &'a dyn ProgressSink,
    batch: Vec<TrackDescriptor>,
    committed: usize,
}

impl ImportRun<'_> {
    fn commit(&mut self) -> Result<(), ImportError> {
        let rows = self.batch.len();

        if let Err(source) = self.catalog.insert_batch(&self.batch, |_, _| {}) {
            warn!(rows, committed = self.committed, error = %source, "Batch commit failed");
            self.fail(&source.to_string());
            return Err(ImportError::Commit {
                committed: self.committed,
                source,
            });
        }

        self.batch.clear();
        self.committed += rows;

        debug!(rows, committed = self.committed, "Batch committed");
        self.progress.send(ImportEvent::BatchCommitted {
            rows,
            committed: self.committed,
        });

        Ok(())
    }

    fn fail(&self, reason: &str) {
        self.progress.send(ImportEvent::Failed {
            committed: self.committed,
            reason: reason.to_string(),
        });
    }
}

/// Holds the importer's single in-flight slot until dropped.
struct ImportGuard<'a>(&'a AtomicBool);

impl<'a> ImportGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ImportGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An import running on a background thread.
pub struct ImportHandle {
    pub events: Receiver<ImportEvent>,
    pub cancel: CancelToken,
    thread: JoinHandle<Result<usize, ImportError>>,
}

impl ImportHandle {
    /// Waits for the import to finish and returns its result.
    pub fn wait(self) -> Result<usize, ImportError> {
        self.thread
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

/// Runs [`Importer::import_folder`] on a background thread.
pub fn spawn_import(importer: Arc<Importer>, root: PathBuf) -> ImportHandle {
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let thread_cancel = cancel.clone();

    let thread = thread::spawn(move || importer.import_folder(&root, &tx, &thread_cancel));

    ImportHandle {
        events: rx,
        cancel,
        thread,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
