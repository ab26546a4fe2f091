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

//! Inbox staging of folders awaiting import.
//!
//! A folder added to the inbox is scanned on a background thread: its audio
//! files are counted, sized and extracted into [`InboxTrack`] descriptors so
//! the user can review them before anything touches the catalog. Importing
//! an item hands its folder to the [`Importer`]; on success the item leaves
//! the inbox.
//!
//! The item list is written to a JSON index after every mutation so staged
//! folders survive restarts. Descriptors are kept in memory only and are
//! rebuilt on demand.

mod index;

pub use index::IndexError;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc::Receiver},
    thread::{self, JoinHandle},
};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    import::{self, CancelToken, ImportError, Importer, ProgressSink},
    metadata,
    model::{InboxItem, InboxStatus, InboxTrack},
    notify::Notifier,
};

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("no inbox item with id {0}")]
    NotFound(Uuid),

    #[error("inbox item {id} cannot be imported while {status}")]
    NotReady { id: Uuid, status: InboxStatus },

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Persist(#[from] IndexError),
}

/// Broadcast after any change to the inbox items or their descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxChanged;

struct InboxState {
    items: Vec<InboxItem>,
    tracks: HashMap<Uuid, Vec<InboxTrack>>,
}

impl InboxState {
    fn item_mut(&mut self, id: Uuid) -> Option<&mut InboxItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn remove(&mut self, id: Uuid) {
        self.tracks.remove(&id);
        self.items.retain(|item| item.id != id);
    }
}

/// State shared between the store and its background scan threads.
struct Shared {
    index_path: PathBuf,
    state: Mutex<InboxState>,
    notifier: Notifier<InboxChanged>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &InboxState) -> Result<(), IndexError> {
        index::save(&self.index_path, &state.items)
    }

    /// Saves `items` and only then makes them the current item list, so a
    /// failed write leaves the inbox as it was.
    fn commit(&self, state: &mut InboxState, items: Vec<InboxItem>) -> Result<(), IndexError> {
        index::save(&self.index_path, &items)?;
        state.items = items;
        Ok(())
    }

    /// Persists from a context that has no caller to report to.
    fn persist_or_warn(&self, state: &InboxState) {
        if let Err(e) = self.persist(state) {
            warn!(path = %self.index_path.display(), error = %e, "Failed to save inbox index");
        }
    }
}

/// The result of walking one staged folder.
struct ScanOutcome {
    track_count: usize,
    total_size: u64,
    tracks: Vec<InboxTrack>,
}

/// A folder scan running in the background.
pub struct ScanHandle {
    id: Uuid,
    thread: JoinHandle<()>,
}

impl ScanHandle {
    /// The id of the inbox item being scanned.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Blocks until the scan has finished and its results are recorded.
    pub fn wait(self) -> Uuid {
        if let Err(panic) = self.thread.join() {
            std::panic::resume_unwind(panic);
        }
        self.id
    }
}

pub struct InboxStore {
    shared: Arc<Shared>,
    importer: Arc<Importer>,
}

impl InboxStore {
    /// Opens the inbox backed by the index file at `index_path`.
    ///
    /// Items whose scan or import was interrupted by a previous shutdown are
    /// marked as failed, so they can be imported again.
    pub fn open(index_path: &Path, importer: Arc<Importer>) -> Result<Self, InboxError> {
        let mut items = index::load(index_path)?;

        let mut recovered = 0;
        for item in &mut items {
            if matches!(
                item.status,
                InboxStatus::Pending | InboxStatus::Scanning | InboxStatus::Importing
            ) {
                item.status = InboxStatus::Failed;
                recovered += 1;
            }
        }

        info!(items = items.len(), recovered, "Loaded inbox");

        let shared = Arc::new(Shared {
            index_path: index_path.to_path_buf(),
            state: Mutex::new(InboxState {
                items,
                tracks: HashMap::new(),
            }),
            notifier: Notifier::new(),
        });

        if recovered > 0 {
            shared.persist(&shared.lock())?;
        }

        Ok(Self { shared, importer })
    }

    pub fn subscribe(&self) -> Receiver<InboxChanged> {
        self.shared.notifier.subscribe()
    }

    /// Stages `path` and starts scanning it in the background.
    ///
    /// The item is created as pending and is recorded as scanning once its
    /// scan is about to start. When the scan completes it becomes ready if
    /// any audio files were found, failed otherwise.
    pub fn add_folder(&self, path: &Path) -> Result<ScanHandle, InboxError> {
        let mut item = InboxItem::new(path.to_path_buf());
        let id = item.id;
        item.status = InboxStatus::Scanning;

        {
            let mut state = self.shared.lock();
            let mut items = state.items.clone();
            items.push(item);
            self.shared.commit(&mut state, items)?;
        }

        info!(%id, path = %path.display(), "Added folder to inbox");
        self.shared.notifier.broadcast(InboxChanged);

        let shared = Arc::clone(&self.shared);
        let folder = path.to_path_buf();

        let thread = thread::spawn(move || {
            let outcome = scan_folder(&folder, id);

            let mut state = shared.lock();
            let Some(item) = state.item_mut(id) else {
                debug!(%id, "Inbox item removed while scanning");
                return;
            };

            match outcome {
                Ok(outcome) => {
                    item.track_count = Some(outcome.track_count);
                    item.total_size = Some(outcome.total_size);
                    item.status = if outcome.track_count > 0 {
                        InboxStatus::Ready
                    } else {
                        InboxStatus::Failed
                    };
                    info!(
                        %id,
                        tracks = outcome.track_count,
                        status = %item.status,
                        "Scanned inbox folder"
                    );
                    state.tracks.insert(id, outcome.tracks);
                }
                Err(e) => {
                    warn!(%id, error = %e, "Failed to scan inbox folder");
                    item.status = InboxStatus::Failed;
                }
            }

            shared.persist_or_warn(&state);
            drop(state);

            shared.notifier.broadcast(InboxChanged);
        });

        Ok(ScanHandle { id, thread })
    }

    /// Imports the item's folder into the catalog and removes it from the
    /// inbox, returning the number of tracks imported.
    ///
    /// Only ready or previously failed items can be imported. If the import
    /// fails the item is marked as failed and stays in the inbox. If another
    /// import is already running the item is left exactly as it was.
    pub fn import_item(
        &self,
        id: Uuid,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<usize, InboxError> {
        let (folder, previous) = {
            let mut state = self.shared.lock();
            let mut items = state.items.clone();
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(InboxError::NotFound(id))?;

            let previous = item.status;
            if !matches!(previous, InboxStatus::Ready | InboxStatus::Failed) {
                return Err(InboxError::NotReady {
                    id,
                    status: previous,
                });
            }

            item.status = InboxStatus::Importing;
            let folder = item.folder_path.clone();
            self.shared.commit(&mut state, items)?;

            (folder, previous)
        };

        self.shared.notifier.broadcast(InboxChanged);

        let result = self.importer.import_folder(&folder, progress, cancel);

        let mut state = self.shared.lock();
        match result {
            Ok(count) => {
                state.remove(id);
                info!(%id, count, "Imported inbox item");
            }
            Err(ImportError::ImportInProgress) => {
                if let Some(item) = state.item_mut(id) {
                    item.status = previous;
                }
            }
            Err(_) => {
                if let Some(item) = state.item_mut(id) {
                    item.status = InboxStatus::Failed;
                }
            }
        }

        self.shared.persist_or_warn(&state);
        drop(state);

        self.shared.notifier.broadcast(InboxChanged);

        result.map_err(|e| {
            warn!(%id, error = %e, "Failed to import inbox item");
            InboxError::from(e)
        })
    }

    /// Drops an item and its descriptors without touching the catalog.
    pub fn remove_item(&self, id: Uuid) -> Result<(), InboxError> {
        {
            let mut state = self.shared.lock();
            if !state.items.iter().any(|item| item.id == id) {
                return Err(InboxError::NotFound(id));
            }

            let items = state
                .items
                .iter()
                .filter(|item| item.id != id)
                .cloned()
                .collect();
            self.shared.commit(&mut state, items)?;
            state.tracks.remove(&id);
        }

        info!(%id, "Removed inbox item");
        self.shared.notifier.broadcast(InboxChanged);

        Ok(())
    }

    pub fn clear_all(&self) -> Result<(), InboxError> {
        {
            let mut state = self.shared.lock();
            self.shared.commit(&mut state, Vec::new())?;
            state.tracks.clear();
        }

        info!("Cleared inbox");
        self.shared.notifier.broadcast(InboxChanged);

        Ok(())
    }

    pub fn list_items(&self) -> Vec<InboxItem> {
        self.shared.lock().items.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<InboxItem> {
        self.shared
            .lock()
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Returns the staged descriptors for an item.
    ///
    /// Descriptors are not persisted, so a ready item loaded from the index
    /// is scanned again the first time its tracks are requested.
    pub fn tracks_for(&self, id: Uuid) -> Result<Vec<InboxTrack>, InboxError> {
        let folder = {
            let state = self.shared.lock();
            let item = state
                .items
                .iter()
                .find(|item| item.id == id)
                .ok_or(InboxError::NotFound(id))?;

            if let Some(tracks) = state.tracks.get(&id) {
                return Ok(tracks.clone());
            }
            if item.status != InboxStatus::Ready {
                return Ok(Vec::new());
            }

            item.folder_path.clone()
        };

        debug!(%id, "Rebuilding inbox descriptors");
        let tracks = scan_folder(&folder, id)
            .map(|outcome| outcome.tracks)
            .unwrap_or_else(|e| {
                warn!(%id, error = %e, "Failed to rescan inbox folder");
                Vec::new()
            });

        let mut state = self.shared.lock();
        if state.items.iter().any(|item| item.id == id) {
            state.tracks.insert(id, tracks.clone());
        }

        Ok(tracks)
    }
}

/// Counts, sizes and extracts every supported audio file in `folder`.
///
/// Files that cannot be extracted still count towards the track count and
/// size, they just have no descriptor.
fn scan_folder(folder: &Path, id: Uuid) -> Result<ScanOutcome, ImportError> {
    let files = import::discover(folder)?;

    let mut outcome = ScanOutcome {
        track_count: files.len(),
        total_size: files.iter().map(|f| f.size).sum(),
        tracks: Vec::with_capacity(files.len()),
    };

    for file in &files {
        match metadata::extract(&file.path) {
            Ok(descriptor) => outcome.tracks.push(InboxTrack {
                item_id: id,
                descriptor,
            }),
            Err(skip) => debug!(path = %file.path.display(), reason = %skip, "No descriptor"),
        }
    }

    Ok(outcome)
}
