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

//! Single-stream playback control and state management.
//!
//! The [`PlaybackController`] owns the one active playback session: the track
//! being played, its transport state and position, and the decode stream
//! handle. Actual decoding is delegated to a [`DecodeBackend`], normally the
//! MPV worker in [`mpv`].
//!
//! While playing, a [`Ticker`] polls the backend for the stream position. The
//! backend reporting the stream as stopped during playback is how the natural
//! end of a track is detected.

mod backend;
mod mpv;
#[cfg(test)]
mod tests;
mod ticker;

pub use backend::{DecodeBackend, StreamHandle, StreamState};
pub use mpv::MpvBackend;
pub use ticker::{ThreadTicker, Tick, Ticker};

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, mpsc::Receiver},
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{model::TrackDescriptor, notify::Notifier};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to open {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("no active stream")]
    NoActiveStream,

    #[error("stream handle is no longer valid")]
    InvalidHandle,

    #[error("playback backend error: {0}")]
    Backend(String),

    #[error("playback worker has stopped")]
    WorkerGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Loading,
    Playing,
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Idle => "Idle",
            TransportState::Loading => "Loading",
            TransportState::Playing => "Playing",
            TransportState::Paused => "Paused",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged(TransportState),
    TrackChanged(TrackDescriptor),
    /// The current track played through to its end.
    TrackFinished(TrackDescriptor),
}

struct Session<B> {
    backend: B,
    track: Option<TrackDescriptor>,
    state: TransportState,
    handle: Option<StreamHandle>,
    position: f64,
    duration: f64,
    volume: f64,
}

impl<B: DecodeBackend> Session<B> {
    fn active_handle(&self) -> Result<StreamHandle, PlaybackError> {
        self.handle.ok_or(PlaybackError::NoActiveStream)
    }

    /// Moves the session to `state`, returning the event to broadcast once
    /// the session lock has been released.
    fn transition(&mut self, state: TransportState) -> Option<PlaybackEvent> {
        if self.state == state {
            return None;
        }
        debug!(from = %self.state, to = %state, "Transport state changed");
        self.state = state;
        Some(PlaybackEvent::StateChanged(state))
    }

    /// Releases the current handle, if any, and rewinds to the start.
    ///
    /// The session is left idle even if the backend fails to release.
    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.backend.release(handle) {
                warn!(handle = handle.id(), error = %e, "Failed to release stream");
            }
        }
        self.position = 0.0;
    }
}

struct Shared<B> {
    session: Mutex<Session<B>>,
    ticker: Mutex<Box<dyn Ticker>>,
    notifier: Notifier<PlaybackEvent>,
    poll_interval: Duration,
}

impl<B: DecodeBackend + 'static> Shared<B> {
    fn session(&self) -> MutexGuard<'_, Session<B>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticker(&self) -> MutexGuard<'_, Box<dyn Ticker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_polling(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.ticker().start(
            self.poll_interval,
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.poll();
                }
            }),
        );
    }

    fn stop_polling(&self) {
        self.ticker().stop();
    }

    fn broadcast(&self, events: impl IntoIterator<Item = Option<PlaybackEvent>>) {
        for event in events.into_iter().flatten() {
            self.notifier.broadcast(event);
        }
    }

    fn poll(&self) {
        let mut session = self.session();
        if session.state != TransportState::Playing {
            return;
        }
        let Some(handle) = session.handle else {
            return;
        };

        match session.backend.position(handle) {
            Ok(position) => session.position = position.clamp(0.0, session.duration),
            Err(e) => warn!(error = %e, "Failed to read playback position"),
        }

        match session.backend.stream_state(handle) {
            Ok(StreamState::Stopped) => {
                info!("Track finished");
                self.stop_polling();
                session.release();
                let finished = session.track.clone().map(PlaybackEvent::TrackFinished);
                let changed = session.transition(TransportState::Idle);
                drop(session);

                self.broadcast([finished, changed]);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read stream state"),
        }
    }
}

/// Controls playback of one track at a time.
///
/// All methods take `&self`; the session is guarded by a mutex shared with
/// the position poll, so the controller can be used from any thread.
pub struct PlaybackController<B: DecodeBackend + 'static> {
    shared: Arc<Shared<B>>,
}

impl PlaybackController<MpvBackend> {
    /// Creates a controller playing through MPV, polling on a thread.
    pub fn with_mpv(poll_interval: Duration, volume: f64) -> Result<Self, PlaybackError> {
        let controller = Self::new(
            MpvBackend::spawn()?,
            Box::new(ThreadTicker::new()),
            poll_interval,
        );
        controller.set_volume(volume)?;
        Ok(controller)
    }
}

impl<B: DecodeBackend + 'static> PlaybackController<B> {
    pub fn new(backend: B, ticker: Box<dyn Ticker>, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session {
                    backend,
                    track: None,
                    state: TransportState::Idle,
                    handle: None,
                    position: 0.0,
                    duration: 0.0,
                    volume: 1.0,
                }),
                ticker: Mutex::new(ticker),
                notifier: Notifier::new(),
                poll_interval,
            }),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.shared.notifier.subscribe()
    }

    /// Starts playing `track` from the beginning, replacing whatever was
    /// playing.
    ///
    /// The previous stream is released before the new one is opened. If the
    /// file does not exist nothing changes; if it cannot be opened the
    /// controller is left idle with the previous track still current.
    pub fn play(&self, track: &TrackDescriptor) -> Result<(), PlaybackError> {
        let path = Path::new(&track.file_path);
        if !path.is_file() {
            warn!(path = %path.display(), "Cannot play missing file");
            return Err(PlaybackError::FileNotFound(path.to_path_buf()));
        }

        let mut session = self.shared.session();

        self.shared.stop_polling();
        session.release();
        let loading = session.transition(TransportState::Loading);

        let handle = match session.backend.open(path) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open track");
                let idle = session.transition(TransportState::Idle);
                drop(session);
                self.shared.broadcast([loading, idle]);
                return Err(e);
            }
        };
        session.handle = Some(handle);

        let duration = match session.backend.duration(handle) {
            Ok(duration) if duration.is_finite() && duration > 0.0 => duration,
            Ok(_) | Err(_) => {
                debug!(path = %path.display(), "No probed duration, using catalog duration");
                track.duration.max(0.0)
            }
        };

        let volume = session.volume;
        let started = session
            .backend
            .set_volume(handle, volume)
            .and_then(|_| session.backend.start(handle));
        if let Err(e) = started {
            warn!(path = %path.display(), error = %e, "Failed to start track");
            session.release();
            let idle = session.transition(TransportState::Idle);
            drop(session);
            self.shared.broadcast([loading, idle]);
            return Err(e);
        }

        session.track = Some(track.clone());
        session.duration = duration;
        session.position = 0.0;
        let playing = session.transition(TransportState::Playing);
        self.shared.start_polling();
        drop(session);

        info!(title = %track.title, artist = %track.artist, "Playing");
        self.shared.broadcast([
            loading,
            Some(PlaybackEvent::TrackChanged(track.clone())),
            playing,
        ]);

        Ok(())
    }

    /// Pauses playback. Does nothing unless playing.
    pub fn pause(&self) -> Result<(), PlaybackError> {
        let mut session = self.shared.session();
        if session.state != TransportState::Playing {
            return Ok(());
        }

        let handle = session.active_handle()?;
        session.backend.pause(handle)?;
        self.shared.stop_polling();
        let paused = session.transition(TransportState::Paused);
        drop(session);

        self.shared.broadcast([paused]);
        Ok(())
    }

    /// Resumes a paused track. Does nothing unless paused.
    pub fn resume(&self) -> Result<(), PlaybackError> {
        let mut session = self.shared.session();
        if session.state != TransportState::Paused {
            return Ok(());
        }
        let Some(handle) = session.handle else {
            return Ok(());
        };

        session.backend.resume(handle)?;
        let playing = session.transition(TransportState::Playing);
        self.shared.start_polling();
        drop(session);

        self.shared.broadcast([playing]);
        Ok(())
    }

    /// Stops playback and releases the stream. The current track and volume
    /// are kept.
    pub fn stop(&self) {
        let mut session = self.shared.session();
        if session.state == TransportState::Idle && session.handle.is_none() {
            return;
        }

        self.shared.stop_polling();
        session.release();
        let idle = session.transition(TransportState::Idle);
        drop(session);

        info!("Stopped");
        self.shared.broadcast([idle]);
    }

    /// Moves to `seconds` into the track, clamped to the track length.
    pub fn seek(&self, seconds: f64) -> Result<(), PlaybackError> {
        let mut session = self.shared.session();
        let handle = session.active_handle()?;

        let target = if seconds.is_finite() {
            seconds.clamp(0.0, session.duration)
        } else {
            0.0
        };

        session.backend.seek(handle, target)?;
        session.position = target;

        debug!(position = target, "Seeked");
        Ok(())
    }

    /// Sets the volume, clamped to `0.0..=1.0`.
    ///
    /// The volume is remembered for later tracks whether or not a stream is
    /// open.
    pub fn set_volume(&self, volume: f64) -> Result<(), PlaybackError> {
        let mut session = self.shared.session();
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        session.volume = volume;

        match session.handle {
            Some(handle) => session.backend.set_volume(handle, volume),
            None => Ok(()),
        }
    }

    /// Reads the position and detects the end of the track.
    ///
    /// Called by the ticker while playing; calling it directly is harmless.
    pub fn poll(&self) {
        self.shared.poll();
    }

    pub fn state(&self) -> TransportState {
        self.shared.session().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn current_track(&self) -> Option<TrackDescriptor> {
        self.shared.session().track.clone()
    }

    pub fn current_time(&self) -> f64 {
        self.shared.session().position
    }

    pub fn duration(&self) -> f64 {
        self.shared.session().duration
    }

    pub fn volume(&self) -> f64 {
        self.shared.session().volume
    }
}

impl<B: DecodeBackend + 'static> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        self.shared.stop_polling();
        self.shared.session().release();
    }
}
