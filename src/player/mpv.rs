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

//! MPV-backed decode backend.
//!
//! `libmpv` handles are bound to the thread that created them, so the
//! [`MpvBackend`] owns a background worker thread that builds the handler and
//! executes every backend call. Calls are sent over a command channel, each
//! carrying its own reply channel, and the caller blocks until the worker
//! answers.
//!
//! MPV keeps a single playlist entry loaded at a time. The worker tracks the
//! handle of the file currently loaded and rejects calls for any other.

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, error, warn};

use crate::player::{
    PlaybackError,
    backend::{DecodeBackend, StreamHandle, StreamState},
};

/// How long `open` waits for MPV to load a file.
const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum Command {
    Open(PathBuf),
    Duration,
    Start,
    Pause,
    Resume,
    Seek(f64),
    SetVolume(f64),
    Position,
    State,
    Release,
}

#[derive(Debug)]
enum Reply {
    Opened(StreamHandle),
    Seconds(f64),
    State(StreamState),
    Done,
}

struct Request {
    handle: Option<StreamHandle>,
    command: Command,
    reply: Sender<Result<Reply, PlaybackError>>,
}

pub struct MpvBackend {
    request_tx: Sender<Request>,
}

impl MpvBackend {
    /// Spawns the worker thread and waits for MPV to initialise.
    pub fn spawn() -> Result<Self, PlaybackError> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel();

        thread::spawn(move || {
            let handler = match build_handler() {
                Ok(handler) => handler,
                Err(e) => {
                    error!(error = %e, "Failed to initialise MPV");
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            Worker {
                handler,
                current: None,
                next_id: 1,
            }
            .run(request_rx);

            debug!("MPV worker exiting");
        });

        ready_rx.recv().map_err(|_| PlaybackError::WorkerGone)??;

        Ok(Self { request_tx })
    }

    fn call(
        &self,
        handle: Option<StreamHandle>,
        command: Command,
    ) -> Result<Reply, PlaybackError> {
        let (reply, reply_rx) = mpsc::channel();
        self.request_tx
            .send(Request {
                handle,
                command,
                reply,
            })
            .map_err(|_| PlaybackError::WorkerGone)?;
        reply_rx.recv().map_err(|_| PlaybackError::WorkerGone)?
    }

    fn call_done(&self, handle: StreamHandle, command: Command) -> Result<(), PlaybackError> {
        self.call(Some(handle), command).map(|_| ())
    }

    fn call_seconds(&self, handle: StreamHandle, command: Command) -> Result<f64, PlaybackError> {
        match self.call(Some(handle), command)? {
            Reply::Seconds(seconds) => Ok(seconds),
            other => Err(unexpected(other)),
        }
    }
}

impl DecodeBackend for MpvBackend {
    fn open(&mut self, path: &Path) -> Result<StreamHandle, PlaybackError> {
        match self.call(None, Command::Open(path.to_path_buf()))? {
            Reply::Opened(handle) => Ok(handle),
            other => Err(unexpected(other)),
        }
    }

    fn duration(&mut self, handle: StreamHandle) -> Result<f64, PlaybackError> {
        self.call_seconds(handle, Command::Duration)
    }

    fn start(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.call_done(handle, Command::Start)
    }

    fn pause(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.call_done(handle, Command::Pause)
    }

    fn resume(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.call_done(handle, Command::Resume)
    }

    fn seek(&mut self, handle: StreamHandle, seconds: f64) -> Result<(), PlaybackError> {
        self.call_done(handle, Command::Seek(seconds))
    }

    fn set_volume(&mut self, handle: StreamHandle, volume: f64) -> Result<(), PlaybackError> {
        self.call_done(handle, Command::SetVolume(volume))
    }

    fn position(&mut self, handle: StreamHandle) -> Result<f64, PlaybackError> {
        self.call_seconds(handle, Command::Position)
    }

    fn stream_state(&mut self, handle: StreamHandle) -> Result<StreamState, PlaybackError> {
        match self.call(Some(handle), Command::State)? {
            Reply::State(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    fn release(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.call_done(handle, Command::Release)
    }
}

fn unexpected(reply: Reply) -> PlaybackError {
    PlaybackError::Backend(format!("unexpected reply from MPV worker: {reply:?}"))
}

fn backend_error(action: &str, e: mpv::Error) -> PlaybackError {
    PlaybackError::Backend(format!("{action}: {e:?}"))
}

fn build_handler() -> Result<mpv::MpvHandler, PlaybackError> {
    let mut builder = mpv::MpvHandlerBuilder::new()
        .map_err(|e| backend_error("Failed to create MPV builder", e))?;
    builder
        .set_option("vo", "null")
        .map_err(|e| backend_error("Failed to set no video output", e))?;
    builder
        .build()
        .map_err(|e| backend_error("Failed to build MPV handler", e))
}

/// The MPV events that matter while waiting for a file to load.
#[derive(Debug, Clone, PartialEq)]
enum LoadEvent {
    Started,
    Loaded,
    Ended(String),
}

/// Tracks a `loadfile` until the new file has loaded or been rejected.
///
/// Stopping the previous file queues its `end-file` event asynchronously, so
/// an end-file seen before the new file's `start-file` belongs to the old
/// file and is ignored.
#[derive(Debug, Default)]
struct LoadWait {
    started: bool,
}

impl LoadWait {
    fn on_event(&mut self, event: LoadEvent) -> Option<Result<(), String>> {
        match event {
            LoadEvent::Started => {
                self.started = true;
                None
            }
            LoadEvent::Loaded => Some(Ok(())),
            LoadEvent::Ended(reason) if self.started => Some(Err(reason)),
            LoadEvent::Ended(_) => None,
        }
    }
}

/// Executes requests on the thread that owns the MPV handler.
struct Worker {
    handler: mpv::MpvHandler,
    current: Option<StreamHandle>,
    next_id: u64,
}

impl Worker {
    fn run(mut self, request_rx: Receiver<Request>) {
        // Ends when the backend, and with it every sender, is dropped
        while let Ok(request) = request_rx.recv() {
            let result = self.execute(request.handle, request.command);
            if let Err(e) = &result {
                warn!(error = %e, "MPV request failed");
            }
            let _ = request.reply.send(result);
        }

        if self.current.take().is_some() {
            let _ = self.handler.command(&["stop"]);
        }
    }

    fn execute(
        &mut self,
        handle: Option<StreamHandle>,
        command: Command,
    ) -> Result<Reply, PlaybackError> {
        if let Command::Open(path) = command {
            return self.open(&path).map(Reply::Opened);
        }

        if handle.is_none() || handle != self.current {
            return Err(PlaybackError::InvalidHandle);
        }

        match command {
            Command::Open(_) => Err(PlaybackError::InvalidHandle),
            Command::Duration => self
                .handler
                .get_property::<f64>("duration")
                .map(Reply::Seconds)
                .map_err(|e| backend_error("Failed to read duration", e)),
            Command::Start | Command::Resume => self
                .handler
                .set_property("pause", false)
                .map(|_| Reply::Done)
                .map_err(|e| backend_error("Failed to unpause", e)),
            Command::Pause => self
                .handler
                .set_property("pause", true)
                .map(|_| Reply::Done)
                .map_err(|e| backend_error("Failed to pause", e)),
            Command::Seek(seconds) => self
                .handler
                .command(&["seek", &seconds.to_string(), "absolute"])
                .map(|_| Reply::Done)
                .map_err(|e| backend_error("Failed to seek", e)),
            Command::SetVolume(volume) => self
                .handler
                .set_property("volume", volume * 100.0)
                .map(|_| Reply::Done)
                .map_err(|e| backend_error("Failed to set volume", e)),
            Command::Position => self
                .handler
                .get_property::<f64>("time-pos")
                .map(Reply::Seconds)
                .map_err(|e| backend_error("Failed to read position", e)),
            Command::State => self.state().map(Reply::State),
            Command::Release => {
                self.current = None;
                self.handler
                    .command(&["stop"])
                    .map(|_| Reply::Done)
                    .map_err(|e| backend_error("Failed to stop", e))
            }
        }
    }

    /// Loads `path` paused and waits until MPV has either loaded or rejected it.
    fn open(&mut self, path: &Path) -> Result<StreamHandle, PlaybackError> {
        let open_failed = |reason: String| PlaybackError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        let file_name = path
            .to_str()
            .ok_or_else(|| open_failed("path is not valid UTF-8".to_string()))?;

        self.current = None;

        // Discard events left over from the previous file
        while self.handler.wait_event(0.0).is_some() {}

        self.handler
            .set_property("pause", true)
            .map_err(|e| backend_error("Failed to pause", e))?;
        self.handler
            .command(&["loadfile", file_name, "replace"])
            .map_err(|e| open_failed(format!("{e:?}")))?;

        let deadline = Instant::now() + LOAD_TIMEOUT;
        let mut wait = LoadWait::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(open_failed("timed out waiting for MPV".to_string()));
            }

            let event = match self.handler.wait_event(remaining.as_secs_f64()) {
                Some(mpv::Event::StartFile) => LoadEvent::Started,
                Some(mpv::Event::FileLoaded) => LoadEvent::Loaded,
                Some(mpv::Event::EndFile(reason)) => LoadEvent::Ended(format!("{reason:?}")),
                _ => continue,
            };

            match wait.on_event(event) {
                Some(Ok(())) => break,
                Some(Err(reason)) => return Err(open_failed(reason)),
                None => {}
            }
        }

        let handle = StreamHandle::new(self.next_id);
        self.next_id += 1;
        self.current = Some(handle);

        debug!(handle = handle.id(), path = %path.display(), "Loaded file");

        Ok(handle)
    }

    // An idle player has nothing loaded, whatever the pause flag says.
    fn state(&mut self) -> Result<StreamState, PlaybackError> {
        let idle = self
            .handler
            .get_property::<bool>("idle-active")
            .map_err(|e| backend_error("Failed to read idle state", e))?;
        if idle {
            return Ok(StreamState::Stopped);
        }

        let paused = self
            .handler
            .get_property::<bool>("pause")
            .map_err(|e| backend_error("Failed to read pause state", e))?;

        Ok(if paused {
            StreamState::Paused
        } else {
            StreamState::Playing
        })
    }
}
