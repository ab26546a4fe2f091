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

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use tempfile::{TempDir, tempdir};

use super::*;
use crate::test_support::write_wav;

#[derive(Debug)]
struct FakeStream {
    path: PathBuf,
    state: StreamState,
    position: f64,
    volume: f64,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    open: HashMap<StreamHandle, FakeStream>,
    /// Duration the decoder reports for every stream; `None` fails the probe.
    duration: Option<f64>,
    fail_open: bool,
    fail_position: bool,
    seeks: Vec<f64>,
}

/// A backend whose streams only advance when the test moves them.
#[derive(Clone, Default)]
struct FakeBackend(Arc<Mutex<FakeState>>);

impl FakeBackend {
    fn new(duration: f64) -> Self {
        let backend = Self::default();
        backend.state().duration = Some(duration);
        backend
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    fn with_stream<T>(
        &self,
        handle: StreamHandle,
        f: impl FnOnce(&mut FakeStream) -> T,
    ) -> Result<T, PlaybackError> {
        self.state()
            .open
            .get_mut(&handle)
            .map(f)
            .ok_or(PlaybackError::InvalidHandle)
    }

    fn open_paths(&self) -> Vec<PathBuf> {
        self.state().open.values().map(|s| s.path.clone()).collect()
    }

    fn advance(&self, seconds: f64) {
        for stream in self.state().open.values_mut() {
            stream.position += seconds;
        }
    }

    fn finish(&self) {
        for stream in self.state().open.values_mut() {
            stream.state = StreamState::Stopped;
        }
    }

    fn stream_volume(&self) -> Option<f64> {
        self.state().open.values().next().map(|s| s.volume)
    }
}

impl DecodeBackend for FakeBackend {
    fn open(&mut self, path: &Path) -> Result<StreamHandle, PlaybackError> {
        let mut state = self.state();
        if state.fail_open {
            return Err(PlaybackError::OpenFailed {
                path: path.to_path_buf(),
                reason: "unsupported".to_string(),
            });
        }
        state.next_id += 1;
        let handle = StreamHandle::new(state.next_id);
        state.open.insert(
            handle,
            FakeStream {
                path: path.to_path_buf(),
                state: StreamState::Paused,
                position: 0.0,
                volume: 1.0,
            },
        );
        Ok(handle)
    }

    fn duration(&mut self, handle: StreamHandle) -> Result<f64, PlaybackError> {
        self.with_stream(handle, |_| ())?;
        self.state()
            .duration
            .ok_or_else(|| PlaybackError::Backend("no duration".to_string()))
    }

    fn start(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.with_stream(handle, |s| s.state = StreamState::Playing)
    }

    fn pause(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.with_stream(handle, |s| s.state = StreamState::Paused)
    }

    fn resume(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.with_stream(handle, |s| s.state = StreamState::Playing)
    }

    fn seek(&mut self, handle: StreamHandle, seconds: f64) -> Result<(), PlaybackError> {
        self.with_stream(handle, |s| s.position = seconds)?;
        self.state().seeks.push(seconds);
        Ok(())
    }

    fn set_volume(&mut self, handle: StreamHandle, volume: f64) -> Result<(), PlaybackError> {
        self.with_stream(handle, |s| s.volume = volume)
    }

    fn position(&mut self, handle: StreamHandle) -> Result<f64, PlaybackError> {
        if self.state().fail_position {
            return Err(PlaybackError::Backend("position unavailable".to_string()));
        }
        self.with_stream(handle, |s| s.position)
    }

    fn stream_state(&mut self, handle: StreamHandle) -> Result<StreamState, PlaybackError> {
        self.with_stream(handle, |s| s.state)
    }

    fn release(&mut self, handle: StreamHandle) -> Result<(), PlaybackError> {
        self.state()
            .open
            .remove(&handle)
            .map(|_| ())
            .ok_or(PlaybackError::InvalidHandle)
    }
}

/// A ticker that only fires when the test says so.
#[derive(Clone, Default)]
struct ManualTicker(Arc<Mutex<Option<Tick>>>);

impl ManualTicker {
    fn is_running(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }

    fn fire(&self) {
        let tick = self.0.lock().unwrap().clone();
        if let Some(tick) = tick {
            tick();
        }
    }
}

impl Ticker for ManualTicker {
    fn start(&mut self, _interval: Duration, tick: Tick) {
        *self.0.lock().unwrap() = Some(tick);
    }

    fn stop(&mut self) {
        *self.0.lock().unwrap() = None;
    }
}

struct Fixture {
    dir: TempDir,
    backend: FakeBackend,
    ticker: ManualTicker,
    controller: PlaybackController<FakeBackend>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_backend(FakeBackend::new(240.0))
    }

    fn with_backend(backend: FakeBackend) -> Self {
        let ticker = ManualTicker::default();
        let controller = PlaybackController::new(
            backend.clone(),
            Box::new(ticker.clone()),
            DEFAULT_POLL_INTERVAL,
        );
        Self {
            dir: tempdir().unwrap(),
            backend,
            ticker,
            controller,
        }
    }

    fn track(&self, name: &str) -> TrackDescriptor {
        let path = self.dir.path().join(format!("{name}.wav"));
        write_wav(&path, 1);
        TrackDescriptor {
            title: name.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            album_artist: None,
            genre: None,
            year: None,
            track_number: None,
            disc_number: None,
            duration: 180.0,
            bitrate: None,
            sample_rate: None,
            format: "wav".to_string(),
            file_path: path.to_string_lossy().into_owned(),
            file_size: None,
            date_modified: None,
        }
    }
}

#[test]
fn play_opens_and_starts_the_track() {
    let f = Fixture::new();
    let track = f.track("a");

    f.controller.play(&track).unwrap();

    assert_eq!(f.controller.state(), TransportState::Playing);
    assert!(f.controller.is_playing());
    assert_eq!(f.controller.current_track(), Some(track));
    assert_eq!(f.controller.duration(), 240.0);
    assert_eq!(f.controller.current_time(), 0.0);
    assert!(f.ticker.is_running());
}

#[test]
fn playing_another_track_leaves_one_open_handle() {
    let f = Fixture::new();
    let a = f.track("a");
    let b = f.track("b");

    f.controller.play(&a).unwrap();
    f.controller.play(&b).unwrap();

    assert_eq!(f.backend.open_paths(), vec![PathBuf::from(&b.file_path)]);
    assert_eq!(f.controller.current_track(), Some(b));
}

#[test]
fn replacing_a_paused_track_releases_it() {
    let f = Fixture::new();
    f.controller.play(&f.track("a")).unwrap();
    f.controller.pause().unwrap();

    f.controller.play(&f.track("b")).unwrap();

    assert_eq!(f.backend.state().open.len(), 1);
}

#[test]
fn seek_clamps_to_track_length() {
    let f = Fixture::new();
    f.controller.play(&f.track("a")).unwrap();

    f.controller.seek(-5.0).unwrap();
    assert_eq!(f.controller.current_time(), 0.0);

    f.controller.seek(1000.0).unwrap();
    assert_eq!(f.controller.current_time(), 240.0);

    f.controller.seek(42.5).unwrap();
    assert_eq!(f.controller.current_time(), 42.5);

    assert_eq!(f.backend.state().seeks, vec![0.0, 240.0, 42.5]);
}

#[test]
fn seek_without_a_stream_fails() {
    let f = Fixture::new();

    assert!(matches!(
        f.controller.seek(10.0),
        Err(PlaybackError::NoActiveStream)
    ));
}

#[test]
fn pause_and_resume_are_noops_when_idle() {
    let f = Fixture::new();

    f.controller.pause().unwrap();
    f.controller.resume().unwrap();

    assert_eq!(f.controller.state(), TransportState::Idle);
    assert!(f.backend.state().open.is_empty());
    assert!(!f.ticker.is_running());
}

#[test]
fn pause_and_resume_toggle_the_stream() {
    let f = Fixture::new();
    f.controller.play(&f.track("a")).unwrap();

    f.controller.pause().unwrap();
    assert_eq!(f.controller.state(), TransportState::Paused);
    assert!(!f.ticker.is_running());

    f.controller.pause().unwrap();
    assert_eq!(f.controller.state(), TransportState::Paused);

    f.controller.resume().unwrap();
    assert_eq!(f.controller.state(), TransportState::Playing);
    assert!(f.ticker.is_running());
}

#[test]
fn poll_tracks_position() {
    let f = Fixture::new();
    f.controller.play(&f.track("a")).unwrap();

    f.backend.advance(1.5);
    f.ticker.fire();

    assert_eq!(f.controller.current_time(), 1.5);
}

#[test]
fn unreadable_position_keeps_the_last_one() {
    let f = Fixture::new();
    f.controller.play(&f.track("a")).unwrap();
    f.backend.advance(12.0);
    f.ticker.fire();

    f.backend.state().fail_position = true;
    f.backend.advance(1.0);
    f.ticker.fire();

    assert_eq!(f.controller.current_time(), 12.0);
    assert!(f.controller.is_playing());
}

#[test]
fn end_of_track_stops_and_keeps_volume() {
    let f = Fixture::new();
    let track = f.track("a");
    let events = f.controller.subscribe();
    f.controller.set_volume(0.4).unwrap();
    f.controller.play(&track).unwrap();

    f.backend.advance(240.0);
    f.backend.finish();
    f.ticker.fire();

    assert_eq!(f.controller.state(), TransportState::Idle);
    assert_eq!(f.controller.current_time(), 0.0);
    assert_eq!(f.controller.volume(), 0.4);
    assert_eq!(f.controller.current_track(), Some(track.clone()));
    assert!(f.backend.state().open.is_empty());
    assert!(!f.ticker.is_running());

    let events: Vec<_> = events.try_iter().collect();
    assert_eq!(
        events[events.len() - 2..],
        [
            PlaybackEvent::TrackFinished(track),
            PlaybackEvent::StateChanged(TransportState::Idle),
        ]
    );
}

#[test]
fn volume_is_clamped_and_applied_to_new_streams() {
    let f = Fixture::new();

    f.controller.set_volume(1.7).unwrap();
    assert_eq!(f.controller.volume(), 1.0);

    f.controller.set_volume(-0.2).unwrap();
    assert_eq!(f.controller.volume(), 0.0);

    f.controller.set_volume(0.25).unwrap();
    f.controller.play(&f.track("a")).unwrap();
    assert_eq!(f.backend.stream_volume(), Some(0.25));

    f.controller.set_volume(0.75).unwrap();
    assert_eq!(f.backend.stream_volume(), Some(0.75));
}

#[test]
fn missing_file_changes_nothing() {
    let f = Fixture::new();
    let a = f.track("a");
    f.controller.play(&a).unwrap();

    let mut missing = f.track("b");
    missing.file_path = f.dir.path().join("gone.flac").to_string_lossy().into_owned();

    assert!(matches!(
        f.controller.play(&missing),
        Err(PlaybackError::FileNotFound(_))
    ));
    assert_eq!(f.controller.state(), TransportState::Playing);
    assert_eq!(f.controller.current_track(), Some(a));
}

#[test]
fn open_failure_leaves_controller_idle() {
    let f = Fixture::new();
    let a = f.track("a");
    f.controller.play(&a).unwrap();
    f.backend.state().fail_open = true;

    let result = f.controller.play(&f.track("b"));

    assert!(matches!(result, Err(PlaybackError::OpenFailed { .. })));
    assert_eq!(f.controller.state(), TransportState::Idle);
    assert_eq!(f.controller.current_track(), Some(a));
    assert!(f.backend.state().open.is_empty());
}

#[test]
fn failed_probe_falls_back_to_catalog_duration() {
    let backend = FakeBackend::default();
    let f = Fixture::with_backend(backend);

    f.controller.play(&f.track("a")).unwrap();

    assert_eq!(f.controller.duration(), 180.0);
}

#[test]
fn stop_rewinds_and_releases() {
    let f = Fixture::new();
    let track = f.track("a");
    f.controller.play(&track).unwrap();
    f.controller.seek(30.0).unwrap();

    f.controller.stop();

    assert_eq!(f.controller.state(), TransportState::Idle);
    assert_eq!(f.controller.current_time(), 0.0);
    assert_eq!(f.controller.current_track(), Some(track));
    assert!(f.backend.state().open.is_empty());
    assert!(matches!(
        f.controller.seek(5.0),
        Err(PlaybackError::NoActiveStream)
    ));
}

#[test]
fn dropping_the_controller_releases_the_stream() {
    let f = Fixture::new();
    f.controller.play(&f.track("a")).unwrap();
    let backend = f.backend.clone();

    drop(f);

    assert!(backend.state().open.is_empty());
}

#[test]
fn subscribers_see_transitions() {
    let f = Fixture::new();
    let events = f.controller.subscribe();
    let track = f.track("a");

    f.controller.play(&track).unwrap();
    f.controller.pause().unwrap();
    f.controller.stop();

    let events: Vec<_> = events.try_iter().collect();
    assert_eq!(
        events,
        vec![
            PlaybackEvent::StateChanged(TransportState::Loading),
            PlaybackEvent::TrackChanged(track),
            PlaybackEvent::StateChanged(TransportState::Playing),
            PlaybackEvent::StateChanged(TransportState::Paused),
            PlaybackEvent::StateChanged(TransportState::Idle),
        ]
    );
}
