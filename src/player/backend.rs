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

use std::path::Path;

use crate::player::PlaybackError;

/// Opaque identifier of one open decode stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// What the backend reports for an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Playing,
    Paused,
    /// The stream reached its end or was never started.
    Stopped,
}

/// A decoder and audio output able to play one stream at a time.
///
/// Every call except [`open`](DecodeBackend::open) takes the handle returned
/// by `open`; a handle that has been released, or superseded by a later
/// `open`, is rejected with [`PlaybackError::InvalidHandle`].
pub trait DecodeBackend: Send {
    /// Opens `path` for playback without starting it.
    fn open(&mut self, path: &Path) -> Result<StreamHandle, PlaybackError>;

    /// The length of the stream in seconds, as probed by the decoder.
    fn duration(&mut self, handle: StreamHandle) -> Result<f64, PlaybackError>;

    fn start(&mut self, handle: StreamHandle) -> Result<(), PlaybackError>;

    fn pause(&mut self, handle: StreamHandle) -> Result<(), PlaybackError>;

    fn resume(&mut self, handle: StreamHandle) -> Result<(), PlaybackError>;

    fn seek(&mut self, handle: StreamHandle, seconds: f64) -> Result<(), PlaybackError>;

    /// Sets the output volume, from 0.0 to 1.0.
    fn set_volume(&mut self, handle: StreamHandle, volume: f64) -> Result<(), PlaybackError>;

    fn position(&mut self, handle: StreamHandle) -> Result<f64, PlaybackError>;

    fn stream_state(&mut self, handle: StreamHandle) -> Result<StreamState, PlaybackError>;

    /// Stops the stream and frees its resources.
    fn release(&mut self, handle: StreamHandle) -> Result<(), PlaybackError>;
}
