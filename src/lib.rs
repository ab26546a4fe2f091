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

//! musiq: a personal media library import and playback engine.
//!
//! Folders of audio files are either imported straight into the SQLite
//! [`db::Catalog`] by the [`import::Importer`], or staged first in the
//! [`inbox::InboxStore`] for review. The [`player::PlaybackController`]
//! plays one track at a time through a pluggable decode backend.
//!
//! Services are constructed explicitly and shared with `Arc`; they report
//! changes to subscribers over `mpsc` channels.

pub mod config;
pub mod db;
pub mod import;
pub mod inbox;
pub mod metadata;
pub mod model;
pub mod notify;
pub mod player;
pub mod util;

#[cfg(test)]
mod test_support;
