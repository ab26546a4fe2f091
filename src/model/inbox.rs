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

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::TrackDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboxStatus {
    Pending,
    Scanning,
    Ready,
    Importing,
    Failed,
}

impl fmt::Display for InboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InboxStatus::Pending => "Pending",
            InboxStatus::Scanning => "Scanning",
            InboxStatus::Ready => "Ready",
            InboxStatus::Importing => "Importing",
            InboxStatus::Failed => "Failed",
        };
        f.pad(name)
    }
}

/// A folder staged for import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    pub id: Uuid,
    pub folder_path: PathBuf,
    pub folder_name: String,
    pub date_added: DateTime<Utc>,
    pub status: InboxStatus,
    pub track_count: Option<usize>,
    pub total_size: Option<u64>,
}

impl InboxItem {
    pub fn new(folder_path: PathBuf) -> Self {
        let folder_name = folder_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder_path.to_string_lossy().into_owned());

        Self {
            id: Uuid::new_v4(),
            folder_path,
            folder_name,
            date_added: Utc::now(),
            status: InboxStatus::Pending,
            track_count: None,
            total_size: None,
        }
    }
}

/// A scanned, not yet committed, track belonging to an [`InboxItem`].
#[derive(Debug, Clone, PartialEq)]
pub struct InboxTrack {
    pub item_id: Uuid,
    pub descriptor: TrackDescriptor,
}
