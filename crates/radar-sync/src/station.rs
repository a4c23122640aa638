// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Radar station identity and the file naming scheme derived from it.
//!
//! Every file the engine touches is named from the station id: the four
//! static layers (`IDR663.background.png`, ...) and the timestamped
//! snapshots (`IDR663.T.202401011230.png`). All parsing of snapshot
//! timestamps goes through [`StationId::snapshot_timestamp`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::SyncError;

/// Prefix shared by every station code on the archive.
pub const STATION_PREFIX: &str = "IDR";

/// Layout of the timestamp embedded in snapshot file names (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

const TIMESTAMP_LEN: usize = 12;

/// One of the four overlay layers published for every station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticAsset {
    Background,
    Locations,
    Range,
    Topography,
}

impl StaticAsset {
    /// All layers, in the order they are fetched.
    pub const ALL: [Self; 4] = [
        Self::Background,
        Self::Locations,
        Self::Range,
        Self::Topography,
    ];

    /// Layer name as it appears in the file name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Locations => "locations",
            Self::Range => "range",
            Self::Topography => "topography",
        }
    }
}

impl fmt::Display for StaticAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated radar station code, e.g. `663` for Brisbane (Marburg).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(String);

impl StationId {
    /// Validate a station code.
    ///
    /// The code ends up in local file names and remote paths, so only ASCII
    /// alphanumerics are accepted.
    pub fn new(id: impl Into<String>) -> Result<Self, SyncError> {
        let id = id.into();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SyncError::InvalidStation(id));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full station code, e.g. `IDR663`. Also the cache directory name.
    #[must_use]
    pub fn code(&self) -> String {
        format!("{STATION_PREFIX}{}", self.0)
    }

    /// Marker that identifies this station's snapshots, e.g. `IDR663.T`.
    #[must_use]
    pub fn snapshot_marker(&self) -> String {
        format!("{STATION_PREFIX}{}.T", self.0)
    }

    /// File name of a static layer, e.g. `IDR663.range.png`.
    #[must_use]
    pub fn static_file_name(&self, asset: StaticAsset) -> String {
        format!("{STATION_PREFIX}{}.{}.png", self.0, asset.as_str())
    }

    /// File name of a snapshot taken at `timestamp`.
    #[must_use]
    pub fn snapshot_file_name(&self, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}.{}.png",
            self.snapshot_marker(),
            timestamp.format(TIMESTAMP_FORMAT)
        )
    }

    /// Whether a local file name belongs to this station's snapshot set.
    #[must_use]
    pub fn is_snapshot_name(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.snapshot_marker())
    }

    /// Whether a remote path refers to one of this station's snapshots.
    #[must_use]
    pub fn matches_remote_snapshot(&self, remote_path: &str) -> bool {
        remote_path.contains(&self.snapshot_marker())
    }

    /// Parse the capture time out of a snapshot file name.
    ///
    /// Accepts both `IDR663.T.202401011230.png` and `IDR663.T202401011230.png`.
    pub fn snapshot_timestamp(&self, file_name: &str) -> Result<DateTime<Utc>, SyncError> {
        let malformed = || SyncError::MalformedLocalState {
            file: file_name.to_string(),
        };

        let rest = file_name
            .strip_prefix(&self.snapshot_marker())
            .ok_or_else(malformed)?;
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        let digits = rest.get(..TIMESTAMP_LEN).ok_or_else(malformed)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        NaiveDateTime::parse_from_str(digits, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_parse| malformed())
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StationId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
