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

//! Retention sweep for cached snapshots.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::cache::CacheDirectory;
use crate::error::SyncError;
use crate::station::StationId;

/// Whole hours elapsed between a capture time and `now`.
///
/// Negative when the capture time lies in the future (clock skew).
#[must_use]
pub fn elapsed_hours(captured: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - captured).num_hours()
}

/// Delete this station's snapshots older than `retention_hours`.
///
/// A window of `0` keeps everything. Every snapshot name is parsed before
/// anything is deleted, so a malformed name aborts the sweep without
/// removing files. Returns the names that were deleted.
pub fn sweep_expired(
    cache: &CacheDirectory,
    station: &StationId,
    retention_hours: u32,
    now: DateTime<Utc>,
) -> Result<Vec<String>, SyncError> {
    if retention_hours == 0 {
        debug!("[{}] Retention disabled, keeping all snapshots", station.code());
        return Ok(Vec::new());
    }

    let mut expired = Vec::new();
    for name in cache.snapshot_names()? {
        let captured = station.snapshot_timestamp(&name)?;
        if elapsed_hours(captured, now) > i64::from(retention_hours) {
            expired.push(name);
        }
    }

    for name in &expired {
        cache.remove(name)?;
        debug!("[{}] Removed expired snapshot {}", station.code(), name);
    }

    if !expired.is_empty() {
        info!(
            "[{}] Removed {} snapshot(s) older than {} hour(s)",
            station.code(),
            expired.len(),
            retention_hours
        );
    }

    Ok(expired)
}
