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

//! In-process mutual exclusion between syncs of the same station cache.
//!
//! Overlapping syncs into one cache directory would race on the retention
//! sweep, so the second caller is turned away instead of queued. The
//! scheduler will come back on its next tick anyway. Entries are keyed by
//! the canonical cache directory, so the same station mirrored under two
//! different base directories never contends, while two spellings of one
//! directory do.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::warn;

use crate::cache::CacheDirectory;
use crate::error::SyncError;

lazy_static! {
    static ref IN_FLIGHT: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Marks a station cache directory as busy until dropped.
#[derive(Debug)]
pub struct StationGuard {
    key: PathBuf,
}

/// Registry key for `cache`. Falls back to the path as given when it cannot
/// be resolved, e.g. before the directory exists.
fn registry_key(cache: &CacheDirectory) -> PathBuf {
    fs::canonicalize(cache.path()).unwrap_or_else(|_| cache.path().to_path_buf())
}

impl StationGuard {
    /// Claim `cache`, failing with [`SyncError::InProgress`] if another
    /// sync already holds it.
    pub fn acquire(cache: &CacheDirectory) -> Result<Self, SyncError> {
        let key = registry_key(cache);
        let mut in_flight = IN_FLIGHT
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !in_flight.insert(key.clone()) {
            warn!(
                "[{}] Sync already in progress in {}, skipping",
                cache.station().code(),
                key.display()
            );
            return Err(SyncError::InProgress {
                station: cache.station().code(),
            });
        }

        Ok(Self { key })
    }

    /// Whether a sync currently holds `cache`.
    #[must_use]
    pub fn is_held(cache: &CacheDirectory) -> bool {
        IN_FLIGHT
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&registry_key(cache))
    }
}

impl Drop for StationGuard {
    fn drop(&mut self) {
        IN_FLIGHT
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&self.key);
    }
}
