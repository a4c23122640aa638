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

//! The sync engine: incremental download followed by a retention sweep.
//!
//! One call to [`SyncEngine::sync`] runs three stages over a single archive
//! session:
//!
//! 1. **Static layers**: fetch any of the four overlay images not yet
//!    cached. A layer missing on the archive aborts the whole sync.
//! 2. **Snapshots**: list the shared snapshot directory and fetch every
//!    file for this station that is not yet cached.
//! 3. **Retention**: delete cached snapshots older than the window.
//!
//! Presence in the cache is the only download criterion, so repeated calls
//! without new remote data do nothing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::archive::{
    join_remote, Archive, ArchiveSession, FtpArchive, RemoteConfig, RemoteFile, SNAPSHOT_DIR,
    TRANSPARENCIES_DIR,
};
use crate::cache::CacheDirectory;
use crate::error::SyncError;
use crate::guard::StationGuard;
use crate::retention::sweep_expired;
use crate::station::{StaticAsset, StationId};

/// Retention window applied when the caller does not choose one.
pub const DEFAULT_RETENTION_HOURS: u32 = 2;

/// What a sync changed in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Station code, e.g. `IDR663`.
    pub station: String,
    pub cache_dir: PathBuf,
    pub static_downloaded: Vec<String>,
    pub snapshots_downloaded: Vec<String>,
    pub snapshots_removed: Vec<String>,
}

impl SyncReport {
    /// True when the sync neither downloaded nor deleted anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.static_downloaded.is_empty()
            && self.snapshots_downloaded.is_empty()
            && self.snapshots_removed.is_empty()
    }
}

/// Keeps one station's cache directory in step with the archive.
#[derive(Debug, Clone)]
pub struct SyncEngine<A = FtpArchive> {
    station: StationId,
    archive: A,
}

impl SyncEngine<FtpArchive> {
    /// Engine backed by the anonymous FTP archive described by `config`.
    #[must_use]
    pub fn new(station: StationId, config: RemoteConfig) -> Self {
        Self::with_archive(station, FtpArchive::new(config))
    }
}

impl<A: Archive> SyncEngine<A> {
    #[must_use]
    pub fn with_archive(station: StationId, archive: A) -> Self {
        Self { station, archive }
    }

    #[must_use]
    pub fn station(&self) -> &StationId {
        &self.station
    }

    #[must_use]
    pub fn archive(&self) -> &A {
        &self.archive
    }

    /// Sync into `directory/IDR<id>`, keeping snapshots for
    /// `retention_hours` (`0` keeps them forever).
    pub fn sync(&self, directory: &Path, retention_hours: u32) -> Result<SyncReport, SyncError> {
        self.sync_at(directory, retention_hours, Utc::now())
    }

    /// Same as [`SyncEngine::sync`] with an explicit clock for the
    /// retention stage.
    pub fn sync_at(
        &self,
        directory: &Path,
        retention_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, SyncError> {
        let cache = CacheDirectory::new(directory, &self.station);
        cache.ensure_exists()?;
        let _guard = StationGuard::acquire(&cache)?;

        let mut report = SyncReport {
            station: self.station.code(),
            cache_dir: cache.path().to_path_buf(),
            ..SyncReport::default()
        };

        let mut session = self.archive.connect()?;
        let fetched = self.fetch_missing(&mut session, &cache, &mut report);
        if let Err(e) = session.close() {
            warn!("[{}] Failed to close session cleanly: {}", self.station.code(), e);
        }
        fetched?;

        report.snapshots_removed = sweep_expired(&cache, &self.station, retention_hours, now)?;

        if report.is_noop() {
            debug!("[{}] Already up to date", self.station.code());
        }
        Ok(report)
    }

    fn fetch_missing(
        &self,
        session: &mut A::Session,
        cache: &CacheDirectory,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let code = self.station.code();

        for asset in StaticAsset::ALL {
            let file_name = self.station.static_file_name(asset);
            if cache.contains(&file_name) {
                continue;
            }

            let remote_path = join_remote(TRANSPARENCIES_DIR, &file_name);
            let Some(file) = session.find_file(&remote_path)? else {
                warn!("[{}] {} is missing on the archive, aborting sync", code, remote_path);
                return Err(SyncError::MissingRemoteAsset { path: remote_path });
            };

            download(session, cache, &file)?;
            report.static_downloaded.push(file_name);
        }

        let candidates: Vec<RemoteFile> = session
            .list_files(SNAPSHOT_DIR)?
            .into_iter()
            .filter(|file| self.station.matches_remote_snapshot(file.path()))
            .collect();

        for file in &candidates {
            if cache.contains(file.file_name()) {
                continue;
            }
            download(session, cache, file)?;
            report
                .snapshots_downloaded
                .push(file.file_name().to_string());
        }

        if report.snapshots_downloaded.is_empty() {
            debug!("[{}] No new snapshots ({} listed)", code, candidates.len());
        } else {
            info!(
                "[{}] Downloaded {} new snapshot(s)",
                code,
                report.snapshots_downloaded.len()
            );
        }
        Ok(())
    }
}

fn download<S: ArchiveSession>(
    session: &mut S,
    cache: &CacheDirectory,
    file: &RemoteFile,
) -> Result<(), SyncError> {
    let bytes = cache.write_with(file.file_name(), |dest| session.download(file, dest))?;
    debug!("Downloaded {} ({} bytes)", file.path(), bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryArchive;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(station: &StationId, hours_old: i64) -> String {
        station.snapshot_file_name(now() - Duration::hours(hours_old))
    }

    fn populated_archive(station: &StationId, snapshot_ages: &[i64]) -> MemoryArchive {
        let archive = MemoryArchive::new();
        for asset in StaticAsset::ALL {
            archive.insert(
                &join_remote(TRANSPARENCIES_DIR, &station.static_file_name(asset)),
                asset.as_str().as_bytes(),
            );
        }
        for hours in snapshot_ages {
            archive.insert(&join_remote(SNAPSHOT_DIR, &snapshot(station, *hours)), b"frame");
        }
        archive
    }

    #[test]
    fn test_fresh_sync_downloads_then_prunes() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E663").unwrap();
        let archive = populated_archive(&station, &[1, 3, 5]);
        let engine = SyncEngine::with_archive(station.clone(), archive.clone());

        let report = engine.sync_at(temp.path(), 2, now()).unwrap();

        assert_eq!(report.static_downloaded.len(), 4);
        assert_eq!(report.snapshots_downloaded.len(), 3);
        assert_eq!(report.snapshots_removed.len(), 2);

        let cache = CacheDirectory::new(temp.path(), &station);
        for asset in StaticAsset::ALL {
            let name = station.static_file_name(asset);
            assert_eq!(fs::read(cache.file_path(&name)).unwrap(), asset.as_str().as_bytes());
        }
        assert_eq!(cache.snapshot_names().unwrap(), vec![snapshot(&station, 1)]);
        assert_eq!(archive.sessions_closed(), 1);
    }

    #[test]
    fn test_second_sync_is_noop() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E001").unwrap();
        let archive = populated_archive(&station, &[0, 1]);
        let engine = SyncEngine::with_archive(station, archive.clone());

        engine.sync_at(temp.path(), 2, now()).unwrap();
        let downloads_after_first = archive.downloads().len();
        let report = engine.sync_at(temp.path(), 2, now()).unwrap();

        assert!(report.is_noop());
        assert_eq!(archive.downloads().len(), downloads_after_first);
    }

    #[test]
    fn test_present_static_assets_are_never_fetched() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E002").unwrap();
        let archive = populated_archive(&station, &[]);
        let cache = CacheDirectory::new(temp.path(), &station);
        cache.ensure_exists().unwrap();
        let background = station.static_file_name(StaticAsset::Background);
        fs::write(cache.file_path(&background), b"local").unwrap();

        let engine = SyncEngine::with_archive(station, archive.clone());
        let report = engine.sync_at(temp.path(), 2, now()).unwrap();

        assert_eq!(report.static_downloaded.len(), 3);
        assert!(!archive.downloads().iter().any(|p| p.ends_with(&background)));
        assert_eq!(fs::read(cache.file_path(&background)).unwrap(), b"local");
    }

    #[test]
    fn test_missing_static_asset_aborts_before_snapshots() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E003").unwrap();
        let archive = populated_archive(&station, &[1, 2]);
        archive.remove(&join_remote(
            TRANSPARENCIES_DIR,
            &station.static_file_name(StaticAsset::Range),
        ));
        let engine = SyncEngine::with_archive(station.clone(), archive.clone());

        let result = engine.sync_at(temp.path(), 2, now());

        assert!(matches!(result, Err(SyncError::MissingRemoteAsset { ref path }) if path.ends_with("IDRE003.range.png")));
        let cache = CacheDirectory::new(temp.path(), &station);
        assert!(cache.snapshot_names().unwrap().is_empty());
        let snapshot_prefix = format!("{SNAPSHOT_DIR}/");
        assert!(!archive.downloads().iter().any(|p| p.starts_with(&snapshot_prefix)));
        // Layers fetched before the gap stay cached
        assert!(cache.contains(&station.static_file_name(StaticAsset::Locations)));
        assert!(!StationGuard::is_held(&cache));
    }

    #[test]
    fn test_only_own_snapshots_are_downloaded() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E66").unwrap();
        let neighbour = StationId::new("E663").unwrap();
        let archive = populated_archive(&station, &[1]);
        archive.insert(&join_remote(SNAPSHOT_DIR, &snapshot(&neighbour, 1)), b"other");

        let engine = SyncEngine::with_archive(station.clone(), archive);
        let report = engine.sync_at(temp.path(), 0, now()).unwrap();

        assert_eq!(report.snapshots_downloaded, vec![snapshot(&station, 1)]);
    }

    #[test]
    fn test_zero_retention_keeps_old_snapshots() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E004").unwrap();
        let engine = SyncEngine::with_archive(station.clone(), populated_archive(&station, &[1, 48]));

        let report = engine.sync_at(temp.path(), 0, now()).unwrap();

        assert!(report.snapshots_removed.is_empty());
        let cache = CacheDirectory::new(temp.path(), &station);
        assert_eq!(cache.snapshot_names().unwrap().len(), 2);
    }

    #[test]
    fn test_connection_failure_is_surfaced() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E005").unwrap();
        let archive = populated_archive(&station, &[1]);
        archive.set_unreachable(true);
        let engine = SyncEngine::with_archive(station.clone(), archive);

        let result = engine.sync_at(temp.path(), 2, now());

        assert!(matches!(result, Err(SyncError::Connection { .. })));
        // Directory is created before connecting
        assert!(CacheDirectory::new(temp.path(), &station).path().is_dir());
    }

    #[test]
    fn test_malformed_cached_snapshot_is_fatal() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E006").unwrap();
        let cache = CacheDirectory::new(temp.path(), &station);
        cache.ensure_exists().unwrap();
        fs::write(cache.file_path("IDRE006.T.bogus.png"), b"x").unwrap();

        let engine = SyncEngine::with_archive(station.clone(), populated_archive(&station, &[]));
        let result = engine.sync_at(temp.path(), 2, now());

        assert!(matches!(result, Err(SyncError::MalformedLocalState { .. })));
    }

    #[test]
    fn test_overlapping_sync_is_rejected() {
        let temp = TempDir::new().unwrap();
        let station = StationId::new("E007").unwrap();
        let engine = SyncEngine::with_archive(station.clone(), populated_archive(&station, &[]));

        let cache = CacheDirectory::new(temp.path(), &station);
        cache.ensure_exists().unwrap();

        let held = StationGuard::acquire(&cache).unwrap();
        let result = engine.sync_at(temp.path(), 2, now());
        assert!(matches!(result, Err(SyncError::InProgress { .. })));

        // The same station mirrored elsewhere is not blocked
        let elsewhere = TempDir::new().unwrap();
        assert!(engine.sync_at(elsewhere.path(), 2, now()).is_ok());

        drop(held);
        assert!(engine.sync_at(temp.path(), 2, now()).is_ok());
    }
}
