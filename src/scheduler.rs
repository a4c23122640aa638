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

//! Periodic sync driver.
//!
//! Each pass runs every station's sync on the blocking pool and waits for
//! all of them, so one station never overlaps with itself while distinct
//! stations proceed in parallel. Failures are logged and retried on the
//! next tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use radar_sync::{Archive, StationId, SyncEngine, SyncError, SyncReport};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One station to keep in sync.
#[derive(Debug)]
pub struct SyncJob<A> {
    engine: Arc<SyncEngine<A>>,
    cache_dir: PathBuf,
    keep_hours: u32,
}

impl<A> Clone for SyncJob<A> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            cache_dir: self.cache_dir.clone(),
            keep_hours: self.keep_hours,
        }
    }
}

impl<A: Archive + 'static> SyncJob<A> {
    pub fn new(engine: SyncEngine<A>, cache_dir: PathBuf, keep_hours: u32) -> Self {
        Self {
            engine: Arc::new(engine),
            cache_dir,
            keep_hours,
        }
    }

    pub fn station(&self) -> &StationId {
        self.engine.station()
    }

    async fn run(self) -> (StationId, Result<SyncReport, SyncError>) {
        let station = self.station().clone();
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || {
            engine.sync(&self.cache_dir, self.keep_hours)
        })
        .await;

        match result {
            Ok(outcome) => (station, outcome),
            Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
        }
    }
}

/// Sync every job once, concurrently. Results are in job order.
pub async fn run_once<A: Archive + 'static>(
    jobs: &[SyncJob<A>],
) -> Vec<(StationId, Result<SyncReport, SyncError>)> {
    let mut set = JoinSet::new();
    for (index, job) in jobs.iter().cloned().enumerate() {
        set.spawn(async move { (index, job.run().await) });
    }

    let mut results = Vec::with_capacity(jobs.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(entry) => results.push(entry),
            Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

/// Log the outcome of one pass. Returns the number of failed stations.
pub fn log_results(results: &[(StationId, Result<SyncReport, SyncError>)]) -> usize {
    let mut failures = 0;
    for (station, result) in results {
        match result {
            Ok(report) => info!(
                "[{}] Sync complete: {} layer(s), {} new snapshot(s), {} removed",
                station.code(),
                report.static_downloaded.len(),
                report.snapshots_downloaded.len(),
                report.snapshots_removed.len()
            ),
            Err(e) => {
                failures += 1;
                error!("[{}] Sync failed: {}", station.code(), e);
            }
        }
    }
    failures
}

/// Sync all jobs every `period` until cancelled.
///
/// The first pass starts immediately. Passes that would start while the
/// previous one is still running are skipped.
pub async fn watch<A: Archive + 'static>(
    jobs: Vec<SyncJob<A>>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        "Syncing {} station(s) every {} seconds",
        jobs.len(),
        period.as_secs()
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let results = tokio::select! {
                    results = run_once(&jobs) => results,
                    () = cancel_token.cancelled() => {
                        info!("Sync loop cancelled");
                        return;
                    }
                };
                log_results(&results);
            }

            () = cancel_token.cancelled() => {
                info!("Sync loop cancelled");
                return;
            }
        }
    }
}
