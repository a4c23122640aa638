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

//! Local mirror of Bureau of Meteorology radar loops.
//!
//! This library keeps a per-station cache directory in step with the BOM's
//! anonymous FTP archive and renders an animated viewer from it:
//!
//! - **Station layer**: station ids and the file naming scheme
//!   ([`StationId`], [`StaticAsset`])
//! - **Archive layer**: remote access behind the [`Archive`] trait, with an
//!   anonymous FTP implementation ([`FtpArchive`])
//! - **Engine**: incremental download and retention sweep ([`SyncEngine`])
//! - **Renderer**: HTML/CSS/JS fragment cycling the latest frames
//!   ([`Renderer`])
//!
//! The engine and the renderer share nothing but the files on disk.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use radar_sync::{RemoteConfig, StationId, SyncEngine, DEFAULT_RETENTION_HOURS};
//!
//! let station: StationId = "663".parse()?;
//! let engine = SyncEngine::new(station, RemoteConfig::default());
//!
//! // Call roughly every 10 minutes
//! let report = engine.sync(Path::new("/var/www/radar"), DEFAULT_RETENTION_HOURS)?;
//! println!("{} new snapshot(s)", report.snapshots_downloaded.len());
//! # Ok::<(), radar_sync::SyncError>(())
//! ```
//!
//! Rendering the viewer for a page:
//!
//! ```no_run
//! use std::path::Path;
//! use radar_sync::{Renderer, StationId, DEFAULT_LOOP_COUNT};
//!
//! let renderer = Renderer::new(StationId::new("663")?);
//! let html = renderer.render(Path::new("/var/www/radar"), "/radar", DEFAULT_LOOP_COUNT)?;
//! # Ok::<(), radar_sync::SyncError>(())
//! ```

pub mod archive;
pub mod cache;
pub mod engine;
pub mod error;
pub mod guard;
pub mod render;
pub mod retention;
pub mod station;

#[cfg(test)]
mod testing;

pub use archive::{Archive, ArchiveSession, FtpArchive, RemoteConfig, RemoteFile};
pub use cache::CacheDirectory;
pub use engine::{SyncEngine, SyncReport, DEFAULT_RETENTION_HOURS};
pub use error::SyncError;
pub use guard::StationGuard;
pub use render::{Renderer, DEFAULT_LOOP_COUNT};
pub use station::{StaticAsset, StationId};
