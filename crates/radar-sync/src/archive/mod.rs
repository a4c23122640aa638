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

//! Remote archive access.
//!
//! The engine talks to the archive through [`Archive`] (opens sessions) and
//! [`ArchiveSession`] (one logged-in connection). [`FtpArchive`] is the real
//! implementation; tests drive the engine with an in-memory archive.

mod ftp;

pub use ftp::{FtpArchive, FtpSession};

use std::io::Write;
use std::time::Duration;

use crate::error::SyncError;

/// Public host of the Bureau of Meteorology's anonymous archive.
pub const DEFAULT_HOST: &str = "ftp.bom.gov.au";
pub const DEFAULT_PORT: u16 = 21;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Remote directory holding the static overlay layers.
pub const TRANSPARENCIES_DIR: &str = "/anon/gen/radar_transparencies";

/// Remote directory holding the snapshots of every station.
pub const SNAPSHOT_DIR: &str = "/anon/gen/radar";

/// Connection settings for the remote archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    /// Applies to connect, read and write on control and data connections.
    pub timeout: Duration,
    /// Use passive mode for data connections.
    pub passive: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            passive: true,
        }
    }
}

impl RemoteConfig {
    /// Address in "host:port" format.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A file on the remote archive, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    path: String,
}

impl RemoteFile {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Build from a directory listing entry, which may be a bare name or a
    /// full path depending on the server.
    #[must_use]
    pub fn from_listing(dir: &str, entry: &str) -> Self {
        if entry.contains('/') {
            Self::new(entry)
        } else {
            Self::new(join_remote(dir, entry))
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Join a remote directory and a file name with exactly one separator.
#[must_use]
pub fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Opens sessions against a remote archive.
pub trait Archive: Send + Sync {
    /// Session type produced by [`Archive::connect`].
    type Session: ArchiveSession;

    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    /// Open and authenticate a new session.
    fn connect(&self) -> Result<Self::Session, SyncError>;
}

/// One open connection to the archive.
pub trait ArchiveSession {
    /// List the files in a remote directory.
    fn list_files(&mut self, dir: &str) -> Result<Vec<RemoteFile>, SyncError>;

    /// Stream a remote file into `dest`, returning the number of bytes written.
    fn download(&mut self, file: &RemoteFile, dest: &mut dyn Write) -> Result<u64, SyncError>;

    /// End the session.
    fn close(self) -> Result<(), SyncError>;

    /// Look up a file by exact path.
    ///
    /// Returns `Ok(None)` when the parent directory exists but does not
    /// contain the file.
    fn find_file(&mut self, path: &str) -> Result<Option<RemoteFile>, SyncError> {
        let target = RemoteFile::new(path);
        let dir = path.rsplit_once('/').map_or("/", |(dir, _)| dir);
        let found = self
            .list_files(dir)?
            .into_iter()
            .find(|file| file.file_name() == target.file_name());
        Ok(found)
    }
}
