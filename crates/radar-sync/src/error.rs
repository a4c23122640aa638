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

//! Error taxonomy for the sync engine.

use std::path::PathBuf;

use thiserror::Error;

/// Transport-level error produced by an archive implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a sync invocation.
///
/// Nothing is retried internally. Files already written before the failure
/// stay in place; a later sync picks up where this one stopped.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid station id {0:?}: expected a non-empty alphanumeric code")]
    InvalidStation(String),

    #[error("cannot connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: BoxError,
    },

    #[error("remote command failed for {path}: {source}")]
    Remote {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("required file {path} is missing on the remote archive")]
    MissingRemoteAsset { path: String },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cached snapshot {file:?} has no valid YYYYMMDDHHmm timestamp")]
    MalformedLocalState { file: String },

    #[error("a sync for station {station} is already running")]
    InProgress { station: String },
}

impl SyncError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
