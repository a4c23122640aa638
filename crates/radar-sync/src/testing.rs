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

//! In-memory archive used by the unit tests.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::archive::{Archive, ArchiveSession, RemoteFile};
use crate::error::SyncError;

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    downloads: Vec<String>,
    sessions_closed: usize,
    unreachable: bool,
}

/// Archive whose files live in a map keyed by absolute remote path.
/// Clones share state, so a test can keep a handle for inspection.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryArchive {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryArchive {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, path: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), bytes.to_vec());
    }

    pub(crate) fn remove(&self, path: &str) {
        self.inner.lock().unwrap().files.remove(path);
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    /// Remote paths downloaded so far, in order.
    pub(crate) fn downloads(&self) -> Vec<String> {
        self.inner.lock().unwrap().downloads.clone()
    }

    pub(crate) fn sessions_closed(&self) -> usize {
        self.inner.lock().unwrap().sessions_closed
    }
}

impl Archive for MemoryArchive {
    type Session = MemorySession;

    fn describe(&self) -> String {
        "memory://".to_string()
    }

    fn connect(&self) -> Result<MemorySession, SyncError> {
        if self.inner.lock().unwrap().unreachable {
            return Err(SyncError::Connection {
                address: self.describe(),
                source: "connection refused".into(),
            });
        }
        Ok(MemorySession {
            inner: Arc::clone(&self.inner),
        })
    }
}

#[derive(Debug)]
pub(crate) struct MemorySession {
    inner: Arc<Mutex<Inner>>,
}

impl ArchiveSession for MemorySession {
    fn list_files(&mut self, dir: &str) -> Result<Vec<RemoteFile>, SyncError> {
        let dir = dir.trim_end_matches('/');
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .files
            .keys()
            .filter(|path| path.rsplit_once('/').is_some_and(|(parent, _)| parent == dir))
            .map(RemoteFile::new)
            .collect())
    }

    fn download(&mut self, file: &RemoteFile, dest: &mut dyn Write) -> Result<u64, SyncError> {
        let mut inner = self.inner.lock().unwrap();
        let bytes = inner
            .files
            .get(file.path())
            .cloned()
            .ok_or_else(|| SyncError::Remote {
                path: file.path().to_string(),
                source: "550 file not found".into(),
            })?;
        dest.write_all(&bytes).map_err(|e| SyncError::Remote {
            path: file.path().to_string(),
            source: Box::new(e),
        })?;
        inner.downloads.push(file.path().to_string());
        Ok(bytes.len() as u64)
    }

    fn close(self) -> Result<(), SyncError> {
        self.inner.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}
