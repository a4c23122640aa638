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

//! Per-station local cache directory.
//!
//! Layout for station `663` under base directory `<base>`:
//!
//! ```text
//! <base>/IDR663/
//!   IDR663.background.png
//!   IDR663.locations.png
//!   IDR663.range.png
//!   IDR663.topography.png
//!   IDR663.T.202401011230.png   (zero or more snapshots)
//! ```

use std::fs;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::station::StationId;

/// The directory owned by one station.
#[derive(Debug, Clone)]
pub struct CacheDirectory {
    root: PathBuf,
    station: StationId,
}

impl CacheDirectory {
    /// Cache directory of `station` under `base`. Nothing is created yet.
    #[must_use]
    pub fn new(base: &Path, station: &StationId) -> Self {
        Self {
            root: base.join(station.code()),
            station: station.clone(),
        }
    }

    #[must_use]
    pub fn station(&self) -> &StationId {
        &self.station
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Create the directory and any missing parents (mode 0755 on Unix).
    pub fn ensure_exists(&self) -> Result<(), SyncError> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder
            .create(&self.root)
            .map_err(|e| SyncError::io("create directory", &self.root, e))
    }

    /// Whether a file with this name is already cached.
    #[must_use]
    pub fn contains(&self, file_name: &str) -> bool {
        self.file_path(file_name).is_file()
    }

    /// Write a file through a hidden temporary name and move it into place
    /// once `fill` succeeds, so a cached name always refers to a complete
    /// write.
    pub fn write_with<F>(&self, file_name: &str, fill: F) -> Result<u64, SyncError>
    where
        F: FnOnce(&mut dyn Write) -> Result<u64, SyncError>,
    {
        let final_path = self.file_path(file_name);
        let temp_path = self.file_path(&format!(".{file_name}.part"));

        let file = fs::File::create(&temp_path)
            .map_err(|e| SyncError::io("create", &temp_path, e))?;
        let mut writer = RecordingWriter::new(BufWriter::new(file));

        let written = match fill(&mut writer) {
            Ok(written) => written,
            Err(e) => {
                let local = writer.take_error();
                drop(writer);
                let _ = fs::remove_file(&temp_path);
                // A failed local write is reported as such, whatever the
                // filler made of it.
                return Err(match local {
                    Some(local) => SyncError::io("write", &temp_path, local),
                    None => e,
                });
            }
        };

        writer
            .flush()
            .map_err(|e| SyncError::io("write", &temp_path, e))?;
        drop(writer);

        fs::rename(&temp_path, &final_path)
            .map_err(|e| SyncError::io("rename", &final_path, e))?;
        Ok(written)
    }

    /// Names of this station's snapshot files, sorted ascending (which is
    /// also chronological). A missing directory yields an empty list.
    pub fn snapshot_names(&self) -> Result<Vec<String>, SyncError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncError::io("read directory", &self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::io("read directory", &self.root, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if self.station.is_snapshot_name(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a cached file.
    pub fn remove(&self, file_name: &str) -> Result<(), SyncError> {
        let path = self.file_path(file_name);
        fs::remove_file(&path).map_err(|e| SyncError::io("delete", &path, e))
    }
}

/// Writer that remembers the first error of the wrapped writer.
struct RecordingWriter<W> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: Write> RecordingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        result.map_err(|e| {
            let copy = io::Error::new(e.kind(), e.to_string());
            self.error.get_or_insert(e);
            copy
        })
    }
}

impl<W: Write> Write for RecordingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(base: &Path) -> CacheDirectory {
        CacheDirectory::new(base, &StationId::new("663").unwrap())
    }

    #[test]
    fn test_ensure_exists_creates_parents() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp.path().join("nested/base"));
        cache.ensure_exists().unwrap();
        assert!(cache.path().is_dir());
        assert!(cache.path().ends_with("IDR663"));
        // Idempotent
        cache.ensure_exists().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path());
        cache.ensure_exists().unwrap();
        let mode = fs::metadata(cache.path()).unwrap().permissions().mode() & 0o777;
        // umask may only remove bits
        assert_eq!(mode & !0o755, 0);
    }

    #[test]
    fn test_write_with_moves_into_place() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path());
        cache.ensure_exists().unwrap();

        let written = cache
            .write_with("IDR663.range.png", |w| {
                w.write_all(b"png").unwrap();
                Ok(3)
            })
            .unwrap();

        assert_eq!(written, 3);
        assert!(cache.contains("IDR663.range.png"));
        assert_eq!(fs::read(cache.file_path("IDR663.range.png")).unwrap(), b"png");
        assert!(!cache.file_path(".IDR663.range.png.part").exists());
    }

    #[test]
    fn test_write_with_failure_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path());
        cache.ensure_exists().unwrap();

        let result = cache.write_with("IDR663.range.png", |_w| {
            Err(SyncError::MissingRemoteAsset {
                path: "x".to_string(),
            })
        });

        assert!(result.is_err());
        assert!(!cache.contains("IDR663.range.png"));
        assert_eq!(fs::read_dir(cache.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_snapshot_names_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path());
        cache.ensure_exists().unwrap();
        for name in [
            "IDR663.T.202401011300.png",
            "IDR663.T.202401011200.png",
            "IDR663.background.png",
            "IDR664.T.202401011200.png",
            ".IDR663.T.202401011400.png.part",
        ] {
            fs::write(cache.file_path(name), b"x").unwrap();
        }

        assert_eq!(
            cache.snapshot_names().unwrap(),
            vec!["IDR663.T.202401011200.png", "IDR663.T.202401011300.png"]
        );
    }

    #[test]
    fn test_snapshot_names_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(cache(&temp.path().join("absent")).snapshot_names().unwrap().is_empty());
    }

    #[test]
    fn test_local_write_failure_is_reported_as_io() {
        struct DiskFull;

        impl Write for DiskFull {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::Other, "disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        // Filler that blames every copy failure on the remote side
        let fill = |dest: &mut dyn Write| {
            io::copy(&mut &b"png"[..], dest).map_err(|e| SyncError::Remote {
                path: "/anon/gen/radar/IDR663.T.202401011200.png".to_string(),
                source: Box::new(e),
            })
        };

        let mut writer = RecordingWriter::new(DiskFull);
        assert!(fill(&mut writer).is_err());
        let recorded = writer.take_error().unwrap();
        assert_eq!(recorded.to_string(), "disk full");
        assert!(writer.take_error().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_with_maps_local_failure_to_io() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path());
        cache.ensure_exists().unwrap();

        // /dev/full accepts the open but fails every write with ENOSPC
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let temp_path = cache.file_path(".IDR663.range.png.part");
        std::os::unix::fs::symlink(full, &temp_path).unwrap();

        let result = cache.write_with("IDR663.range.png", |dest| {
            let payload = vec![0_u8; 64 * 1024];
            io::copy(&mut payload.as_slice(), dest)
                .and_then(|n| dest.flush().map(|()| n))
                .map_err(|e| SyncError::Remote {
                    path: "/anon/gen/radar_transparencies/IDR663.range.png".to_string(),
                    source: Box::new(e),
                })
        });

        match result {
            Err(SyncError::Io { action, .. }) => assert_eq!(action, "write"),
            other => panic!("expected a local write error, got {other:?}"),
        }
        assert!(!cache.contains("IDR663.range.png"));
    }
}
