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

//! Anonymous FTP implementation of the archive traits.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use super::{Archive, ArchiveSession, RemoteConfig, RemoteFile};
use crate::error::SyncError;

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// Anonymous FTP archive, configured once at construction.
#[derive(Debug, Clone, Default)]
pub struct FtpArchive {
    config: RemoteConfig,
}

impl FtpArchive {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn connection_error(&self, source: impl Into<crate::error::BoxError>) -> SyncError {
        SyncError::Connection {
            address: self.config.address(),
            source: source.into(),
        }
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, SyncError> {
        let addrs: Vec<SocketAddr> = self
            .config
            .address()
            .to_socket_addrs()
            .map_err(|e| self.connection_error(e))?
            .collect();

        if addrs.is_empty() {
            return Err(self.connection_error("host resolved to no addresses"));
        }
        Ok(addrs)
    }
}

/// Try each address in turn, returning the first control connection that
/// answers. The error of the last attempt is returned if none do.
fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> Result<FtpStream, FtpError> {
    let mut last_error = None;
    for addr in addrs {
        match FtpStream::connect_timeout(*addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connection to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        FtpError::ConnectionError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no addresses to connect to",
        ))
    }))
}

/// Open a passive data connection bounded by `timeout` for connect, read
/// and write.
fn data_stream(addr: SocketAddr, timeout: Duration) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

impl Archive for FtpArchive {
    type Session = FtpSession;

    fn describe(&self) -> String {
        format!("ftp://{}", self.config.address())
    }

    fn connect(&self) -> Result<FtpSession, SyncError> {
        let timeout = self.config.timeout;
        let addrs = self.resolve()?;
        info!("Connecting to {}...", self.describe());

        let stream = connect_any(&addrs, timeout).map_err(|e| self.connection_error(e))?;

        stream
            .get_ref()
            .set_read_timeout(Some(timeout))
            .and_then(|()| stream.get_ref().set_write_timeout(Some(timeout)))
            .map_err(|e| self.connection_error(e))?;

        // Data connections get the same bound as the control connection
        let mut stream = if self.config.passive {
            stream.passive_stream_builder(move |addr| {
                data_stream(addr, timeout).map_err(FtpError::ConnectionError)
            })
        } else {
            stream.active_mode(timeout)
        };

        stream
            .login(ANONYMOUS_USER, ANONYMOUS_PASSWORD)
            .map_err(|e| self.connection_error(e))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| self.connection_error(e))?;

        info!("Connected to {}", self.config.address());
        Ok(FtpSession { stream })
    }
}

/// A logged-in FTP control connection.
pub struct FtpSession {
    stream: FtpStream,
}

impl std::fmt::Debug for FtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpSession").finish_non_exhaustive()
    }
}

fn remote_error(path: &str, source: FtpError) -> SyncError {
    SyncError::Remote {
        path: path.to_string(),
        source: Box::new(source),
    }
}

impl ArchiveSession for FtpSession {
    fn list_files(&mut self, dir: &str) -> Result<Vec<RemoteFile>, SyncError> {
        let entries = self
            .stream
            .nlst(Some(dir))
            .map_err(|e| remote_error(dir, e))?;
        debug!("Listed {} entries in {}", entries.len(), dir);

        Ok(entries
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(|entry| RemoteFile::from_listing(dir, entry))
            .collect())
    }

    fn download(&mut self, file: &RemoteFile, dest: &mut dyn Write) -> Result<u64, SyncError> {
        let mut buffer = self
            .stream
            .retr_as_buffer(file.path())
            .map_err(|e| remote_error(file.path(), e))?;

        std::io::copy(&mut buffer, dest).map_err(|e| SyncError::Remote {
            path: file.path().to_string(),
            source: Box::new(e),
        })
    }

    fn close(mut self) -> Result<(), SyncError> {
        self.stream.quit().map_err(|e| remote_error("QUIT", e))
    }
}
