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

//! Application configuration management.
//!
//! Persistent configuration is stored in TOML format via confy. It lists the
//! stations to mirror, where the cache lives, how long snapshots are kept
//! and how to reach the remote archive.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use radar_sync::{RemoteConfig, StationId, SyncError};
use serde::{Deserialize, Serialize};

/// Name used for the confy configuration file.
pub const APP_NAME: &str = "bom-radar";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "BOM_RADAR_CACHE_DIR";

/// Station mirrored when none are configured (Brisbane, Marburg).
pub const DEFAULT_STATION: &str = "663";

/// Remote archive connection settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use passive mode for data connections
    #[serde(default = "default_true")]
    pub passive: bool,
}

impl RemoteSettings {
    pub fn to_remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            host: self.host.clone(),
            port: self.port,
            timeout: Duration::from_secs(self.timeout_secs),
            passive: self.passive,
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            passive: true,
        }
    }
}

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Station ids to mirror (e.g. "663")
    #[serde(default = "default_stations")]
    pub stations: Vec<String>,

    /// Base directory holding one IDR<id> folder per station
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Hours to keep snapshots, 0 keeps them forever
    #[serde(default = "default_keep_hours")]
    pub keep_hours: u32,

    /// Seconds between syncs in watch mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Frames in the rendered loop
    #[serde(default = "default_frames")]
    pub frames: NonZeroUsize,

    #[serde(default)]
    pub remote: RemoteSettings,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_stations() -> Vec<String> {
    vec![DEFAULT_STATION.to_string()]
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_NAME)
}

fn default_keep_hours() -> u32 {
    radar_sync::DEFAULT_RETENTION_HOURS
}

fn default_interval_secs() -> u64 {
    600
}

fn default_frames() -> NonZeroUsize {
    radar_sync::DEFAULT_LOOP_COUNT
}

fn default_host() -> String {
    radar_sync::archive::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    radar_sync::archive::DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    radar_sync::archive::DEFAULT_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            stations: default_stations(),
            cache_dir: default_cache_dir(),
            keep_hours: default_keep_hours(),
            interval_secs: default_interval_secs(),
            frames: default_frames(),
            remote: RemoteSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        let mut config: AppConfig = confy::load(APP_NAME, "config")?;
        config.apply_env_overrides(std::env::var(CACHE_DIR_ENV).ok());
        Ok(config)
    }

    /// Environment variable takes precedence over the config file
    fn apply_env_overrides(&mut self, cache_dir: Option<String>) {
        if let Some(dir) = cache_dir.filter(|d| !d.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, "config")
    }

    /// Validate the configured station ids
    pub fn station_ids(&self) -> Result<Vec<StationId>, SyncError> {
        self.stations.iter().map(|s| StationId::new(s.as_str())).collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}
