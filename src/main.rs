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

mod config;
mod scheduler;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{info, warn};
use radar_sync::{FtpArchive, Renderer, StationId, SyncEngine};
use tokio_util::sync::CancellationToken;

use config::AppConfig;
use scheduler::SyncJob;

#[derive(Debug, Parser)]
#[command(name = "bom-radar", version, about = "Mirror BOM radar loops and render a local viewer")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync the configured stations once
    Sync {
        /// Station id to sync (repeatable, defaults to the configured list)
        #[arg(short, long = "station")]
        stations: Vec<StationId>,

        /// Base cache directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Hours to keep snapshots, 0 keeps them forever
        #[arg(short, long)]
        keep_hours: Option<u32>,

        /// Print the sync reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync the configured stations periodically until interrupted
    Watch {
        /// Seconds between passes
        #[arg(short, long)]
        interval_secs: Option<u64>,
    },

    /// Print the animated viewer for a station
    Render {
        #[arg(short, long)]
        station: StationId,

        /// Base cache directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// URL under which the cache directory is served
        #[arg(short, long)]
        url: String,

        /// Number of frames in the loop
        #[arg(short, long)]
        frames: Option<NonZeroUsize>,
    },

    /// Inspect or initialise the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write the current configuration (defaults on first run) to disk
    Init,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn build_jobs(
    config: &AppConfig,
    stations: Vec<StationId>,
    cache_dir: &Path,
    keep_hours: u32,
) -> Vec<SyncJob<FtpArchive>> {
    let remote = config.remote.to_remote_config();
    stations
        .into_iter()
        .map(|station| {
            SyncJob::new(
                SyncEngine::new(station, remote.clone()),
                cache_dir.to_path_buf(),
                keep_hours,
            )
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load()?;

    match cli.command {
        Command::Sync {
            stations,
            dir,
            keep_hours,
            json,
        } => {
            let stations = if stations.is_empty() {
                config.station_ids()?
            } else {
                stations
            };
            let jobs = build_jobs(
                &config,
                stations,
                dir.as_deref().unwrap_or(&config.cache_dir),
                keep_hours.unwrap_or(config.keep_hours),
            );

            let results = scheduler::run_once(&jobs).await;
            let failures = scheduler::log_results(&results);

            if json {
                let reports: Vec<_> = results
                    .iter()
                    .filter_map(|(_, result)| result.as_ref().ok())
                    .collect();
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }

            if failures > 0 {
                return Err(format!("{failures} of {} station(s) failed to sync", results.len()).into());
            }
        }

        Command::Watch { interval_secs } => {
            let jobs = build_jobs(
                &config,
                config.station_ids()?,
                &config.cache_dir,
                config.keep_hours,
            );
            let period = interval_secs.map_or_else(|| config.interval(), |s| Duration::from_secs(s.max(1)));

            let cancel_token = CancellationToken::new();
            let ctrl_c_token = cancel_token.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                info!("Interrupted, shutting down...");
                ctrl_c_token.cancel();
            });

            scheduler::watch(jobs, period, cancel_token).await;
        }

        Command::Render {
            station,
            dir,
            url,
            frames,
        } => {
            let dir = dir.unwrap_or_else(|| config.cache_dir.clone());
            let html = Renderer::new(station).render(&dir, &url, frames.unwrap_or(config.frames))?;
            print!("{html}");
        }

        Command::Config { action } => match action {
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&config)?),
            ConfigAction::Path => println!("{}", AppConfig::get_config_path()?.display()),
            ConfigAction::Init => {
                config.save()?;
                println!("Configuration written to {}", AppConfig::get_config_path()?.display());
            }
        },
    }

    Ok(())
}
