//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::Config;

/// Validate a collector URL (http or https).
fn parse_api_url(s: &str) -> Result<String, String> {
    let url = url::Url::parse(s).map_err(|e| format!("'{}' is not a valid URL: {}", s, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(format!("Unsupported URL scheme '{}', use http or https", other)),
    }
}

/// Validate a listen address (HOST:PORT).
fn parse_bind(s: &str) -> Result<String, String> {
    s.parse::<SocketAddr>()
        .map(|_| s.to_string())
        .map_err(|_| format!("'{}' is not a valid address, use HOST:PORT", s))
}

/// Track body extremities from one or two cameras and relay them to a collector
#[derive(Parser, Debug)]
#[command(name = "pose-relay")]
#[command(version, about = "Real-time pose telemetry relay", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Two local cameras, default collector
    pose-relay --left 0 --right 1

    # Phone camera over HTTP (path defaults to /video)
    pose-relay --left http://192.168.1.20:8080

    # Run the collector
    pose-relay serve --bind 0.0.0.0:8000

KEYS (while tracking):
    q      Quit
    c      Record a calibration mark
    Ctrl+C Quit")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Primary camera: device index or stream URL
    #[arg(long)]
    pub left: Option<String>,

    /// Secondary camera: device index or stream URL
    #[arg(long)]
    pub right: Option<String>,

    /// Collector endpoint receiving telemetry
    #[arg(long, env = "POSE_RELAY_API", value_parser = parse_api_url)]
    pub api: Option<String>,

    /// Snapshot file rewritten every frame
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Pose helper command line, e.g. "python3 pose_helper.py"
    #[arg(long)]
    pub estimator: Option<String>,

    /// Config file path
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the collector service
    Serve {
        /// Listen address (HOST:PORT)
        #[arg(long, value_parser = parse_bind)]
        bind: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Create default config file
    Init,
}

impl Args {
    /// Apply command-line values on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(left) = &self.left {
            config.camera.left = left.clone();
        }
        if let Some(right) = &self.right {
            config.camera.right = right.clone();
        }
        if let Some(api) = &self.api {
            config.telemetry.api_url = api.clone();
        }
        if let Some(snapshot) = &self.snapshot {
            config.snapshot.path = snapshot.clone();
        }
        if let Some(estimator) = &self.estimator {
            config.estimator.command = estimator.split_whitespace().map(String::from).collect();
        }
        if let Some(Command::Serve { bind: Some(bind) }) = &self.command {
            config.collector.bind = bind.clone();
        }
    }
}
