//! Configuration file handling for pose-relay.
//!
//! Loads configuration from `<config_dir>/pose-relay/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::camera::{
    parse_source, CameraConfig, CameraRole, FfmpegSettings, ProbeSettings, Resolution,
    DEFAULT_READ_TIMEOUT,
};
use crate::collector::DEFAULT_BIND;
use crate::snapshot::DEFAULT_SNAPSHOT_PATH;
use crate::telemetry::{in_flight_bound, DispatcherSettings, DEFAULT_COLLECTOR_URL};
use crate::tracker::{
    default_extremities, ExtremityTracker, DEFAULT_MIN_VISIBILITY, DEFAULT_SENSITIVITY,
};

/// Configuration file structure for pose-relay.
/// Every section and field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub tracking: TrackingSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
    #[serde(default)]
    pub estimator: EstimatorSection,
    #[serde(default)]
    pub collector: CollectorSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    /// Primary source: device index or stream URL
    pub left: String,
    /// Secondary source
    pub right: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub probe_attempts: u32,
    pub probe_backoff_ms: u64,
    /// Deadline for a single frame; a stalled source fails after it
    pub read_timeout_ms: u64,
    /// ffmpeg executable
    pub ffmpeg: String,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            left: "0".to_string(),
            right: "1".to_string(),
            width: Resolution::MEDIUM.width,
            height: Resolution::MEDIUM.height,
            fps: 30,
            probe_attempts: 20,
            probe_backoff_ms: 50,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl CameraSection {
    /// The primary (left) and secondary (right) cameras.
    pub fn cameras(&self) -> [CameraConfig; 2] {
        [
            CameraConfig::new(parse_source(&self.left), CameraRole::Primary),
            CameraConfig::new(parse_source(&self.right), CameraRole::Secondary),
        ]
    }

    pub fn ffmpeg_settings(&self) -> FfmpegSettings {
        FfmpegSettings {
            program: self.ffmpeg.clone(),
            resolution: Resolution {
                width: self.width,
                height: self.height,
            },
            fps: self.fps,
            read_timeout: Duration::from_millis(self.read_timeout_ms.max(1)),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            attempts: self.probe_attempts,
            backoff: Duration::from_millis(self.probe_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSection {
    /// Pixel displacement above which a joint counts as moving
    pub sensitivity: f64,
    pub min_visibility: f64,
    /// Joint name to landmark ordinal
    pub extremities: BTreeMap<String, usize>,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            min_visibility: DEFAULT_MIN_VISIBILITY,
            extremities: default_extremities(),
        }
    }
}

impl TrackingSection {
    pub fn tracker(&self) -> ExtremityTracker {
        ExtremityTracker::new(self.extremities.clone())
            .with_sensitivity(self.sensitivity)
            .with_min_visibility(self.min_visibility)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub api_url: String,
    pub send_interval_ms: u64,
    pub timeout_ms: u64,
    /// Derived from the interval and timeout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        let defaults = DispatcherSettings::default();
        Self {
            api_url: DEFAULT_COLLECTOR_URL.to_string(),
            send_interval_ms: defaults.send_interval.as_millis() as u64,
            timeout_ms: defaults.timeout.as_millis() as u64,
            max_in_flight: None,
        }
    }
}

impl TelemetrySection {
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        let send_interval = Duration::from_millis(self.send_interval_ms);
        let timeout = Duration::from_millis(self.timeout_ms);
        DispatcherSettings {
            url: self.api_url.clone(),
            send_interval,
            timeout,
            max_in_flight: self
                .max_in_flight
                .unwrap_or_else(|| in_flight_bound(send_interval, timeout))
                .max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSection {
    pub path: PathBuf,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EstimatorSection {
    /// Helper argv; empty disables pose features
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    pub bind: String,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Written by `pose-relay config init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# pose-relay configuration

[camera]
# Device index ("0") or stream URL ("http://192.168.1.20:8080")
left = "0"
right = "1"
width = 640
height = 480
fps = 30
probe_attempts = 20
probe_backoff_ms = 50
# A source that delivers no frame for this long counts as failed
read_timeout_ms = 2000
ffmpeg = "ffmpeg"

[tracking]
sensitivity = 3.0
min_visibility = 0.5
# Replaces the default joint set when present
# [tracking.extremities]
# nose = 0
# left_wrist = 15
# right_wrist = 16

[telemetry]
api_url = "http://127.0.0.1:8000/api/update-pose/"
send_interval_ms = 100
timeout_ms = 1000
# Defaults to ceil(timeout_ms / send_interval_ms) + 1
# max_in_flight = 11

[snapshot]
path = "coords.json"

[estimator]
# Pose helper, e.g. ["python3", "pose_helper.py"]
command = []

[collector]
bind = "127.0.0.1:8000"
"#;

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Write the default template to `path`, refusing to overwrite.
pub fn init(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(io_err)
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Config file '{}' already exists", .0.display())]
    AlreadyExists(PathBuf),
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pose-relay")
        .join("config.toml")
}
