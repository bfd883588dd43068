//! Local snapshot of the latest pose and calibration state.
//!
//! The file is rewritten every frame so offline consumers can poll it. Writes
//! go to a sibling temp file first and are renamed into place, so readers
//! never see a half-written document.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pose::LandmarkSet;
use crate::telemetry::sanitize::{finite, Sanitize};

const LOG_TARGET: &str = "pose_relay::snapshot";

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "coords.json";

/// Operator calibration mark.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub msg: String,
}

/// One landmark of the full pose, in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotLandmark {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

/// Every landmark of the latest pose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PosePayload {
    pub landmarks: Vec<SnapshotLandmark>,
}

impl PosePayload {
    /// Convert a normalized landmark set into pixel space.
    ///
    /// `z` is scaled by the width, the way the estimator defines depth.
    pub fn from_landmarks(landmarks: &LandmarkSet, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        Self {
            landmarks: landmarks
                .iter()
                .enumerate()
                .map(|(id, lm)| SnapshotLandmark {
                    id,
                    x: lm.x * w,
                    y: lm.y * h,
                    z: lm.z * w,
                    visibility: lm.visibility,
                })
                .collect(),
        }
    }
}

/// Document written to the snapshot file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotRecord {
    pub pose: Option<PosePayload>,
    pub calibration: Option<Calibration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLandmark {
    pub id: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub visibility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePose {
    pub landmarks: Vec<WireLandmark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCalibration {
    pub timestamp: Option<f64>,
    pub msg: String,
}

/// Sanitized snapshot as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSnapshot {
    pub pose: Option<WirePose>,
    pub calibration: Option<WireCalibration>,
}

impl Sanitize for SnapshotRecord {
    type Output = WireSnapshot;

    fn sanitize(&self) -> WireSnapshot {
        WireSnapshot {
            pose: self.pose.as_ref().map(|pose| WirePose {
                landmarks: pose
                    .landmarks
                    .iter()
                    .map(|lm| WireLandmark {
                        id: lm.id,
                        x: finite(lm.x),
                        y: finite(lm.y),
                        z: finite(lm.z),
                        visibility: finite(lm.visibility),
                    })
                    .collect(),
            }),
            calibration: self.calibration.as_ref().map(|c| WireCalibration {
                timestamp: finite(c.timestamp),
                msg: c.msg.clone(),
            }),
        }
    }
}

/// Errors from writing a snapshot. Never surfaced past [`SnapshotWriter::write`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write snapshot '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Best-effort writer for the snapshot file.
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    tmp_path: PathBuf,
    failing: bool,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp: OsString = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            failing: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the snapshot file with `record`.
    ///
    /// Failures are logged and otherwise ignored. Only the first failure of a
    /// streak is logged at `warn`.
    pub fn write(&mut self, record: &SnapshotRecord) {
        match self.try_write(record) {
            Ok(()) => {
                if self.failing {
                    log::info!(target: LOG_TARGET, "Snapshot writes recovered");
                }
                self.failing = false;
            }
            Err(e) => {
                if self.failing {
                    log::debug!(target: LOG_TARGET, "{}", e);
                } else {
                    log::warn!(target: LOG_TARGET, "{}", e);
                }
                self.failing = true;
            }
        }
    }

    fn try_write(&self, record: &SnapshotRecord) -> Result<(), SnapshotError> {
        let body = serde_json::to_vec(&record.sanitize())?;
        let io_err = |source: std::io::Error| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = fs::File::create(&self.tmp_path).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        drop(file);
        fs::rename(&self.tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}
