//! Camera types and data structures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the frames of one camera come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    /// Local capture device index
    Device(u32),
    /// Network stream address
    Stream(String),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Device(index) => write!(f, "device {}", index),
            SourceId::Stream(url) => write!(f, "{}", url),
        }
    }
}

/// Which side of the rig a camera plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraRole {
    /// Feeds pose tracking
    Primary,
    /// Displayed only, optional
    Secondary,
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraRole::Primary => f.write_str("primary"),
            CameraRole::Secondary => f.write_str("secondary"),
        }
    }
}

/// A configured camera. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    source: SourceId,
    role: CameraRole,
}

impl CameraConfig {
    pub fn new(source: SourceId, role: CameraRole) -> Self {
        Self { source, role }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn role(&self) -> CameraRole {
        self.role
    }

    /// Name used for the camera in logs and errors.
    pub fn label(&self) -> String {
        format!("{} ({})", self.source, self.role)
    }
}

/// Whether both cameras or only the primary one are in use.
///
/// Decided once when the rig is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    Stereo,
    Single,
}

impl CameraMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMode::Stereo => "stereo",
            CameraMode::Single => "single",
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// 640x480, what most USB and phone IP cameras deliver without rescaling
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// Size in bytes of one RGB frame at this resolution.
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MEDIUM
    }
}

/// A captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in RGB format
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Wrap raw RGB bytes.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The ffmpeg binary could not be found
    #[error("ffmpeg not found (looked for '{program}'); install it or set [camera] ffmpeg in the config")]
    FfmpegNotFound { program: String },

    /// Failed to start the capture process for a camera
    #[error("Failed to open camera {camera}: {reason}")]
    OpenFailed { camera: String, reason: String },

    /// The camera stopped delivering frames
    #[error("Camera {camera} stream ended")]
    StreamEnded { camera: String },

    /// A frame could not be read
    #[error("Failed to read frame from {camera}: {reason}")]
    ReadFailed { camera: String, reason: String },

    /// No usable primary camera
    #[error("No usable camera: primary source {primary} did not deliver a frame")]
    NoCamera { primary: String },
}
