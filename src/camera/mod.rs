//! Camera acquisition for the capture loop.
//!
//! - Source identifiers via [`parse_source`]
//! - Frame sources via the [`FrameSource`] trait and [`FfmpegSource`]
//! - Startup probing and single/stereo fallback via [`CameraRig`]

mod ffmpeg;
mod rig;
mod source;
mod types;

pub use ffmpeg::{ffmpeg_args, FfmpegSettings, FfmpegSource, DEFAULT_READ_TIMEOUT};
pub use rig::{
    probe, CameraRig, FramePair, OpenedSource, ProbeSettings, DEFAULT_PROBE_ATTEMPTS,
    DEFAULT_PROBE_BACKOFF,
};
pub use source::{parse_source, FrameSource, DEFAULT_STREAM_PATH};
pub use types::{CameraConfig, CameraError, CameraMode, CameraRole, Frame, Resolution, SourceId};
