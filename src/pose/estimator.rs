//! Pose estimator interface.

use thiserror::Error;

use super::landmark::LandmarkSet;
use crate::camera::Frame;

/// An external pose-estimation capability.
///
/// `estimate` returns `Ok(None)` when no person is in the frame; that is not
/// an error. `close` releases whatever the estimator holds and must be safe to
/// call more than once.
pub trait PoseEstimator: Send {
    /// Backend identifier used in logs.
    fn name(&self) -> &str;

    /// Estimate one pose from a frame.
    fn estimate(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, PoseError>;

    /// Release the estimator.
    fn close(&mut self) {}
}

/// Errors raised by pose estimators.
#[derive(Debug, Error)]
pub enum PoseError {
    #[error("pose helper command is empty")]
    EmptyCommand,

    #[error("failed to launch pose helper '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("pose helper I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("pose helper sent a malformed reply: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("pose helper closed its output")]
    Closed,
}
