//! Pose estimation boundary.
//!
//! Landmark extraction itself is external; this module defines the data it
//! returns, the [`PoseEstimator`] trait, and a helper-process implementation.

mod estimator;
mod landmark;
mod subprocess;

pub use estimator::{PoseError, PoseEstimator};
pub use landmark::{Landmark, LandmarkSet};
pub use subprocess::SubprocessEstimator;
