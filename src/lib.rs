//! pose-relay library crate.
//!
//! Capture frames from one or two cameras, estimate body landmarks, track
//! per-joint motion and relay rate-limited telemetry to an HTTP collector.
//!
//! The main pieces:
//! - [`camera`]: frame sources and single/stereo fallback
//! - [`pose`]: the pose estimator boundary
//! - [`tracker`]: per-joint motion classification
//! - [`telemetry`]: payload sanitization and dispatch
//! - [`snapshot`]: the local snapshot file
//! - [`capture_loop`]: the per-frame state machine tying them together
//! - [`collector`]: the receiving HTTP service

pub mod camera;
pub mod capture_loop;
pub mod cli;
pub mod collector;
pub mod config;
pub mod hotkeys;
pub mod overlay;
pub mod pose;
pub mod snapshot;
pub mod telemetry;
pub mod tracker;
