//! The per-frame tracking loop.
//!
//! Every iteration runs strictly in order: read frames, estimate the pose,
//! track extremities and dispatch telemetry, render, write the snapshot,
//! then handle at most one operator command.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::camera::{CameraError, CameraMode, CameraRig, Frame};
use crate::hotkeys::{KeyCommand, KeySource, NoKeys};
use crate::overlay::{joint_markers, LogVisualizer, Scene, Visualizer};
use crate::pose::{LandmarkSet, PoseError, PoseEstimator};
use crate::snapshot::{Calibration, PosePayload, SnapshotRecord, SnapshotWriter};
use crate::telemetry::TelemetryDispatcher;
use crate::tracker::ExtremityTracker;

const ESTIMATOR_TARGET: &str = "pose_relay::estimator";
const CAMERA_TARGET: &str = "pose_relay::camera";

/// Shown after a calibration mark was recorded.
pub const CALIBRATION_BANNER: &str = "Calibration captured";

/// Message stored with every calibration mark.
pub const CALIBRATION_MSG: &str = "manual calibration triggered";

/// How long the calibration banner stays up, in seconds.
pub const BANNER_SECONDS: f64 = 2.0;

/// Why a running loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    StreamEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Terminated(StopReason),
    /// No usable primary camera; the loop never ran
    NoCamera,
}

/// Session state owned by the loop thread.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSession {
    pub mode: CameraMode,
    pub calibration: Option<Calibration>,
    /// Clock value until which the calibration banner is shown
    pub banner_until: Option<f64>,
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

pub struct CaptureLoop {
    state: LoopState,
    rig: Option<CameraRig>,
    estimator: Option<Box<dyn PoseEstimator>>,
    tracker: ExtremityTracker,
    dispatcher: TelemetryDispatcher,
    snapshot: SnapshotWriter,
    keys: Box<dyn KeySource>,
    visualizer: Box<dyn Visualizer>,
    clock: Box<dyn FnMut() -> f64>,
    session: TrackerSession,
    frames: u64,
    shut_down: bool,
}

impl CaptureLoop {
    /// Build the loop from the outcome of camera acquisition.
    ///
    /// A failed acquisition puts the loop straight into `NoCamera`.
    pub fn new(
        acquired: Result<CameraRig, CameraError>,
        tracker: ExtremityTracker,
        dispatcher: TelemetryDispatcher,
        snapshot: SnapshotWriter,
    ) -> Self {
        let (state, rig, mode) = match acquired {
            Ok(rig) => {
                let mode = rig.mode();
                (LoopState::Initializing, Some(rig), mode)
            }
            Err(e) => {
                log::error!(target: CAMERA_TARGET, "{}", e);
                (LoopState::NoCamera, None, CameraMode::Single)
            }
        };

        Self {
            state,
            rig,
            estimator: None,
            tracker,
            dispatcher,
            snapshot,
            keys: Box::new(NoKeys),
            visualizer: Box::new(LogVisualizer::default()),
            clock: Box::new(unix_now),
            session: TrackerSession {
                mode,
                calibration: None,
                banner_until: None,
            },
            frames: 0,
            shut_down: false,
        }
    }

    /// Without an estimator frames are still captured and rendered, but
    /// nothing is tracked or dispatched.
    pub fn with_estimator(mut self, estimator: Option<Box<dyn PoseEstimator>>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_keys(mut self, keys: Box<dyn KeySource>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Replace the wall clock, e.g. with a simulated one.
    pub fn with_clock(mut self, clock: Box<dyn FnMut() -> f64>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &TrackerSession {
        &self.session
    }

    pub fn dispatcher(&self) -> &TelemetryDispatcher {
        &self.dispatcher
    }

    /// Number of iterations that read a frame.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run until the operator quits or the stream ends, then release
    /// everything.
    pub fn run(&mut self) -> LoopState {
        if self.state != LoopState::Initializing {
            return self.state;
        }

        self.state = LoopState::Running;
        log::info!(
            "Tracking started ({} mode). Press 'q' to quit, 'c' to calibrate.",
            self.session.mode
        );

        let reason = loop {
            if let Some(reason) = self.step() {
                break reason;
            }
        };

        self.state = LoopState::Terminated(reason);
        self.shutdown();
        log::info!("Tracking stopped after {} frames ({:?})", self.frames, reason);
        self.state
    }

    /// One iteration. Returns the stop reason when the loop must end.
    fn step(&mut self) -> Option<StopReason> {
        let rig = match self.rig.as_mut() {
            Some(rig) => rig,
            None => return Some(StopReason::StreamEnded),
        };

        let frames = match rig.read_frames() {
            Ok(frames) => frames,
            Err(e) => {
                log::info!(target: CAMERA_TARGET, "Camera stream ended: {}", e);
                return Some(StopReason::StreamEnded);
            }
        };
        self.frames += 1;

        let (width, height) = (frames.primary.width, frames.primary.height);
        let landmarks = self.estimate(&frames.primary);
        let now = (self.clock)();

        let mut markers = Vec::new();
        if let Some(landmarks) = &landmarks {
            if let Some(observations) = self.tracker.track(landmarks, width, height) {
                self.dispatcher
                    .maybe_dispatch(&observations, self.session.mode, now);
                markers = joint_markers(&observations);
            }
        }

        let banner = match self.session.banner_until {
            Some(until) if now < until => Some(CALIBRATION_BANNER),
            _ => None,
        };
        self.visualizer.render(&Scene {
            primary: &frames.primary,
            secondary: frames.secondary.as_ref(),
            markers,
            banner,
        });

        self.snapshot.write(&SnapshotRecord {
            pose: landmarks
                .as_ref()
                .map(|l| PosePayload::from_landmarks(l, width, height)),
            calibration: self.session.calibration.clone(),
        });

        match self.keys.poll() {
            Some(KeyCommand::Quit) => return Some(StopReason::QuitKey),
            Some(KeyCommand::Calibrate) => {
                if landmarks.is_some() {
                    self.session.calibration = Some(Calibration {
                        timestamp: now,
                        msg: CALIBRATION_MSG.to_string(),
                    });
                    self.session.banner_until = Some(now + BANNER_SECONDS);
                    log::info!("Calibration captured at {:.3}", now);
                } else {
                    log::debug!("Calibration ignored: no pose in this frame");
                }
            }
            None => {}
        }

        None
    }

    /// Run the estimator on one frame. Failures count as "no pose".
    fn estimate(&mut self, frame: &Frame) -> Option<LandmarkSet> {
        let estimator = self.estimator.as_mut()?;
        match estimator.estimate(frame) {
            Ok(Some(landmarks)) if !landmarks.is_empty() => Some(landmarks),
            Ok(_) => None,
            Err(PoseError::Closed) => {
                log::warn!(
                    target: ESTIMATOR_TARGET,
                    "Pose estimator '{}' went away, pose features disabled",
                    estimator.name()
                );
                estimator.close();
                self.estimator = None;
                None
            }
            Err(e) => {
                log::warn!(target: ESTIMATOR_TARGET, "Pose estimation failed: {}", e);
                None
            }
        }
    }

    /// Release cameras, estimator and visualizer. Runs at most once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(rig) = self.rig.as_mut() {
            rig.release();
        }
        if let Some(estimator) = self.estimator.as_mut() {
            estimator.close();
        }
        self.visualizer.close();
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
