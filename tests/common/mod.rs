//! Scripted fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pose_relay::camera::{CameraError, Frame, FrameSource, ProbeSettings};
use pose_relay::hotkeys::{KeyCommand, KeySource};
use pose_relay::pose::{Landmark, LandmarkSet, PoseError, PoseEstimator};

pub const WIDTH: u32 = 200;
pub const HEIGHT: u32 = 200;

/// Counters observable after the fake has been moved into the code under test.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub reads: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
}

impl Counters {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Frame source that fails `failures` times, then yields `frames` frames,
/// then reports end of stream.
pub struct ScriptedSource {
    name: String,
    failures: usize,
    frames: usize,
    counters: Counters,
}

impl ScriptedSource {
    pub fn new(name: &str, failures: usize, frames: usize) -> (Self, Counters) {
        let counters = Counters::default();
        let source = Self {
            name: name.to_string(),
            failures,
            frames,
            counters: counters.clone(),
        };
        (source, counters)
    }

    /// A source that never delivers.
    pub fn dead(name: &str) -> (Self, Counters) {
        Self::new(name, usize::MAX, 0)
    }

    pub fn boxed(self) -> Result<Box<dyn FrameSource>, CameraError> {
        Ok(Box::new(self))
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if self.failures > 0 {
            self.failures -= 1;
            return Err(CameraError::ReadFailed {
                camera: self.name.clone(),
                reason: "no frame yet".to_string(),
            });
        }
        if self.frames == 0 {
            return Err(CameraError::StreamEnded {
                camera: self.name.clone(),
            });
        }
        self.frames -= 1;
        Ok(Frame::rgb(vec![0; 12], WIDTH, HEIGHT))
    }

    fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Quick probing for tests.
pub fn fast_probe() -> ProbeSettings {
    ProbeSettings {
        attempts: 5,
        backoff: Duration::from_millis(1),
    }
}

/// Nose-only landmark set at a pixel position of a 200x200 frame.
pub fn nose_at(px: f64, py: f64) -> LandmarkSet {
    LandmarkSet::new(vec![Landmark::new(
        px / f64::from(WIDTH),
        py / f64::from(HEIGHT),
        -0.1,
        0.9,
    )])
}

/// Estimator replaying one scripted reply per frame, then `Ok(None)`.
pub struct ScriptedEstimator {
    replies: VecDeque<Result<Option<LandmarkSet>, PoseError>>,
    pub calls: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedEstimator {
    pub fn new(replies: Vec<Result<Option<LandmarkSet>, PoseError>>) -> Self {
        Self {
            replies: replies.into(),
            calls: Arc::default(),
            closes: Arc::default(),
        }
    }
}

impl PoseEstimator for ScriptedEstimator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn estimate(&mut self, _frame: &Frame) -> Result<Option<LandmarkSet>, PoseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies.pop_front().unwrap_or(Ok(None))
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keys replaying one scripted poll result per iteration.
pub struct ScriptedKeys(pub VecDeque<Option<KeyCommand>>);

impl ScriptedKeys {
    pub fn new(polls: Vec<Option<KeyCommand>>) -> Self {
        Self(polls.into())
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> Option<KeyCommand> {
        self.0.pop_front().flatten()
    }
}
