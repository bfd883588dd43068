//! Per-joint motion tracking.
//!
//! Extracts the configured extremities from a landmark set, converts them to
//! pixel space, and classifies each one as moving or still by comparing it
//! with its last visible position.

use std::collections::{BTreeMap, HashMap};

use crate::pose::LandmarkSet;

/// Minimum pixel displacement that counts as movement (strictly greater).
pub const DEFAULT_SENSITIVITY: f64 = 3.0;

/// Landmarks below this visibility are ignored for the frame.
pub const DEFAULT_MIN_VISIBILITY: f64 = 0.5;

/// Tracked joints and their MediaPipe pose ordinals.
pub const DEFAULT_EXTREMITIES: &[(&str, usize)] = &[
    ("nose", 0),
    ("left_shoulder", 11),
    ("right_shoulder", 12),
    ("left_elbow", 13),
    ("right_elbow", 14),
    ("left_wrist", 15),
    ("right_wrist", 16),
    ("left_hip", 23),
    ("right_hip", 24),
    ("left_knee", 25),
    ("right_knee", 26),
    ("left_ankle", 27),
    ("right_ankle", 28),
    ("left_foot_index", 31),
    ("right_foot_index", 32),
];

/// The default joint table as an owned name -> ordinal map.
pub fn default_extremities() -> BTreeMap<String, usize> {
    DEFAULT_EXTREMITIES
        .iter()
        .map(|(name, ordinal)| (name.to_string(), *ordinal))
        .collect()
}

/// State of one joint in the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkObservation {
    /// Normalized X, what gets reported outward
    pub x: f64,
    /// Normalized Y, what gets reported outward
    pub y: f64,
    /// Raw depth hint from the estimator
    pub z: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub visibility: f64,
    pub moving: bool,
    /// Pixel displacement since the last visible observation
    pub speed: f64,
}

/// Observations of one frame keyed by joint name.
pub type Observations = BTreeMap<String, LandmarkObservation>;

/// Motion tracker for a fixed set of joints.
#[derive(Debug, Clone)]
pub struct ExtremityTracker {
    extremities: BTreeMap<String, usize>,
    sensitivity: f64,
    min_visibility: f64,
    previous: HashMap<String, (f64, f64)>,
}

impl Default for ExtremityTracker {
    fn default() -> Self {
        Self::new(default_extremities())
    }
}

impl ExtremityTracker {
    pub fn new(extremities: BTreeMap<String, usize>) -> Self {
        Self {
            extremities,
            sensitivity: DEFAULT_SENSITIVITY,
            min_visibility: DEFAULT_MIN_VISIBILITY,
            previous: HashMap::new(),
        }
    }

    /// Set the movement threshold in pixels.
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Set the visibility gate.
    pub fn with_min_visibility(mut self, min_visibility: f64) -> Self {
        self.min_visibility = min_visibility;
        self
    }

    /// Last visible pixel position of a joint.
    pub fn previous_position(&self, name: &str) -> Option<(f64, f64)> {
        self.previous.get(name).copied()
    }

    /// Track one landmark set captured at `width` x `height`.
    ///
    /// Returns `None` when the estimator produced no landmarks at all. Joints
    /// whose ordinal is out of range or whose visibility is below the gate are
    /// left out and their stored position is not touched.
    pub fn track(
        &mut self,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
    ) -> Option<Observations> {
        if landmarks.is_empty() {
            return None;
        }

        let mut observations = Observations::new();

        for (name, &ordinal) in &self.extremities {
            let Some(landmark) = landmarks.get(ordinal) else {
                continue;
            };

            let (pixel_x, pixel_y) = landmark.to_pixel(width, height);
            let visibility = landmark.visibility;

            if visibility.is_nan() || visibility < self.min_visibility {
                continue;
            }

            let (moving, speed) = match self.previous.get(name) {
                Some(&(prev_x, prev_y)) => {
                    let distance = (pixel_x - prev_x).hypot(pixel_y - prev_y);
                    (distance > self.sensitivity, distance)
                }
                None => (false, 0.0),
            };

            self.previous.insert(name.clone(), (pixel_x, pixel_y));

            observations.insert(
                name.clone(),
                LandmarkObservation {
                    x: landmark.x,
                    y: landmark.y,
                    z: landmark.z,
                    pixel_x,
                    pixel_y,
                    visibility,
                    moving,
                    speed,
                },
            );
        }

        Some(observations)
    }
}
