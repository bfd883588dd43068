//! Landmark data returned by a pose estimator.

use serde::{Deserialize, Serialize};

/// A single landmark in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized X coordinate (0.0-1.0 inside the frame)
    pub x: f64,
    /// Normalized Y coordinate (0.0-1.0 inside the frame)
    pub y: f64,
    /// Raw depth hint, roughly in the same scale as `x`
    #[serde(default)]
    pub z: f64,
    /// Confidence that the landmark is visible (0.0-1.0)
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    /// Convert to pixel coordinates for a frame of the given size.
    pub fn to_pixel(&self, width: u32, height: u32) -> (f64, f64) {
        (
            self.x * f64::from(width),
            self.y * f64::from(height),
        )
    }
}

/// All landmarks of one estimated pose, indexed by model ordinal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn get(&self, ordinal: usize) -> Option<&Landmark> {
        self.landmarks.get(ordinal)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Self::new(landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixel() {
        let lm = Landmark::new(0.25, 0.5, 0.0, 1.0);
        assert_eq!(lm.to_pixel(640, 480), (160.0, 240.0));
    }

    #[test]
    fn test_landmark_defaults_when_fields_missing() {
        let lm: Landmark = serde_json::from_str(r#"{"x": 0.1, "y": 0.2}"#).unwrap();
        assert_eq!(lm.z, 0.0);
        assert_eq!(lm.visibility, 0.0);
    }

    #[test]
    fn test_decimal_values_survive_exactly() {
        let lm: Landmark =
            serde_json::from_str(r#"{"x":0.3,"y":0.7,"z":-0.1,"visibility":0.9}"#).unwrap();
        assert_eq!(lm.x, 0.3);
        assert_eq!(
            serde_json::to_string(&lm).unwrap(),
            r#"{"x":0.3,"y":0.7,"z":-0.1,"visibility":0.9}"#
        );
    }

    #[test]
    fn test_set_indexing() {
        let set = LandmarkSet::from(vec![Landmark::new(0.1, 0.1, 0.0, 0.9)]);
        assert_eq!(set.len(), 1);
        assert!(set.get(0).is_some());
        assert!(set.get(1).is_none());
        assert!(!set.is_empty());
        assert!(LandmarkSet::default().is_empty());
    }
}
