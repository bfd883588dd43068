//! Visualization overlay for the tracking view.
//!
//! The loop describes what should be drawn as a [`Scene`]; a [`Visualizer`]
//! turns it into output. Actual drawing is left to the visualizer.

use crate::camera::Frame;
use crate::tracker::Observations;

/// Marker radius in pixels.
pub const MARKER_RADIUS: u32 = 10;

/// First status line baseline and spacing between lines.
const LABEL_TOP: i32 = 30;
const LABEL_STEP: i32 = 20;
const LABEL_LEFT: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    Moving,
    Still,
}

impl MarkerColor {
    /// RGB components: green when moving, red when still.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            MarkerColor::Moving => (0, 255, 0),
            MarkerColor::Still => (255, 0, 0),
        }
    }
}

/// Circle on one joint plus its status line.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMarker {
    pub center: (i32, i32),
    pub radius: u32,
    pub color: MarkerColor,
    pub label: String,
    pub label_origin: (i32, i32),
}

/// Build one marker per observed joint.
pub fn joint_markers(observations: &Observations) -> Vec<JointMarker> {
    observations
        .iter()
        .zip(0..)
        .map(|((name, obs), row)| {
            let color = if obs.moving {
                MarkerColor::Moving
            } else {
                MarkerColor::Still
            };
            let state = if obs.moving { "MOVING" } else { "STILL" };
            JointMarker {
                center: (obs.pixel_x as i32, obs.pixel_y as i32),
                radius: MARKER_RADIUS,
                color,
                label: format!("{}: {} ({})", name, state, obs.speed as i64),
                label_origin: (LABEL_LEFT, LABEL_TOP + row * LABEL_STEP),
            }
        })
        .collect()
}

/// Everything to show for one iteration.
#[derive(Debug)]
pub struct Scene<'a> {
    pub primary: &'a Frame,
    pub secondary: Option<&'a Frame>,
    pub markers: Vec<JointMarker>,
    /// Transient notice, e.g. after a calibration
    pub banner: Option<&'a str>,
}

/// Output for the tracking view.
pub trait Visualizer {
    fn render(&mut self, scene: &Scene<'_>);

    fn close(&mut self) {}
}

/// Visualizer that writes the scene to the log.
#[derive(Debug, Default)]
pub struct LogVisualizer {
    frames: u64,
}

impl Visualizer for LogVisualizer {
    fn render(&mut self, scene: &Scene<'_>) {
        self.frames += 1;
        log::trace!(
            "frame {} ({}x{}{}), {} joints",
            self.frames,
            scene.primary.width,
            scene.primary.height,
            if scene.secondary.is_some() { ", stereo" } else { "" },
            scene.markers.len()
        );
        for marker in &scene.markers {
            log::trace!("  {}", marker.label);
        }
        if let Some(banner) = scene.banner {
            log::debug!("{}", banner);
        }
    }

    fn close(&mut self) {
        log::debug!("Visualizer closed after {} frames", self.frames);
    }
}
