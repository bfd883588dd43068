//! Telemetry payload and its wire form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sanitize::Sanitize;
use crate::camera::CameraMode;
use crate::tracker::{LandmarkObservation, Observations};

/// What one dispatch reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub camera_mode: CameraMode,
    pub extremities: Observations,
}

/// Sanitized observation as sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireObservation {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub pixel_x: Option<f64>,
    pub pixel_y: Option<f64>,
    pub visibility: Option<f64>,
    pub moving: bool,
    pub speed: Option<f64>,
}

/// Sanitized payload, the body of `POST <collector>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTelemetry {
    pub timestamp: Option<f64>,
    pub camera_mode: CameraMode,
    pub extremities: BTreeMap<String, WireObservation>,
}

impl Sanitize for LandmarkObservation {
    type Output = WireObservation;

    fn sanitize(&self) -> WireObservation {
        WireObservation {
            x: self.x.sanitize(),
            y: self.y.sanitize(),
            z: self.z.sanitize(),
            pixel_x: self.pixel_x.sanitize(),
            pixel_y: self.pixel_y.sanitize(),
            visibility: self.visibility.sanitize(),
            moving: self.moving,
            speed: self.speed.sanitize(),
        }
    }
}

impl Sanitize for WireObservation {
    type Output = WireObservation;

    fn sanitize(&self) -> WireObservation {
        WireObservation {
            x: self.x.sanitize(),
            y: self.y.sanitize(),
            z: self.z.sanitize(),
            pixel_x: self.pixel_x.sanitize(),
            pixel_y: self.pixel_y.sanitize(),
            visibility: self.visibility.sanitize(),
            moving: self.moving,
            speed: self.speed.sanitize(),
        }
    }
}

impl Sanitize for TelemetryPayload {
    type Output = WireTelemetry;

    fn sanitize(&self) -> WireTelemetry {
        WireTelemetry {
            timestamp: self.timestamp.sanitize(),
            camera_mode: self.camera_mode,
            extremities: self
                .extremities
                .iter()
                .map(|(name, obs)| (name.clone(), obs.sanitize()))
                .collect(),
        }
    }
}

impl Sanitize for WireTelemetry {
    type Output = WireTelemetry;

    fn sanitize(&self) -> WireTelemetry {
        WireTelemetry {
            timestamp: self.timestamp.sanitize(),
            camera_mode: self.camera_mode,
            extremities: self
                .extremities
                .iter()
                .map(|(name, obs)| (name.clone(), obs.sanitize()))
                .collect(),
        }
    }
}
