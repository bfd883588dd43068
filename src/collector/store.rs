//! In-memory store for the latest pose received by the collector.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One joint as the collector keeps it.
///
/// Only `x`/`y` are interpreted; any other reported fields (`moving`,
/// `speed`, ...) are kept as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremityPoint {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExtremityPoint {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            extra: serde_json::Map::new(),
        }
    }
}

/// Canonical pose record held by the collector.
///
/// Top-level fields other than the ones below are stored and served back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedPose {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_mode: Option<String>,
    pub extremities: BTreeMap<String, ExtremityPoint>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CollectedPose {
    /// Record with only a `nose` joint.
    pub fn nose(x: f64, y: f64) -> Self {
        Self {
            timestamp: None,
            camera_mode: None,
            extremities: BTreeMap::from([("nose".to_string(), ExtremityPoint::at(x, y))]),
            extra: serde_json::Map::new(),
        }
    }
}

impl Default for CollectedPose {
    /// Centered placeholder served before the first update.
    fn default() -> Self {
        let extremities = ["nose", "left_wrist", "right_wrist"]
            .into_iter()
            .map(|name| (name.to_string(), ExtremityPoint::at(0.5, 0.5)))
            .collect();
        Self {
            timestamp: None,
            camera_mode: None,
            extremities,
            extra: serde_json::Map::new(),
        }
    }
}

/// Shared handle to the latest pose. Cloning shares the same record.
#[derive(Debug, Clone, Default)]
pub struct PoseStore {
    inner: Arc<RwLock<CollectedPose>>,
}

impl PoseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> CollectedPose {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, pose: CollectedPose) {
        *self.inner.write().await = pose;
    }
}
