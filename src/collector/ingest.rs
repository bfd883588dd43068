//! Decoding of incoming pose updates.
//!
//! Two shapes are accepted and normalized to [`CollectedPose`]:
//! a full `{"extremities": {...}}` record, or a legacy single point
//! `{"x": .., "y": ..}` which becomes the `nose` joint.

use serde::Deserialize;
use thiserror::Error;

use super::store::CollectedPose;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IncomingPose {
    Extremities(CollectedPose),
    Legacy { x: f64, y: f64 },
}

impl From<IncomingPose> for CollectedPose {
    fn from(incoming: IncomingPose) -> Self {
        match incoming {
            IncomingPose::Extremities(pose) => pose,
            IncomingPose::Legacy { x, y } => CollectedPose::nose(x, y),
        }
    }
}

/// What to do with a decoded body.
#[derive(Debug, PartialEq)]
pub enum Ingest {
    Update(CollectedPose),
    /// Valid JSON object of neither shape
    Ignored,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("malformed pose record: {0}")]
    Malformed(String),
}

/// Decode one request body.
pub fn decode(body: &[u8]) -> Result<Ingest, IngestError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let looks_like_pose = match value.as_object() {
        Some(object) => {
            object.contains_key("extremities")
                || (object.contains_key("x") && object.contains_key("y"))
        }
        None => return Err(IngestError::NotAnObject),
    };

    match serde_json::from_value::<IncomingPose>(value) {
        Ok(incoming) => Ok(Ingest::Update(incoming.into())),
        Err(e) if looks_like_pose => Err(IngestError::Malformed(e.to_string())),
        Err(_) => Ok(Ingest::Ignored),
    }
}
