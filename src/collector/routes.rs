//! HTTP routes of the collector.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::ingest::{decode, Ingest};
use super::store::PoseStore;
use super::LOG_TARGET;

pub const UPDATE_PATH: &str = "/api/update-pose/";
pub const GET_PATH: &str = "/api/get-pose/";

/// Build the collector router around `store`.
pub fn create_router(store: PoseStore) -> Router {
    Router::new()
        .route(UPDATE_PATH, post(update_pose).fallback(post_only))
        .route(GET_PATH, get(get_pose))
        .with_state(store)
}

/// Store an incoming pose update.
pub async fn update_pose(State(store): State<PoseStore>, body: Bytes) -> Response {
    match decode(&body) {
        Ok(Ingest::Update(pose)) => {
            log::debug!(
                target: LOG_TARGET,
                "Pose update with {} extremities",
                pose.extremities.len()
            );
            store.replace(pose).await;
        }
        Ok(Ingest::Ignored) => {
            log::debug!(target: LOG_TARGET, "Ignoring body of unknown shape");
        }
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Rejected pose update: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
                .into_response();
        }
    }

    Json(json!({"status": "ok", "received": body.len()})).into_response()
}

async fn post_only() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "POST only"})),
    )
        .into_response()
}

/// Latest pose record.
pub async fn get_pose(State(store): State<PoseStore>) -> impl IntoResponse {
    Json(store.latest().await)
}
