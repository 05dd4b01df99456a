//! `/liveness` route group: stateless per-frame analysis. Clients call
//! these while capturing and aggregate the outcomes into the liveness
//! claim they submit with a face or gesture attempt.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;

use checkin::ExtractError;
use checkin::liveness::{analyze_blink, analyze_head_pose};

use crate::response::ApiResponse;
use crate::routes::checkins::common::{decode_image, error_response};
use crate::state::AppState;

pub fn liveness_routes() -> Router<AppState> {
    Router::new()
        .route("/blink", post(blink))
        .route("/head-pose", post(head_pose))
}

#[derive(Deserialize)]
pub struct FrameReq {
    pub image_b64: String,
}

/// POST /api/liveness/blink
pub async fn blink(State(state): State<AppState>, Json(body): Json<FrameReq>) -> Response {
    let frame = match decode_image(&body.image_b64) {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    match state.landmarks().landmarks(&frame).await {
        Ok(landmarks) => {
            let obs = analyze_blink(&landmarks);
            (
                StatusCode::OK,
                Json(ApiResponse::success(obs, "Frame analyzed")),
            )
                .into_response()
        }
        Err(e) => frame_error(e),
    }
}

/// POST /api/liveness/head-pose
pub async fn head_pose(State(state): State<AppState>, Json(body): Json<FrameReq>) -> Response {
    let frame = match decode_image(&body.image_b64) {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    match state.landmarks().landmarks(&frame).await {
        Ok(landmarks) => {
            let obs = analyze_head_pose(&landmarks);
            (
                StatusCode::OK,
                Json(ApiResponse::success(obs, "Frame analyzed")),
            )
                .into_response()
        }
        Err(e) => frame_error(e),
    }
}

fn frame_error(err: ExtractError) -> Response {
    match err {
        ExtractError::NoFace => {
            error_response(StatusCode::BAD_REQUEST, "No face detected in the frame")
        }
        ExtractError::Failed(msg) => {
            error_response(StatusCode::BAD_GATEWAY, format!("Face service error: {msg}"))
        }
    }
}
