//! `/faces` route group: face enrollment lifecycle.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;

use checkin::ExtractError;
use db::models::user_face;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::checkins::common::{decode_image, error_response};
use crate::state::AppState;

pub fn faces_routes() -> Router<AppState> {
    Router::new().route("/enroll", post(enroll_face).delete(delete_face))
}

#[derive(Deserialize)]
pub struct EnrollReq {
    pub image_b64: String,
}

/// POST /api/faces/enroll
///
/// Extract an embedding from the submitted photo and store it for the
/// caller. Re-enrolling overwrites the previous embedding.
pub async fn enroll_face(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<EnrollReq>,
) -> Response {
    let image = match decode_image(&body.image_b64) {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    let embedding = match state.extractor().extract(&image).await {
        Ok(e) => e,
        Err(ExtractError::NoFace) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "No face detected in the submitted image",
            );
        }
        Err(ExtractError::Failed(msg)) => {
            return error_response(StatusCode::BAD_GATEWAY, format!("Face service error: {msg}"));
        }
    };

    match user_face::Model::register(state.db(), claims.sub, &embedding).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Face enrolled")),
        )
            .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to store enrollment: {e}"),
        ),
    }
}

/// DELETE /api/faces/enroll
pub async fn delete_face(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    match user_face::Model::remove(state.db(), claims.sub).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Face enrollment removed")),
        )
            .into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "No enrolled face to remove"),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to remove enrollment: {e}"),
        ),
    }
}
