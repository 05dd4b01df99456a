//! `/checkins` route group: session lifecycle plus the per-mode attempt
//! endpoints.

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub mod common;
pub mod get;
pub mod post;

pub use get::{get_records, get_session, list_active, list_mine};
pub use post::{
    attempt_code, attempt_face, attempt_gesture, attempt_group_photo, attempt_location,
    close_session, create_session,
};

pub fn checkins_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/active", get(list_active))
        .route("/mine", get(list_mine))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}/close", post(close_session))
        .route("/{session_id}/records", get(get_records))
        .route("/{session_id}/attempts/code", post(attempt_code))
        .route("/{session_id}/attempts/location", post(attempt_location))
        .route("/{session_id}/attempts/face", post(attempt_face))
        .route("/{session_id}/attempts/gesture", post(attempt_gesture))
        .route("/{session_id}/attempts/group-photo", post(attempt_group_photo))
}
