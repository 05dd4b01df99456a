//! Shared request/response shapes and error mapping for the check-in
//! routes.

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use checkin::{LivenessClaim, RecordStatus, VerifyError};
use chrono::{DateTime, Utc};
use db::models::attendance_session::{CheckinMode, Model as Session};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::response::ApiResponse;

#[derive(Deserialize)]
pub struct CreateSessionReq {
    pub group_id: i64,
    pub title: String,
    pub mode: CheckinMode,
    pub duration_minutes: Option<i32>,
    pub gesture_digit: Option<u8>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_m: Option<f64>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub group_id: i64,
    pub creator_id: i64,
    pub title: String,
    pub mode: CheckinMode,
    /// Join code, visible to the session creator only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_digit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_m: Option<f64>,
    pub duration_minutes: i32,
    pub status: db::models::attendance_session::Status,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_count: Option<u64>,
}

impl SessionResponse {
    /// Build the response a given viewer is allowed to see. The display
    /// status is recomputed so lazily-expired sessions read as ended.
    pub fn for_viewer(session: &Session, claims: &Claims, now: DateTime<Utc>) -> Self {
        let is_creator = claims.sub == session.creator_id || claims.admin;
        Self {
            id: session.id,
            group_id: session.group_id,
            creator_id: session.creator_id,
            title: session.title.clone(),
            mode: session.mode,
            code: is_creator.then(|| session.code.clone()),
            gesture_digit: session.gesture_digit,
            latitude: session.location_lat,
            longitude: session.location_lng,
            radius_m: session.location_radius_m,
            duration_minutes: session.duration_minutes,
            status: session.display_status(now),
            created_at: session.created_at,
            end_time: session.end_time,
            checked_count: None,
        }
    }

    pub fn with_checked_count(mut self, count: u64) -> Self {
        self.checked_count = Some(count);
        self
    }
}

#[derive(Deserialize)]
pub struct CodeAttemptReq {
    pub code: String,
}

#[derive(Deserialize)]
pub struct LocationAttemptReq {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
pub struct FaceAttemptReq {
    pub image_b64: String,
    pub liveness: LivenessClaim,
}

#[derive(Deserialize)]
pub struct GestureAttemptReq {
    pub image_b64: String,
    pub detected_gesture: u8,
    pub liveness: LivenessClaim,
}

#[derive(Deserialize)]
pub struct GroupPhotoReq {
    pub image_b64: String,
}

/// Outcome payload of a single-subject attempt. Rejections that carry a
/// measurement (similarity, distance) reuse this shape so the client can
/// show how close the attempt was.
#[derive(Serialize, Default)]
pub struct AttemptResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_gesture: Option<u8>,
}

#[derive(Serialize)]
pub struct MatchedSubject {
    pub user_id: i64,
    pub similarity: f64,
}

#[derive(Serialize)]
pub struct GroupAttemptResponse {
    pub status: RecordStatus,
    pub detected_faces: usize,
    pub matched: Vec<MatchedSubject>,
    /// How many of the matches were persisted as new records.
    pub marked_count: usize,
}

#[derive(Serialize)]
pub struct RecordEntry {
    pub user_id: i64,
    pub status: db::models::attendance_record::Status,
    pub taken_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_gesture: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_image_path: Option<String>,
}

#[derive(Serialize)]
pub struct RecordsResponse {
    pub checked: Vec<RecordEntry>,
    pub absent: Vec<i64>,
    pub checked_count: usize,
    pub absent_count: usize,
}

/// HTTP status for a verification rejection.
pub fn verify_status(err: &VerifyError) -> StatusCode {
    match err {
        VerifyError::SessionNotFound => StatusCode::NOT_FOUND,
        VerifyError::PermissionDenied => StatusCode::FORBIDDEN,
        VerifyError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Error response for an attempt, carrying the rejection's measurement in
/// the data payload when it has one.
pub fn attempt_error(err: &VerifyError) -> Response {
    let data = AttemptResponse {
        status: None,
        similarity: err.similarity(),
        distance_m: err.distance_m(),
        detected_gesture: None,
    };
    (
        verify_status(err),
        Json(ApiResponse {
            success: false,
            data,
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// Plain error envelope with empty data.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<crate::auth::guards::Empty>::error(message)),
    )
        .into_response()
}

/// Decode a base64 image field, answering 400 on garbage input.
pub fn decode_image(b64: &str) -> Result<Vec<u8>, Response> {
    BASE64
        .decode(b64.trim())
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid base64 image"))
}
