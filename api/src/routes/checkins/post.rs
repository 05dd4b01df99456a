//! Write routes: session creation, explicit close, and the five check-in
//! attempt endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use log::warn;
use sea_orm::EntityTrait;

use checkin::{Evidence, RecordStatus, SubjectContext, Verdict, VerifyError};
use db::models::{
    attendance_record::{self, MarkError},
    attendance_session::{self, CreateSessionError},
    chat_group, group_member, user_face,
};

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

use super::common::{
    AttemptResponse, CodeAttemptReq, CreateSessionReq, FaceAttemptReq, GestureAttemptReq,
    GroupAttemptResponse, GroupPhotoReq, LocationAttemptReq, MatchedSubject, SessionResponse,
    attempt_error, decode_image, error_response,
};

/// POST /api/checkins
///
/// Create a check-in session for a group. Only the group owner (or an
/// admin) may start one.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CreateSessionReq>,
) -> Response {
    let db = state.db();

    let group = match chat_group::Entity::find_by_id(body.group_id)
        .one(db)
        .await
    {
        Ok(Some(g)) => g,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Group not found"),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load group: {e}"),
            );
        }
    };
    if group.owner_id != claims.sub && !claims.admin {
        return error_response(
            StatusCode::FORBIDDEN,
            "Only the group owner may start a check-in session",
        );
    }

    let duration = body.duration_minutes.unwrap_or(10).clamp(1, 24 * 60);
    let params = attendance_session::SessionParams {
        gesture_digit: body.gesture_digit,
        latitude: body.latitude,
        longitude: body.longitude,
        radius_m: body.radius_m,
    };

    match attendance_session::Model::create(
        db,
        body.group_id,
        claims.sub,
        &body.title,
        body.mode,
        params,
        duration,
        Utc::now(),
    )
    .await
    {
        Ok(row) => {
            let resp = SessionResponse::for_viewer(&row, &claims, Utc::now());
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(resp, "Check-in session created")),
            )
                .into_response()
        }
        Err(e @ CreateSessionError::InvalidGestureDigit)
        | Err(e @ CreateSessionError::MissingLocation) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(CreateSessionError::Db(e)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to create session: {e}"),
        ),
    }
}

/// POST /api/checkins/{id}/close
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    let db = state.db();

    let session = match attendance_session::Model::find_by_id(db, session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Check-in session not found"),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load session: {e}"),
            );
        }
    };
    if session.creator_id != claims.sub && !claims.admin {
        return error_response(
            StatusCode::FORBIDDEN,
            VerifyError::PermissionDenied.to_string(),
        );
    }

    match session.close(db).await {
        Ok(closed) => {
            let resp = SessionResponse::for_viewer(&closed, &claims, Utc::now());
            (
                StatusCode::OK,
                Json(ApiResponse::success(resp, "Check-in session closed")),
            )
                .into_response()
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to close session: {e}"),
        ),
    }
}

/// POST /api/checkins/{id}/attempts/code
pub async fn attempt_code(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CodeAttemptReq>,
) -> Response {
    run_attempt(
        &state,
        session_id,
        claims.sub,
        Evidence::Code { code: body.code },
        None,
    )
    .await
}

/// POST /api/checkins/{id}/attempts/location
pub async fn attempt_location(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<LocationAttemptReq>,
) -> Response {
    run_attempt(
        &state,
        session_id,
        claims.sub,
        Evidence::Location {
            lat: body.latitude,
            lng: body.longitude,
        },
        None,
    )
    .await
}

/// POST /api/checkins/{id}/attempts/face
pub async fn attempt_face(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<FaceAttemptReq>,
) -> Response {
    let image = match decode_image(&body.image_b64) {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };
    run_attempt(
        &state,
        session_id,
        claims.sub,
        Evidence::Face {
            image: image.clone(),
            liveness: body.liveness,
        },
        Some(image),
    )
    .await
}

/// POST /api/checkins/{id}/attempts/gesture
pub async fn attempt_gesture(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<GestureAttemptReq>,
) -> Response {
    let image = match decode_image(&body.image_b64) {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };
    run_attempt(
        &state,
        session_id,
        claims.sub,
        Evidence::Gesture {
            digit: body.detected_gesture,
            image: image.clone(),
            liveness: body.liveness,
        },
        Some(image),
    )
    .await
}

/// POST /api/checkins/{id}/attempts/group-photo
///
/// Creator-driven roll call: one photograph, one record per recognized
/// roster member who has not checked in yet.
pub async fn attempt_group_photo(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<GroupPhotoReq>,
) -> Response {
    let db = state.db();
    let photo = match decode_image(&body.image_b64) {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    let session = match attendance_session::Model::find_by_id(db, session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return attempt_error(&VerifyError::SessionNotFound),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load session: {e}"),
            );
        }
    };
    let view = match session.view() {
        Ok(v) => v,
        Err(e) => return attempt_error(&e),
    };

    // Gallery: roster members who are enrolled and not yet checked in.
    let roster = match group_member::Model::member_ids(db, session.group_id).await {
        Ok(ids) => ids,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load roster: {e}"),
            );
        }
    };
    let records = match attendance_record::Model::for_session(db, session_id).await {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load records: {e}"),
            );
        }
    };
    let checked: std::collections::HashSet<i64> = records.iter().map(|r| r.user_id).collect();
    let eligible: Vec<i64> = roster
        .into_iter()
        .filter(|id| !checked.contains(id))
        .collect();
    let gallery = match user_face::Model::gallery_for(db, &eligible).await {
        Ok(g) => g,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load gallery: {e}"),
            );
        }
    };

    let now = Utc::now();
    let verdict = match state
        .engine()
        .verify_group_photo(&view, claims.sub, &gallery, &photo, now)
        .await
    {
        Ok(v) => v,
        Err(e) => return attempt_error(&e),
    };

    let mut marked = 0usize;
    for hit in &verdict.matched {
        let record = Verdict {
            status: verdict.status,
            similarity: Some(hit.similarity),
            distance_m: None,
            detected_gesture: None,
        };
        match attendance_record::Model::mark(db, session_id, hit.subject_id, &record, now, None)
            .await
        {
            Ok(_) => marked += 1,
            // Lost a race with the subject's own check-in; their record
            // stands.
            Err(MarkError::AlreadyCheckedIn) => {}
            Err(MarkError::Db(e)) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to record attendance: {e}"),
                );
            }
        }
    }

    let resp = GroupAttemptResponse {
        status: verdict.status,
        detected_faces: verdict.detected_faces,
        matched: verdict
            .matched
            .iter()
            .map(|m| MatchedSubject {
                user_id: m.subject_id,
                similarity: m.similarity,
            })
            .collect(),
        marked_count: marked,
    };
    (
        StatusCode::OK,
        Json(ApiResponse::success(
            resp,
            format!("Roll call complete: {marked} member(s) marked"),
        )),
    )
        .into_response()
}

/// Shared path for the four single-subject attempt endpoints: load and
/// project the session, assemble the subject context, run the engine, then
/// persist the verdict and the evidence snapshot.
async fn run_attempt(
    state: &AppState,
    session_id: i64,
    user_id: i64,
    evidence: Evidence,
    evidence_image: Option<Vec<u8>>,
) -> Response {
    let db = state.db();

    let session = match attendance_session::Model::find_by_id(db, session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return attempt_error(&VerifyError::SessionNotFound),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load session: {e}"),
            );
        }
    };
    let view = match session.view() {
        Ok(v) => v,
        Err(e) => return attempt_error(&e),
    };

    let is_member = match group_member::Model::is_member(db, session.group_id, user_id).await {
        Ok(m) => m,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to check membership: {e}"),
            );
        }
    };
    if !is_member {
        return error_response(StatusCode::FORBIDDEN, "Not a member of this group");
    }

    let enrolled = match user_face::Model::embedding_for(db, user_id).await {
        Ok(e) => e,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load enrollment: {e}"),
            );
        }
    };
    let already_checked = match attendance_record::Model::exists(db, session_id, user_id).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to check records: {e}"),
            );
        }
    };
    let subject = SubjectContext {
        subject_id: user_id,
        enrolled,
        already_checked,
    };

    let now = Utc::now();
    let verdict = match state.engine().verify(&view, &subject, evidence, now).await {
        Ok(v) => v,
        Err(e) => return attempt_error(&e),
    };

    let evidence_path = evidence_image
        .and_then(|bytes| save_evidence(state.upload_dir(), session_id, user_id, &bytes));

    match attendance_record::Model::mark(db, session_id, user_id, &verdict, now, evidence_path)
        .await
    {
        Ok(_) => {}
        Err(MarkError::AlreadyCheckedIn) => {
            return attempt_error(&VerifyError::AlreadyCheckedIn);
        }
        Err(MarkError::Db(e)) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to record attendance: {e}"),
            );
        }
    }

    let message = match verdict.status {
        RecordStatus::Checked => "Checked in",
        RecordStatus::Late => "Checked in late",
    };
    let resp = AttemptResponse {
        status: Some(verdict.status),
        similarity: verdict.similarity,
        distance_m: verdict.distance_m,
        detected_gesture: verdict.detected_gesture,
    };
    (StatusCode::OK, Json(ApiResponse::success(resp, message))).into_response()
}

/// Persist the submitted image under the upload directory. Failures are
/// logged and the check-in proceeds without a snapshot.
fn save_evidence(upload_dir: &str, session_id: i64, user_id: i64, bytes: &[u8]) -> Option<String> {
    let dir = std::path::Path::new(upload_dir).join("evidence");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("Failed to create evidence directory {}: {e}", dir.display());
        return None;
    }
    let path = dir.join(format!("{session_id}_{user_id}.jpg"));
    match std::fs::write(&path, bytes) {
        Ok(()) => Some(path.to_string_lossy().into_owned()),
        Err(e) => {
            warn!("Failed to write evidence snapshot {}: {e}", path.display());
            None
        }
    }
}
