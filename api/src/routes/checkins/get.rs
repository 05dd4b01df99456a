//! Read routes: session detail, listings, and the records view.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use db::models::{attendance_record, attendance_session, group_member};

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

use super::common::{RecordEntry, RecordsResponse, SessionResponse, error_response};

/// GET /api/checkins/{id}
///
/// Session detail for a group member or the creator. The displayed status
/// is recomputed, so an expired session reads as ended even before any
/// write has touched the row.
pub async fn get_session(
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

    let allowed = claims.admin
        || session.creator_id == claims.sub
        || group_member::Model::is_member(db, session.group_id, claims.sub)
            .await
            .unwrap_or(false);
    if !allowed {
        return error_response(StatusCode::FORBIDDEN, "Not a member of this group");
    }

    let count = attendance_record::Model::checked_count(db, session_id)
        .await
        .unwrap_or(0);
    let resp =
        SessionResponse::for_viewer(&session, &claims, Utc::now()).with_checked_count(count);
    (
        StatusCode::OK,
        Json(ApiResponse::success(resp, "Session retrieved")),
    )
        .into_response()
}

/// GET /api/checkins/active
///
/// Sessions currently open in any group the caller belongs to.
pub async fn list_active(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    let db = state.db();
    let now = Utc::now();

    let groups = match group_member::Model::group_ids_for(db, claims.sub).await {
        Ok(g) => g,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load memberships: {e}"),
            );
        }
    };
    let sessions = match attendance_session::Model::active_in_groups(db, &groups, now).await {
        Ok(s) => s,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load sessions: {e}"),
            );
        }
    };

    let resp: Vec<SessionResponse> = sessions
        .iter()
        .map(|s| SessionResponse::for_viewer(s, &claims, now))
        .collect();
    (
        StatusCode::OK,
        Json(ApiResponse::success(resp, "Active sessions retrieved")),
    )
        .into_response()
}

/// GET /api/checkins/mine
///
/// Sessions the caller created, each with its checked count.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    let db = state.db();
    let now = Utc::now();

    let sessions = match attendance_session::Model::created_by(db, claims.sub).await {
        Ok(s) => s,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load sessions: {e}"),
            );
        }
    };

    let mut resp = Vec::with_capacity(sessions.len());
    for s in &sessions {
        let count = attendance_record::Model::checked_count(db, s.id)
            .await
            .unwrap_or(0);
        resp.push(SessionResponse::for_viewer(s, &claims, now).with_checked_count(count));
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(resp, "Sessions retrieved")),
    )
        .into_response()
}

/// GET /api/checkins/{id}/records
///
/// Creator-only roll of a session: who checked in (with evidence fields)
/// and who is absent. Absence is computed here as roster minus records,
/// never stored.
pub async fn get_records(
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
        return error_response(StatusCode::FORBIDDEN, "Only the session creator may do this");
    }

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

    let checked_ids: std::collections::HashSet<i64> = records.iter().map(|r| r.user_id).collect();
    let checked: Vec<RecordEntry> = records
        .into_iter()
        .map(|r| RecordEntry {
            user_id: r.user_id,
            status: r.status,
            taken_at: r.taken_at,
            similarity: r.similarity,
            distance_m: r.distance_m,
            detected_gesture: r.detected_gesture,
            evidence_image_path: r.evidence_image_path,
        })
        .collect();
    let absent: Vec<i64> = roster
        .into_iter()
        .filter(|id| !checked_ids.contains(id))
        .collect();

    let resp = RecordsResponse {
        checked_count: checked.len(),
        absent_count: absent.len(),
        checked,
        absent,
    };
    (
        StatusCode::OK,
        Json(ApiResponse::success(resp, "Records retrieved")),
    )
        .into_response()
}
