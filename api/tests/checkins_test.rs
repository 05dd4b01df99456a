//! End-to-end tests for the check-in routes, driven through the router
//! with a stubbed face service.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use api::auth::generate_jwt;
use db::models::{
    attendance_session::{CheckinMode, Model as Session, SessionParams},
    chat_group::Model as Group,
    group_member::{MemberRole, Model as Member},
    user::Model as User,
};

use helpers::{b64, json_body, make_test_app};

struct TestData {
    owner: User,
    student: User,
    group_id: i64,
}

async fn setup(db: &sea_orm::DatabaseConnection) -> TestData {
    let owner = User::create(db, "owner", "owner@test.com", "password", false)
        .await
        .expect("Failed to create owner");
    let student = User::create(db, "student", "student@test.com", "password", false)
        .await
        .expect("Failed to create student");
    let group = Group::create(db, "COS 301", owner.id)
        .await
        .expect("Failed to create group");
    Member::add(db, group.id, student.id, MemberRole::Member)
        .await
        .expect("Failed to add member");
    TestData {
        owner,
        student,
        group_id: group.id,
    }
}

fn post(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn create_session_is_owner_only() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let body = json!({
        "group_id": data.group_id,
        "title": "Lecture 1",
        "mode": "code",
    });

    let (student_token, _) = generate_jwt(data.student.id, false);
    let resp = app
        .clone()
        .oneshot(post("/api/checkins", &student_token, body.clone()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (owner_token, _) = generate_jwt(data.owner.id, false);
    let resp = app
        .oneshot(post("/api/checkins", &owner_token, body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let json = json_body(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "active");
    assert_eq!(json["data"]["code"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn code_attempt_matches_case_insensitively() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Lecture",
        CheckinMode::Code,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (token, _) = generate_jwt(data.student.id, false);
    let uri = format!("/api/checkins/{}/attempts/code", session.id);

    let resp = app
        .clone()
        .oneshot(post(&uri, &token, json!({ "code": "WRONG999" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let lowered = session.code.to_lowercase();
    let resp = app
        .clone()
        .oneshot(post(&uri, &token, json!({ "code": lowered })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["status"], "checked");

    // A second submit by the same student changes nothing.
    let resp = app
        .oneshot(post(&uri, &token, json!({ "code": session.code })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["message"], "attendance already recorded for this session");
}

#[tokio::test]
async fn attempts_require_group_membership() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let outsider = User::create(state.db(), "outsider", "out@test.com", "password", false)
        .await
        .unwrap();
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Lecture",
        CheckinMode::Code,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (token, _) = generate_jwt(outsider.id, false);
    let uri = format!("/api/checkins/{}/attempts/code", session.id);
    let resp = app
        .oneshot(post(&uri, &token, json!({ "code": session.code })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn location_attempt_reports_distance() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Prac",
        CheckinMode::Location,
        SessionParams {
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..Default::default()
        },
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (token, _) = generate_jwt(data.student.id, false);
    let uri = format!("/api/checkins/{}/attempts/location", session.id);
    let near_lat = (49.9_f64 / checkin::geofence::EARTH_RADIUS_M).to_degrees();
    let far_lat = (120.0_f64 / checkin::geofence::EARTH_RADIUS_M).to_degrees();

    let resp = app
        .clone()
        .oneshot(post(
            &uri,
            &token,
            json!({ "latitude": far_lat, "longitude": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["data"]["distance_m"], 120.0);

    let resp = app
        .oneshot(post(
            &uri,
            &token,
            json!({ "latitude": near_lat, "longitude": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["status"], "checked");
    assert_eq!(json["data"]["distance_m"], 49.9);
}

#[tokio::test]
async fn face_attempt_needs_enrollment_and_liveness() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Lecture",
        CheckinMode::Face,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (token, _) = generate_jwt(data.student.id, false);
    let uri = format!("/api/checkins/{}/attempts/face", session.id);
    let live = json!({ "blink_detected": true, "head_turn_detected": true });

    // Not enrolled yet.
    let resp = app
        .clone()
        .oneshot(post(
            &uri,
            &token,
            json!({ "image_b64": b64(b"alice"), "liveness": live }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Enroll, then fail liveness.
    let resp = app
        .clone()
        .oneshot(post(
            "/api/faces/enroll",
            &token,
            json!({ "image_b64": b64(b"alice") }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(post(
            &uri,
            &token,
            json!({
                "image_b64": b64(b"alice"),
                "liveness": { "blink_detected": false, "head_turn_detected": true },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["message"], "liveness check failed: blink not detected");

    // Passing liveness with the enrolled face.
    let resp = app
        .oneshot(post(
            &uri,
            &token,
            json!({ "image_b64": b64(b"alice"), "liveness": live }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["similarity"], 100.0);
}

#[tokio::test]
async fn gesture_attempt_checks_digit_before_face() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Lecture",
        CheckinMode::Gesture,
        SessionParams {
            gesture_digit: Some(3),
            ..Default::default()
        },
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (token, _) = generate_jwt(data.student.id, false);
    db::models::user_face::Model::register(state.db(), data.student.id, &[1.0, 0.0])
        .await
        .unwrap();

    let uri = format!("/api/checkins/{}/attempts/gesture", session.id);
    let live = json!({ "blink_detected": true, "head_turn_detected": true });

    let resp = app
        .clone()
        .oneshot(post(
            &uri,
            &token,
            json!({ "image_b64": b64(b"alice"), "detected_gesture": 5, "liveness": live }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["message"], "wrong gesture; show the number 3");

    let resp = app
        .oneshot(post(
            &uri,
            &token,
            json!({ "image_b64": b64(b"alice"), "detected_gesture": 3, "liveness": live }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["detected_gesture"], 3);
}

#[tokio::test]
async fn closed_session_rejects_attempts() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Lecture",
        CheckinMode::Code,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (student_token, _) = generate_jwt(data.student.id, false);
    let (owner_token, _) = generate_jwt(data.owner.id, false);

    // Only the creator may close.
    let close_uri = format!("/api/checkins/{}/close", session.id);
    let resp = app
        .clone()
        .oneshot(post(&close_uri, &student_token, json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .clone()
        .oneshot(post(&close_uri, &owner_token, json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["status"], "ended");

    let uri = format!("/api/checkins/{}/attempts/code", session.id);
    let resp = app
        .oneshot(post(&uri, &student_token, json!({ "code": session.code })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["message"], "attendance session has ended");
}

#[tokio::test]
async fn group_photo_roll_call_marks_recognized_members() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let bob = User::create(state.db(), "bob", "bob@test.com", "password", false)
        .await
        .unwrap();
    Member::add(state.db(), data.group_id, bob.id, MemberRole::Member)
        .await
        .unwrap();

    // The stub maps "alice" to [1, 0] and "bob" to [0, 1]; the "group"
    // photo contains both faces.
    db::models::user_face::Model::register(state.db(), data.student.id, &[1.0, 0.0])
        .await
        .unwrap();
    db::models::user_face::Model::register(state.db(), bob.id, &[0.0, 1.0])
        .await
        .unwrap();

    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Roll call",
        CheckinMode::GroupPhoto,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();
    let uri = format!("/api/checkins/{}/attempts/group-photo", session.id);

    // Not the creator.
    let (student_token, _) = generate_jwt(data.student.id, false);
    let resp = app
        .clone()
        .oneshot(post(&uri, &student_token, json!({ "image_b64": b64(b"group") })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (owner_token, _) = generate_jwt(data.owner.id, false);
    let resp = app
        .clone()
        .oneshot(post(&uri, &owner_token, json!({ "image_b64": b64(b"group") })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["detected_faces"], 2);
    assert_eq!(json["data"]["marked_count"], 2);

    // Both members now appear in the records view; the owner is absent
    // (never enrolled, never photographed).
    let records_uri = format!("/api/checkins/{}/records", session.id);
    let resp = app
        .oneshot(get(&records_uri, &owner_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["checked_count"], 2);
    assert_eq!(json["data"]["absent"], json!([data.owner.id]));
}

#[tokio::test]
async fn wrong_evidence_kind_is_a_mode_mismatch() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    let session = Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Roll call",
        CheckinMode::GroupPhoto,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (token, _) = generate_jwt(data.student.id, false);
    let uri = format!("/api/checkins/{}/attempts/code", session.id);
    let resp = app
        .oneshot(post(&uri, &token, json!({ "code": "ABCD1234" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(
        json["message"],
        "submitted evidence does not match the session mode"
    );
}

#[tokio::test]
async fn listings_scope_codes_to_the_creator() {
    let (app, state) = make_test_app().await;
    let data = setup(state.db()).await;
    Session::create(
        state.db(),
        data.group_id,
        data.owner.id,
        "Lecture",
        CheckinMode::Code,
        SessionParams::default(),
        10,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let (student_token, _) = generate_jwt(data.student.id, false);
    let resp = app
        .clone()
        .oneshot(get("/api/checkins/active", &student_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert!(json["data"][0].get("code").is_none());

    let (owner_token, _) = generate_jwt(data.owner.id, false);
    let resp = app
        .oneshot(get("/api/checkins/mine", &owner_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"][0]["code"].as_str().unwrap().len(), 8);
    assert_eq!(json["data"][0]["checked_count"], 0);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (app, _state) = make_test_app().await;

    let req = Request::builder()
        .method("GET")
        .uri("/api/checkins/active")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
