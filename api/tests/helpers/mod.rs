//! Shared test harness: an app wired to an in-memory database and a
//! stubbed face service.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Router, body::to_bytes, response::Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use api::routes::routes;
use api::state::AppState;
use checkin::{
    EmbeddingExtractor, ExtractError, FaceLandmarks, LandmarkDetector, Point,
};

/// Stand-in for the external face service. Embeddings are keyed on the
/// raw image bytes:
/// - `alice` → `[1, 0]`
/// - `bob` → `[0, 1]`
/// - `group` → both faces
/// - anything else → no face
///
/// Landmark frames: `closed` reads as a blink, `turned` as a head turn,
/// `open` as a neutral centered face.
pub struct StubFace;

fn eye(opening: f64) -> [Point; 6] {
    [
        Point { x: 0.0, y: 0.5 },
        Point { x: 0.3, y: 0.5 - opening / 2.0 },
        Point { x: 0.7, y: 0.5 - opening / 2.0 },
        Point { x: 1.0, y: 0.5 },
        Point { x: 0.7, y: 0.5 + opening / 2.0 },
        Point { x: 0.3, y: 0.5 + opening / 2.0 },
    ]
}

fn face(opening: f64, nose_x: f64) -> FaceLandmarks {
    FaceLandmarks {
        left_eye: eye(opening),
        right_eye: eye(opening),
        nose_tip: Point { x: nose_x, y: 0.6 },
        left_cheek: Point { x: 0.2, y: 0.6 },
        right_cheek: Point { x: 0.8, y: 0.6 },
    }
}

#[async_trait]
impl EmbeddingExtractor for StubFace {
    async fn extract(&self, image: &[u8]) -> Result<Vec<f64>, ExtractError> {
        match image {
            b"alice" => Ok(vec![1.0, 0.0]),
            b"bob" => Ok(vec![0.0, 1.0]),
            _ => Err(ExtractError::NoFace),
        }
    }

    async fn extract_all(&self, image: &[u8]) -> Result<Vec<Vec<f64>>, ExtractError> {
        match image {
            b"group" => Ok(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
            b"alice" => Ok(vec![vec![1.0, 0.0]]),
            _ => Ok(vec![]),
        }
    }
}

#[async_trait]
impl LandmarkDetector for StubFace {
    async fn landmarks(&self, frame: &[u8]) -> Result<FaceLandmarks, ExtractError> {
        match frame {
            b"open" => Ok(face(0.35, 0.5)),
            b"closed" => Ok(face(0.1, 0.5)),
            b"turned" => Ok(face(0.35, 0.75)),
            _ => Err(ExtractError::NoFace),
        }
    }
}

pub async fn make_test_app() -> (Router, AppState) {
    // SAFETY: tests are single-process and only ever set these fixed
    // values.
    unsafe {
        std::env::set_var("JWT_SECRET", "test-secret");
    }

    let db = db::test_utils::setup_test_db().await;
    let stub = Arc::new(StubFace);
    let upload_dir = std::env::temp_dir().join("rollcall-test-uploads");
    let state = AppState::new(
        db,
        stub.clone(),
        stub,
        &upload_dir.to_string_lossy(),
    );

    let app = Router::new()
        .nest("/api", routes())
        .with_state(state.clone());
    (app, state)
}

pub fn b64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
