//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → health check (public)
//! - `/checkins` → session lifecycle and check-in attempts (authenticated)
//! - `/faces` → face enrollment lifecycle (authenticated)
//! - `/liveness` → per-frame blink and head-pose analysis (authenticated)

use axum::{Router, middleware::from_fn};

use crate::auth::guards::allow_authenticated;
use crate::routes::{
    checkins::checkins_routes, faces::faces_routes, health::health_routes,
    liveness::liveness_routes,
};
use crate::state::AppState;

pub mod checkins;
pub mod faces;
pub mod health;
pub mod liveness;

/// Builds the complete application router for all HTTP endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/checkins",
            checkins_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/faces",
            faces_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/liveness",
            liveness_routes().route_layer(from_fn(allow_authenticated)),
        )
}
