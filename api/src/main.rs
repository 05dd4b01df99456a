use std::net::SocketAddr;
use std::sync::Arc;

use api::auth::middleware::log_request;
use api::routes::routes;
use api::services::face_client::FaceClient;
use api::state::AppState;
use axum::{Router, middleware::from_fn};
use common::config::Config;
use common::logger::init_logger;
use log::info;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    let config = Config::init(".env");
    init_logger(&config.log_level, &config.log_file);

    let db = db::connect().await;

    let face = Arc::new(FaceClient::new(
        &config.face_service_url,
        config.face_service_timeout_secs,
    ));
    let state = AppState::new(db, face.clone(), face, &config.upload_dir);

    let app = Router::new()
        .nest("/api", routes())
        .with_state(state)
        .layer(from_fn(log_request))
        .layer(CorsLayer::very_permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    info!(
        "Starting {} on http://{}:{}",
        config.project_name, config.host, config.port
    );

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Server crashed");
}
