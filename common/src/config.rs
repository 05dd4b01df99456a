use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    /// Base URL of the external face service (embeddings + landmarks).
    pub face_service_url: String,
    /// Per-call timeout for the face service, in seconds.
    pub face_service_timeout_secs: u64,
    /// Directory where evidence snapshots and enrollment photos land.
    pub upload_dir: String,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init(env_path: &str) -> &'static Self {
        dotenvy::from_filename(env_path).ok();

        CONFIG.get_or_init(|| {
            let project_name = env::var("PROJECT_NAME").unwrap_or_else(|_| "rollcall-api".into());
            let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".into());
            let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/api.log".into());
            let database_path = env::var("DATABASE_PATH").expect("DATABASE_PATH must be set");
            let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
            let port = env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000);

            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                fs::create_dir_all(parent).expect("Failed to create log directory");
            }
            let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
            let jwt_duration_minutes = env::var("JWT_DURATION_MINUTES")
                .ok()
                .and_then(|m| m.parse().ok())
                .unwrap_or(60);
            let face_service_url =
                env::var("FACE_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:8500".into());
            let face_service_timeout_secs = env::var("FACE_SERVICE_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(15);
            let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());

            Config {
                project_name,
                log_level,
                log_file,
                database_path,
                host,
                port,
                jwt_secret,
                jwt_duration_minutes,
                face_service_url,
                face_service_timeout_secs,
                upload_dir,
            }
        })
    }

    pub fn get() -> &'static Self {
        CONFIG.get().expect("Config not initialized")
    }
}
