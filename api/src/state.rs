use std::sync::Arc;

use checkin::{EmbeddingExtractor, LandmarkDetector, VerificationEngine};
use sea_orm::DatabaseConnection;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    landmarks: Arc<dyn LandmarkDetector>,
    engine: VerificationEngine,
    extractor: Arc<dyn EmbeddingExtractor>,
    upload_dir: Arc<str>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        extractor: Arc<dyn EmbeddingExtractor>,
        landmarks: Arc<dyn LandmarkDetector>,
        upload_dir: &str,
    ) -> Self {
        Self {
            db,
            landmarks,
            engine: VerificationEngine::new(extractor.clone()),
            extractor,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    pub fn extractor(&self) -> &Arc<dyn EmbeddingExtractor> {
        &self.extractor
    }

    pub fn landmarks(&self) -> &Arc<dyn LandmarkDetector> {
        &self.landmarks
    }

    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }
}
