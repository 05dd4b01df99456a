use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::VerifyError;

/// Failure modes of the external embedding/landmark services.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("no face detected")]
    NoFace,
    /// Upstream service error (timeout, bad response, model failure).
    #[error("extraction failed: {0}")]
    Failed(String),
}

impl From<ExtractError> for VerifyError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NoFace => VerifyError::NoFaceDetected,
            ExtractError::Failed(msg) => VerifyError::ExtractionFailed(msg),
        }
    }
}

/// A 2D landmark point. Coordinates are normalized to the frame
/// (x and y in `[0, 1]`), matching what the landmark service emits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// The named landmarks the liveness checks need, for a single face.
///
/// Eye arrays follow the usual EAR ordering: outer corner, two upper-lid
/// points, inner corner, two lower-lid points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: [Point; 6],
    pub right_eye: [Point; 6],
    pub nose_tip: Point,
    pub left_cheek: Point,
    pub right_cheek: Point,
}

/// Black-box face-embedding extractor.
///
/// Implementations wrap the external model service; the engine never sees
/// images beyond handing them across this seam.
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    /// Extract one embedding from an image expected to contain one face.
    async fn extract(&self, image: &[u8]) -> Result<Vec<f64>, ExtractError>;

    /// Extract an embedding per detected face. An empty list is a valid
    /// result (a photo with no recognizable faces), not an error.
    async fn extract_all(&self, image: &[u8]) -> Result<Vec<Vec<f64>>, ExtractError>;
}

/// Black-box facial-landmark detector, used for per-frame liveness
/// analysis only.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    async fn landmarks(&self, frame: &[u8]) -> Result<FaceLandmarks, ExtractError>;
}
