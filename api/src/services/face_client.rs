//! HTTP client for the external face service (embedding extraction and
//! facial landmarks). All calls are JSON over a bounded-timeout reqwest
//! client; failures surface as `ExtractError` and never panic the API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use checkin::{EmbeddingExtractor, ExtractError, FaceLandmarks, LandmarkDetector};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct FaceClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embeddings: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct LandmarksResponse {
    face: Option<FaceLandmarks>,
}

impl FaceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build face service client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    async fn post_image<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        image: &[u8],
    ) -> Result<T, ExtractError> {
        let body = ImageRequest {
            image: &BASE64.encode(image),
        };
        let url = format!("{}/{endpoint}", self.base_url);

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Failed(format!("face service unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(ExtractError::Failed(format!(
                "face service returned {}",
                resp.status()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ExtractError::Failed(format!("bad face service response: {e}")))
    }
}

#[async_trait]
impl EmbeddingExtractor for FaceClient {
    async fn extract(&self, image: &[u8]) -> Result<Vec<f64>, ExtractError> {
        let resp: EmbeddingResponse = self.post_image("embedding", image).await?;
        resp.embedding.ok_or(ExtractError::NoFace)
    }

    async fn extract_all(&self, image: &[u8]) -> Result<Vec<Vec<f64>>, ExtractError> {
        let resp: EmbeddingsResponse = self.post_image("embeddings", image).await?;
        Ok(resp.embeddings)
    }
}

#[async_trait]
impl LandmarkDetector for FaceClient {
    async fn landmarks(&self, frame: &[u8]) -> Result<FaceLandmarks, ExtractError> {
        let resp: LandmarksResponse = self.post_image("landmarks", frame).await?;
        resp.face.ok_or(ExtractError::NoFace)
    }
}
