//! Detection capability client.
//!
//! The capability is consumed as an opaque remote service: encoded image
//! bytes and a minimum-confidence parameter in, an ordered list of labelled
//! detections out. Latency is unspecified and calls may fail; the detector
//! confines both to a single cycle.

use crate::types::Detection;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::defaults::DETECT_HTTP_TIMEOUT_SECS;
use crate::config::DetectionConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("detection endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

// ============================================================================
// Backend Trait
// ============================================================================

/// Trait abstracting the object-detection capability.
///
/// Implementations must be thread-safe (Send + Sync) — cycles run on
/// spawned tasks.
#[async_trait]
pub trait DetectionBackend: Send + Sync + 'static {
    /// Detect labelled objects in a JPEG-encoded image.
    ///
    /// `min_confidence` is a capability-side filter; callers re-apply it
    /// locally and must not rely on the backend honouring it.
    async fn detect(&self, jpeg: &[u8], min_confidence: f64)
        -> Result<Vec<Detection>, DetectError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// HTTP Detector
// ============================================================================

/// Label-detection HTTP service client.
///
/// Sends the raw JPEG body with the confidence floor as a query parameter
/// and expects a JSON label list back.
pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DetectLabelsResponse {
    labels: Vec<LabelEntry>,
}

#[derive(Debug, Deserialize)]
struct LabelEntry {
    name: String,
    confidence: f64,
}

impl HttpDetector {
    pub fn new(cfg: &DetectionConfig) -> Result<Self, DetectError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DETECT_HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl DetectionBackend for HttpDetector {
    async fn detect(
        &self,
        jpeg: &[u8],
        min_confidence: f64,
    ) -> Result<Vec<Detection>, DetectError> {
        let url = format!("{}/v1/detect-labels", self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .query(&[("min_confidence", min_confidence)])
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg.to_vec());
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DetectError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectLabelsResponse = resp.json().await?;
        Ok(parsed
            .labels
            .into_iter()
            .map(|l| Detection {
                label: l.name,
                confidence: l.confidence,
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "http-labels"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_deserializes() {
        let json = r#"{"labels":[{"name":"Gun","confidence":91.5},{"name":"Person","confidence":99.0}]}"#;
        let parsed: DetectLabelsResponse = serde_json::from_str(json).expect("parse failed");
        assert_eq!(parsed.labels.len(), 2);
        assert_eq!(parsed.labels[0].name, "Gun");
    }
}
