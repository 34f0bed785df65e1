//! Content extractor collaborator
//!
//! The AI extraction step lives in another service; this is the seam the
//! pipeline talks through. Implementations must be side-effect free from
//! the pipeline's point of view: same request, same structured answer or a
//! retryable error.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::ExtractorConfig;
use crate::models::{ExtractionRequest, ExtractionResult};

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Extractor not configured")]
    NotConfigured,
    #[error("Extractor request failed: {0}")]
    Request(String),
    #[error("Extractor returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest)
        -> Result<ExtractionResult, ExtractorError>;
}

/// HTTP client for the extraction service.
pub struct HttpExtractor {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractorError> {
        let endpoint = self.endpoint.as_ref().ok_or(ExtractorError::NotConfigured)?;

        debug!("Posting extraction request for {} to {}", request.from, endpoint);

        let response = self
            .client
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractorError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractorError::Request(format!(
                "Extractor returned HTTP {}",
                response.status()
            )));
        }

        let result: ExtractionResult = response
            .json()
            .await
            .map_err(|e| ExtractorError::InvalidResponse(e.to_string()))?;

        if !(0.0..=1.0).contains(&result.overall_confidence) {
            return Err(ExtractorError::InvalidResponse(format!(
                "overall_confidence out of range: {}",
                result.overall_confidence
            )));
        }

        Ok(result)
    }
}
