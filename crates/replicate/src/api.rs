//! REST API client for the Replicate prediction endpoints.
//!
//! Wraps prediction creation and status reads using [`reqwest`]. The
//! caller's API token is passed per call, so one client can serve many
//! callers with different credentials.

use async_trait::async_trait;
use imagerelay_core::prediction::PredictionJob;
use serde::Serialize;

use crate::poller::PredictionSource;

/// Default base URL of the Replicate HTTP API.
pub const DEFAULT_API_URL: &str = "https://api.replicate.com/v1";

/// HTTP client for the prediction service.
#[derive(Clone)]
pub struct ReplicateApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of a `POST /predictions` request.
#[derive(Debug, Serialize)]
pub struct CreatePrediction {
    /// Model version, `owner/name:hash` or a bare version hash.
    pub version: String,
    /// Model-specific input object.
    pub input: serde_json::Value,
}

/// Errors from the Replicate REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ReplicateApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Replicate returned a non-2xx status code.
    #[error("Replicate API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was JSON but not a prediction.
    #[error("Unexpected prediction payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ReplicateApi {
    /// Create an API client reusing an existing [`reqwest::Client`].
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://api.replicate.com/v1`.
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit a prediction.
    ///
    /// Sends `POST /predictions` with `Prefer: wait`, so fast models
    /// usually come back already `succeeded`. Slower ones return a
    /// `starting`/`processing` snapshot whose polling URL must be
    /// followed with [`get_prediction`](Self::get_prediction).
    pub async fn create_prediction(
        &self,
        token: &str,
        request: &CreatePrediction,
    ) -> Result<PredictionJob, ReplicateApiError> {
        let response = self
            .client
            .post(format!("{}/predictions", self.api_url))
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(request)
            .send()
            .await?;

        let job = Self::parse_prediction(response).await?;
        tracing::info!(
            prediction_id = %job.id,
            status = %job.status,
            version = %request.version,
            "Created prediction",
        );
        Ok(job)
    }

    /// Read the current state of a prediction from its polling URL.
    pub async fn get_prediction(
        &self,
        token: &str,
        polling_url: &str,
    ) -> Result<PredictionJob, ReplicateApiError> {
        let response = self
            .client
            .get(polling_url)
            .bearer_auth(token)
            .send()
            .await?;

        Self::parse_prediction(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ReplicateApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ReplicateApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ReplicateApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_prediction(
        response: reqwest::Response,
    ) -> Result<PredictionJob, ReplicateApiError> {
        let response = Self::ensure_success(response).await?;
        let raw = response.json::<serde_json::Value>().await?;
        Ok(PredictionJob::from_value(raw)?)
    }
}

#[async_trait]
impl PredictionSource for ReplicateApi {
    async fn fetch(&self, token: &str, polling_url: &str) -> Result<PredictionJob, ReplicateApiError> {
        self.get_prediction(token, polling_url).await
    }
}
