use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imagerelay_core::error::CoreError;
use imagerelay_imgbb::ImgbbError;
use imagerelay_replicate::api::ReplicateApiError;
use imagerelay_replicate::poller::PollError;
use serde_json::{json, Value};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP- and upstream-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses of the form `{ "error": ..., "code": ..., ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `imagerelay_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The prediction finished without a usable output.
    #[error("Upstream failure: {message}")]
    UpstreamFailure {
        message: String,
        /// Raw prediction payload, echoed back for diagnosis.
        payload: Value,
    },

    /// The poll budget ran out while the prediction was still running.
    #[error("Prediction did not finish in time")]
    PredictionTimeout { payload: Value },

    /// A call to the prediction service failed.
    #[error(transparent)]
    Replicate(#[from] ReplicateApiError),

    /// Uploading to the image host failed.
    #[error(transparent)]
    Upload(#[from] ImgbbError),

    /// Fetching a generated image failed.
    #[error("Failed to download {url}: {message}")]
    DownloadFailed { url: String, message: String },

    /// The server is shutting down and abandoned the request.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<PollError> for AppError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Api(api) => AppError::Replicate(api),
            PollError::Cancelled => {
                AppError::ServiceUnavailable("Server is shutting down".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = serde_json::Map::new();

        let (status, code, message) = match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::MissingCredential(msg) => {
                    (StatusCode::BAD_REQUEST, "MISSING_CREDENTIAL", msg)
                }
                CoreError::MissingInput(msg) => (StatusCode::BAD_REQUEST, "MISSING_INPUT", msg),
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            },

            // --- Upstream prediction results ---
            AppError::UpstreamFailure { message, payload } => {
                extra.insert("replicate_output".into(), payload);
                (StatusCode::BAD_REQUEST, "UPSTREAM_FAILURE", message)
            }
            AppError::PredictionTimeout { payload } => {
                extra.insert("replicate_output".into(), payload);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "PREDICTION_TIMEOUT",
                    "Prediction did not finish before the wait limit".to_string(),
                )
            }

            // --- Upstream transport errors ---
            AppError::Replicate(err) => classify_replicate_error(err, &mut extra),
            AppError::Upload(err) => {
                tracing::warn!(error = %err, "Image upload failed");
                (
                    StatusCode::BAD_REQUEST,
                    "UPLOAD_FAILED",
                    "Failed to upload image to the image host".to_string(),
                )
            }
            AppError::DownloadFailed { url, message } => {
                tracing::error!(url = %url, error = %message, "Generated image download failed");
                extra.insert("url".into(), Value::String(url));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DOWNLOAD_FAILED",
                    "Failed to download the generated image".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Value::Object(ref mut map) = body {
            map.extend(extra);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a prediction-service error into an HTTP status, code, and message.
///
/// - 4xx from upstream (bad token, invalid input) maps to 400 with the
///   upstream body attached.
/// - Everything else maps to 502.
fn classify_replicate_error(
    err: ReplicateApiError,
    extra: &mut serde_json::Map<String, Value>,
) -> (StatusCode, &'static str, String) {
    match err {
        ReplicateApiError::ApiError { status, body } => {
            tracing::warn!(upstream_status = status, body = %body, "Replicate rejected request");
            extra.insert("upstream_status".into(), json!(status));
            let payload = serde_json::from_str(&body).unwrap_or(Value::String(body));
            extra.insert("replicate_output".into(), payload);
            if (400..500).contains(&status) {
                (
                    StatusCode::BAD_REQUEST,
                    "UPSTREAM_REJECTED",
                    format!("Replicate rejected the request ({status})"),
                )
            } else {
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    format!("Replicate returned an error ({status})"),
                )
            }
        }
        other => {
            tracing::error!(error = %other, "Replicate request failed");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Could not reach the prediction service".to_string(),
            )
        }
    }
}
