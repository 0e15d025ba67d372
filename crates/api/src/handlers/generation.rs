//! Handlers for image generation.
//!
//! Routes:
//! - `POST /generate`       image + prompt
//! - `POST /generate/text`  prompt only
//!
//! Both submit a prediction, poll it when it is not already finished,
//! extract the output URL, and optionally re-host the generated image.

use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::Json;
use imagerelay_core::error::CoreError;
use imagerelay_core::generation::GenerationParams;
use imagerelay_core::prediction::{GenerationResult, PredictionJob, PredictionStatus};
use imagerelay_replicate::api::CreatePrediction;
use imagerelay_replicate::poller::{wait_for_completion, PollConfig};

use crate::error::{AppError, AppResult};
use crate::handlers::form::{GenerationForm, UploadedImage};
use crate::handlers::uploads::{download_image, host_image};
use crate::middleware::auth::ReplicateToken;
use crate::state::AppState;

/// POST /api/v1/generate
///
/// Requires an `image` file or an `image_url`. An uploaded file is first
/// pushed to the image host so the prediction service can read it.
pub async fn generate_from_image(
    State(state): State<AppState>,
    ReplicateToken(token): ReplicateToken,
    multipart: Multipart,
) -> AppResult<Json<GenerationResult>> {
    let mut form = GenerationForm::from_multipart(multipart).await?;

    let image = form.image.take();
    let image_url = form.image_url.take();
    if image.is_none() && image_url.is_none() {
        return Err(AppError::Core(CoreError::MissingInput(
            "An image file or image_url is required".into(),
        )));
    }

    // Validate before the source image is published anywhere.
    let default_model = state.config.replicate.model_version.clone();
    let options = RunOptions::from_form(&form, &state.config.poll);
    let mut params = form.into_params(default_model.as_deref(), image_url)?;

    if let Some(image) = image {
        params.image_url = Some(host_source_image(&state, image).await?);
    }

    run_generation(&state, &token, params, options).await.map(Json)
}

/// POST /api/v1/generate/text
///
/// Prompt-only generation. Any `image`/`image_url` field is ignored.
pub async fn generate_from_text(
    State(state): State<AppState>,
    ReplicateToken(token): ReplicateToken,
    multipart: Multipart,
) -> AppResult<Json<GenerationResult>> {
    let form = GenerationForm::from_multipart(multipart).await?;

    let default_model = state
        .config
        .replicate
        .text_model_version
        .clone()
        .or_else(|| state.config.replicate.model_version.clone());
    let options = RunOptions::from_form(&form, &state.config.poll);
    let params = form.into_params(default_model.as_deref(), None)?;

    run_generation(&state, &token, params, options).await.map(Json)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Per-request knobs that are not model inputs.
#[derive(Debug, Clone, Copy)]
struct RunOptions {
    poll: PollConfig,
    rehost: bool,
}

impl RunOptions {
    /// `max_wait_secs` may shorten the configured budget but never extend it.
    fn from_form(form: &GenerationForm, base: &PollConfig) -> Self {
        let poll = match form.max_wait_secs {
            Some(secs) => base.with_max_wait(Duration::from_secs(secs).min(base.max_wait)),
            None => *base,
        };
        Self {
            poll,
            rehost: form.rehost.unwrap_or(true),
        }
    }
}

/// Upload a client-supplied source image and return its public URL.
async fn host_source_image(state: &AppState, image: UploadedImage) -> AppResult<String> {
    let host = state.image_host.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Image hosting is not configured; send image_url instead".into(),
        )
    })?;
    host_image(host.as_ref(), image).await
}

/// Submit, wait, extract, and optionally re-host.
async fn run_generation(
    state: &AppState,
    token: &str,
    params: GenerationParams,
    options: RunOptions,
) -> AppResult<GenerationResult> {
    let request = CreatePrediction {
        version: params.model_version.clone(),
        input: params.to_input(),
    };
    let created = state.replicate.create_prediction(token, &request).await?;

    let job = if created.is_terminal() {
        created
    } else {
        tracing::info!(
            prediction_id = %created.id,
            status = %created.status,
            max_wait_ms = options.poll.max_wait.as_millis() as u64,
            "Prediction still running, polling",
        );
        wait_for_completion(&state.replicate, token, created, &options.poll, &state.shutdown)
            .await?
    };

    let result = resolve_result(params.prompt, job)?;
    tracing::info!(
        prediction_id = %result.prediction_id,
        result_url = %result.result_url,
        "Generation succeeded",
    );

    match state.image_host.as_ref() {
        Some(host) if options.rehost => {
            let image = download_image(&state.http, &result.result_url).await?;
            let hosted_url = host_image(host.as_ref(), image).await?;
            Ok(result.with_hosted_url(hosted_url))
        }
        _ => Ok(result),
    }
}

/// Turn the final snapshot into a result or the matching error.
///
/// A non-terminal snapshot here means the poll budget ran out; it is
/// reported as an explicit timeout rather than passed through.
pub fn resolve_result(prompt: String, job: PredictionJob) -> AppResult<GenerationResult> {
    match job.status {
        PredictionStatus::Succeeded => match GenerationResult::from_job(prompt, &job) {
            Some(result) => Ok(result),
            None => Err(AppError::UpstreamFailure {
                message: "Replicate returned no image URL".into(),
                payload: job.into_raw(),
            }),
        },
        PredictionStatus::Failed | PredictionStatus::Canceled => {
            let reason = job
                .error
                .as_ref()
                .and_then(|e| e.as_str())
                .map(|e| format!(": {e}"))
                .unwrap_or_default();
            Err(AppError::UpstreamFailure {
                message: format!("Prediction {}{reason}", job.status),
                payload: job.into_raw(),
            })
        }
        _ => {
            tracing::warn!(
                prediction_id = %job.id,
                status = %job.status,
                "Prediction still running after wait limit",
            );
            Err(AppError::PredictionTimeout {
                payload: job.into_raw(),
            })
        }
    }
}
