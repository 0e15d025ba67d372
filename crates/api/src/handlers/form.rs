//! Multipart form parsing shared by the generation and upload handlers.

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::Multipart;
use imagerelay_core::error::CoreError;
use imagerelay_core::generation::GenerationParams;

use crate::error::{AppError, AppResult};

/// Filename used when the client sends a file part without one.
const FALLBACK_FILENAME: &str = "upload.png";

/// An image file received in a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Bytes,
}

/// Raw fields of a generation request, before defaults and validation.
#[derive(Debug, Default)]
pub struct GenerationForm {
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub condition_scale: Option<f64>,
    pub num_inference_steps: Option<u32>,
    pub model_version: Option<String>,
    pub image: Option<UploadedImage>,
    pub image_url: Option<String>,
    pub max_wait_secs: Option<u64>,
    pub rehost: Option<bool>,
}

impl GenerationForm {
    /// Read every field of a generation request. Unknown fields are ignored
    /// and empty values count as absent.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match name.as_str() {
                "image" => form.image = read_image(field).await?,
                "prompt" => form.prompt = read_text(field).await?,
                "negative_prompt" => form.negative_prompt = read_text(field).await?,
                "replicate_model_version" => form.model_version = read_text(field).await?,
                "image_url" => form.image_url = read_text(field).await?,
                "condition_scale" => form.condition_scale = read_parsed(&name, field).await?,
                "num_inference_steps" => {
                    form.num_inference_steps = read_parsed(&name, field).await?
                }
                "max_wait_secs" => form.max_wait_secs = read_parsed(&name, field).await?,
                "rehost" => {
                    form.rehost = match read_text(field).await? {
                        Some(value) => Some(parse_bool(&name, &value)?),
                        None => None,
                    }
                }
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// Apply defaults and validate. `default_model` is used when the form
    /// names no model version.
    pub fn into_params(
        self,
        default_model: Option<&str>,
        image_url: Option<String>,
    ) -> AppResult<GenerationParams> {
        let prompt = self
            .prompt
            .ok_or_else(|| CoreError::MissingInput("prompt is required".into()))?;
        let model_version = self
            .model_version
            .or_else(|| default_model.map(str::to_owned))
            .unwrap_or_default();

        let mut params = GenerationParams::new(prompt, model_version);
        if let Some(negative_prompt) = self.negative_prompt {
            params.negative_prompt = negative_prompt;
        }
        if let Some(scale) = self.condition_scale {
            params.condition_scale = scale;
        }
        if let Some(steps) = self.num_inference_steps {
            params.num_inference_steps = steps;
        }
        params.image_url = image_url;

        params.validate()?;
        Ok(params)
    }
}

/// Read the first non-empty `image` part of a multipart request.
pub async fn read_image_upload(mut multipart: Multipart) -> AppResult<Option<UploadedImage>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("image") {
            if let Some(image) = read_image(field).await? {
                return Ok(Some(image));
            }
        }
    }
    Ok(None)
}

// ---- field readers ----

/// Browsers send an empty file part when no file was chosen; treat that as
/// no image.
async fn read_image(field: Field<'_>) -> AppResult<Option<UploadedImage>> {
    let filename = field
        .file_name()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadedImage { filename, bytes }))
}

async fn read_text(field: Field<'_>) -> AppResult<Option<String>> {
    let text = field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

async fn read_parsed<T: FromStr>(name: &str, field: Field<'_>) -> AppResult<Option<T>> {
    match read_text(field).await? {
        Some(value) => parse_value(name, &value).map(Some),
        None => Ok(None),
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> AppResult<T> {
    value.parse().map_err(|_| {
        AppError::Core(CoreError::Validation(format!(
            "{name} has an invalid value: {value:?}"
        )))
    })
}

fn parse_bool(name: &str, value: &str) -> AppResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::Core(CoreError::Validation(format!(
            "{name} must be true or false, got {value:?}"
        )))),
    }
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim().to_string()
}
