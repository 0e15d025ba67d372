//! Generation parameters, defaults, and validation.

use serde_json::{json, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Negative prompt applied when the client does not send one.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, bad quality, sketches";
/// ControlNet conditioning strength.
pub const DEFAULT_CONDITION_SCALE: f64 = 0.5;
pub const DEFAULT_INFERENCE_STEPS: u32 = 50;

pub const MIN_CONDITION_SCALE: f64 = 0.0;
pub const MAX_CONDITION_SCALE: f64 = 2.0;
pub const MIN_INFERENCE_STEPS: u32 = 1;
pub const MAX_INFERENCE_STEPS: u32 = 500;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Everything needed to build one prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub condition_scale: f64,
    pub num_inference_steps: u32,
    /// Model identifier, `owner/name:version` or a bare version hash.
    pub model_version: String,
    /// Source image for image-conditioned models. `None` for prompt-only.
    pub image_url: Option<String>,
}

impl GenerationParams {
    /// Parameters with defaults for everything except prompt and model.
    pub fn new(prompt: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            condition_scale: DEFAULT_CONDITION_SCALE,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            model_version: model_version.into(),
            image_url: None,
        }
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_prompt(&self.prompt)?;
        validate_model_version(&self.model_version)?;
        validate_condition_scale(self.condition_scale)?;
        validate_inference_steps(self.num_inference_steps)?;
        Ok(())
    }

    /// The model `input` object sent to the prediction service.
    ///
    /// `image` and `condition_scale` are only sent for image-conditioned
    /// requests; text models reject unknown inputs.
    pub fn to_input(&self) -> Value {
        let mut input = json!({
            "prompt": self.prompt,
            "negative_prompt": self.negative_prompt,
            "num_inference_steps": self.num_inference_steps,
        });
        if let Some(ref image) = self.image_url {
            input["image"] = json!(image);
            input["condition_scale"] = json!(self.condition_scale);
        }
        input
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::MissingInput("prompt must not be empty".into()));
    }
    Ok(())
}

pub fn validate_model_version(version: &str) -> Result<(), CoreError> {
    if version.trim().is_empty() {
        return Err(CoreError::Validation(
            "replicate_model_version is required".into(),
        ));
    }
    Ok(())
}

pub fn validate_condition_scale(scale: f64) -> Result<(), CoreError> {
    if !(MIN_CONDITION_SCALE..=MAX_CONDITION_SCALE).contains(&scale) {
        return Err(CoreError::Validation(format!(
            "condition_scale must be between {MIN_CONDITION_SCALE} and {MAX_CONDITION_SCALE}, got {scale}"
        )));
    }
    Ok(())
}

pub fn validate_inference_steps(steps: u32) -> Result<(), CoreError> {
    if !(MIN_INFERENCE_STEPS..=MAX_INFERENCE_STEPS).contains(&steps) {
        return Err(CoreError::Validation(format!(
            "num_inference_steps must be between {MIN_INFERENCE_STEPS} and {MAX_INFERENCE_STEPS}, got {steps}"
        )));
    }
    Ok(())
}
