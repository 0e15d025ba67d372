//! Prediction job model and output extraction.
//!
//! A [`PredictionJob`] is a snapshot of one job on the external
//! prediction service. It is rebuilt from every status read and is never
//! persisted; its lifetime is a single request/response cycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status reported by the prediction service.
///
/// Jobs move forward through `starting`/`processing` into exactly one of
/// the terminal states. Status strings the relay does not recognise map
/// to [`PredictionStatus::Unknown`] and are treated as still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    /// Whether no further transitions can occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job snapshot
// ---------------------------------------------------------------------------

/// Links returned alongside a prediction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    /// Status endpoint for this job.
    pub get: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictionPayload {
    #[serde(default)]
    id: String,
    #[serde(default = "unknown_status")]
    status: PredictionStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: PredictionUrls,
}

fn unknown_status() -> PredictionStatus {
    PredictionStatus::Unknown
}

/// One observed state of a job on the prediction service.
///
/// The raw upstream payload is kept so that failures can be reported
/// back to the caller verbatim.
#[derive(Debug, Clone)]
pub struct PredictionJob {
    pub id: String,
    pub status: PredictionStatus,
    /// Absent, a single URL, or a list of URLs depending on the model.
    pub output: Option<Value>,
    /// Upstream error description, if the job failed.
    pub error: Option<Value>,
    pub urls: PredictionUrls,
    raw: Value,
}

impl PredictionJob {
    /// Build a snapshot from an upstream JSON payload.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let payload = PredictionPayload::deserialize(&raw)?;
        Ok(Self {
            id: payload.id,
            status: payload.status,
            output: payload.output,
            error: payload.error,
            urls: payload.urls,
            raw,
        })
    }

    /// Status-query endpoint for this job, if the service provided one.
    pub fn polling_url(&self) -> Option<&str> {
        self.urls.get.as_deref().filter(|u| !u.is_empty())
    }

    /// The single result URL, normalised from whatever shape `output` has.
    pub fn output_url(&self) -> Option<&str> {
        extract_output_url(self.output.as_ref())
    }

    /// Whether polling should stop for this snapshot.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The upstream payload exactly as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

// ---------------------------------------------------------------------------
// Result extraction
// ---------------------------------------------------------------------------

/// Normalise a prediction `output` field into one URL.
///
/// - sequence: the first element, when it is a string
/// - string: the string itself
/// - absent, `null`, or any other shape: `None`
///
/// Empty strings count as no output.
pub fn extract_output_url(output: Option<&Value>) -> Option<&str> {
    let url = match output? {
        Value::Array(items) => items.first()?.as_str()?,
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    (!url.is_empty()).then_some(url)
}

// ---------------------------------------------------------------------------
// Final result
// ---------------------------------------------------------------------------

/// A resolved generation, returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub prompt: String,
    pub result_url: String,
    pub prediction_id: String,
    pub status: PredictionStatus,
    /// Set when the generated image was re-uploaded to the image host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_url: Option<String>,
}

impl GenerationResult {
    /// Build a result from a succeeded job. Returns `None` when the job has
    /// not succeeded or carries no usable output.
    pub fn from_job(prompt: String, job: &PredictionJob) -> Option<Self> {
        if job.status != PredictionStatus::Succeeded {
            return None;
        }
        let result_url = job.output_url()?.to_string();
        Some(Self {
            prompt,
            result_url,
            prediction_id: job.id.clone(),
            status: job.status,
            hosted_url: None,
        })
    }

    pub fn with_hosted_url(self, hosted_url: String) -> Self {
        Self {
            hosted_url: Some(hosted_url),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(value: Value) -> PredictionJob {
        PredictionJob::from_value(value).unwrap()
    }

    // -- Extraction --

    #[test]
    fn extract_takes_first_element_of_list() {
        let output = json!(["a", "b"]);
        assert_eq!(extract_output_url(Some(&output)), Some("a"));
    }

    #[test]
    fn extract_returns_plain_string() {
        let output = json!("x");
        assert_eq!(extract_output_url(Some(&output)), Some("x"));
    }

    #[test]
    fn extract_returns_none_for_null_or_absent() {
        assert_eq!(extract_output_url(Some(&Value::Null)), None);
        assert_eq!(extract_output_url(None), None);
    }

    #[test]
    fn extract_returns_none_for_other_shapes() {
        assert_eq!(extract_output_url(Some(&json!([]))), None);
        assert_eq!(extract_output_url(Some(&json!([1, 2]))), None);
        assert_eq!(extract_output_url(Some(&json!({"url": "x"}))), None);
        assert_eq!(extract_output_url(Some(&json!(42))), None);
        assert_eq!(extract_output_url(Some(&json!(""))), None);
    }

    // -- Status --

    #[test]
    fn terminal_states() {
        assert!(PredictionStatus::Succeeded.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
        assert!(PredictionStatus::Canceled.is_terminal());
        assert!(!PredictionStatus::Starting.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
        assert!(!PredictionStatus::Unknown.is_terminal());
    }

    #[test]
    fn unrecognised_status_is_unknown() {
        let j = job(json!({"id": "p1", "status": "queued"}));
        assert_eq!(j.status, PredictionStatus::Unknown);
        assert!(!j.is_terminal());
    }

    // -- Snapshot parsing --

    #[test]
    fn parses_replicate_payload() {
        let raw = json!({
            "id": "abc123",
            "status": "processing",
            "output": null,
            "urls": {
                "get": "https://api.replicate.com/v1/predictions/abc123",
                "cancel": "https://api.replicate.com/v1/predictions/abc123/cancel"
            }
        });
        let j = job(raw.clone());
        assert_eq!(j.id, "abc123");
        assert_eq!(j.status, PredictionStatus::Processing);
        assert_eq!(
            j.polling_url(),
            Some("https://api.replicate.com/v1/predictions/abc123")
        );
        assert_eq!(j.output_url(), None);
        assert_eq!(j.raw(), &raw);
    }

    #[test]
    fn missing_fields_default() {
        let j = job(json!({}));
        assert_eq!(j.id, "");
        assert_eq!(j.status, PredictionStatus::Unknown);
        assert_eq!(j.polling_url(), None);
    }

    // -- GenerationResult --

    #[test]
    fn result_from_succeeded_job() {
        let j = job(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["http://img/1.png"]
        }));
        let result = GenerationResult::from_job("a cat".into(), &j).unwrap();
        assert_eq!(result.result_url, "http://img/1.png");
        assert_eq!(result.prompt, "a cat");
        assert_eq!(result.prediction_id, "p1");
        assert_eq!(result.hosted_url, None);
    }

    #[test]
    fn no_result_from_failed_or_empty_job() {
        let failed = job(json!({"status": "failed", "output": ["http://img/1.png"]}));
        assert!(GenerationResult::from_job("p".into(), &failed).is_none());

        let empty = job(json!({"status": "succeeded", "output": null}));
        assert!(GenerationResult::from_job("p".into(), &empty).is_none());
    }

    #[test]
    fn hosted_url_is_serialized_only_when_set() {
        let j = job(json!({"id": "p1", "status": "succeeded", "output": "http://x"}));
        let result = GenerationResult::from_job("p".into(), &j).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("hosted_url").is_none());
        assert_eq!(value["status"], "succeeded");

        let value = serde_json::to_value(result.with_hosted_url("http://h".into())).unwrap();
        assert_eq!(value["hosted_url"], "http://h");
    }
}
