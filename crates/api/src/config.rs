use std::time::Duration;

use imagerelay_replicate::poller::PollConfig;

/// ControlNet model used for image-conditioned generation when the client
/// does not name one.
pub const DEFAULT_MODEL_VERSION: &str =
    "lucataco/sdxl-controlnet:06d6fae3b75ab68a28cd2900afa6033166910dd09fd9751047043a5bbb4c184b";

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`). Must exceed the
    /// poll budget or long generations are cut off by the timeout layer.
    pub request_timeout_secs: u64,
    /// Largest accepted request body in bytes (default: 20 MiB).
    pub max_upload_bytes: usize,
    /// Prediction service settings.
    pub replicate: ReplicateConfig,
    /// Poll loop timing.
    pub poll: PollConfig,
    /// Image hosting settings. `None` disables uploads and re-hosting.
    pub imgbb: Option<ImgbbConfig>,
}

/// Prediction service settings.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// Base API URL (default: `https://api.replicate.com/v1`).
    pub api_url: String,
    /// Server-side token used when the caller sends no `Authorization`.
    pub api_token: Option<String>,
    /// Fallback model for `/generate`.
    pub model_version: Option<String>,
    /// Fallback model for `/generate/text`.
    pub text_model_version: Option<String>,
}

/// Image hosting settings.
#[derive(Debug, Clone)]
pub struct ImgbbConfig {
    /// Upload endpoint (default: `https://api.imgbb.com/1/upload`).
    pub upload_url: String,
    pub api_key: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                         |
    /// |--------------------------------|---------------------------------|
    /// | `HOST`                         | `0.0.0.0`                       |
    /// | `PORT`                         | `3000`                          |
    /// | `CORS_ORIGINS`                 | `*`                             |
    /// | `REQUEST_TIMEOUT_SECS`         | `120`                           |
    /// | `MAX_UPLOAD_BYTES`             | `20971520`                      |
    /// | `REPLICATE_API_URL`            | `https://api.replicate.com/v1`  |
    /// | `REPLICATE_API_TOKEN`          | unset                           |
    /// | `REPLICATE_MODEL_VERSION`      | SDXL ControlNet                 |
    /// | `REPLICATE_TEXT_MODEL_VERSION` | unset                           |
    /// | `POLL_INTERVAL_MS`             | `2000`                          |
    /// | `POLL_MAX_WAIT_SECS`           | `60`                            |
    /// | `IMGBB_API_URL`                | `https://api.imgbb.com/1/upload`|
    /// | `IMGBB_API_KEY`                | unset (hosting disabled)        |
    ///
    /// Panics on unparseable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "20971520".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");
        assert!(poll_interval_ms > 0, "POLL_INTERVAL_MS must be positive");

        let poll_max_wait_secs: u64 = std::env::var("POLL_MAX_WAIT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("POLL_MAX_WAIT_SECS must be a valid u64");

        let replicate = ReplicateConfig {
            api_url: std::env::var("REPLICATE_API_URL")
                .unwrap_or_else(|_| imagerelay_replicate::api::DEFAULT_API_URL.into()),
            api_token: env_opt("REPLICATE_API_TOKEN"),
            model_version: Some(
                env_opt("REPLICATE_MODEL_VERSION").unwrap_or_else(|| DEFAULT_MODEL_VERSION.into()),
            ),
            text_model_version: env_opt("REPLICATE_TEXT_MODEL_VERSION"),
        };

        let imgbb = env_opt("IMGBB_API_KEY").map(|api_key| ImgbbConfig {
            upload_url: std::env::var("IMGBB_API_URL")
                .unwrap_or_else(|_| imagerelay_imgbb::api::DEFAULT_UPLOAD_URL.into()),
            api_key,
        });

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes,
            replicate,
            poll: PollConfig {
                interval: Duration::from_millis(poll_interval_ms),
                max_wait: Duration::from_secs(poll_max_wait_secs),
            },
            imgbb,
        }
    }
}

/// Read a variable, treating empty values as unset.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
