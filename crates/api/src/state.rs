use std::sync::Arc;
use std::time::Duration;

use imagerelay_imgbb::{ImageHost, ImgbbApi};
use imagerelay_replicate::api::ReplicateApi;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Timeout for a single outbound HTTP call (creation, status read, upload,
/// download). `Prefer: wait` holds creation open for up to a minute.
const UPSTREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prediction service client.
    pub replicate: ReplicateApi,
    /// Image host, if configured.
    pub image_host: Option<Arc<dyn ImageHost>>,
    /// Plain HTTP client for fetching generated images.
    pub http: reqwest::Client,
    /// Cancelled on shutdown so in-flight polls stop waiting.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build clients from configuration. All upstream clients share one
    /// connection pool.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (e.g. no TLS backend is
    /// available). This only happens at startup.
    pub fn from_config(config: ServerConfig, shutdown: CancellationToken) -> Self {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");

        let replicate = ReplicateApi::with_client(http.clone(), config.replicate.api_url.clone());

        let image_host = config.imgbb.as_ref().map(|imgbb| {
            Arc::new(ImgbbApi::new(
                http.clone(),
                imgbb.upload_url.clone(),
                imgbb.api_key.clone(),
            )) as Arc<dyn ImageHost>
        });

        Self {
            config: Arc::new(config),
            replicate,
            image_host,
            http,
            shutdown,
        }
    }

    /// Replace the image host (used by tests to plug in a fake).
    pub fn with_image_host(self, image_host: Arc<dyn ImageHost>) -> Self {
        Self {
            image_host: Some(image_host),
            ..self
        }
    }
}
