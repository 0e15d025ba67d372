//! REST client for the imgbb upload endpoint.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Default upload endpoint.
pub const DEFAULT_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

/// Somewhere images can be uploaded to obtain a public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload `bytes` and return the public URL of the hosted image.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ImgbbError>;
}

/// Errors from the image-hosting layer.
#[derive(Debug, thiserror::Error)]
pub enum ImgbbError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// imgbb returned a non-2xx status code.
    #[error("imgbb API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A success response without `data.url`.
    #[error("imgbb response did not contain an image URL")]
    MissingUrl,
}

/// HTTP client for imgbb, bound to one API key.
#[derive(Clone)]
pub struct ImgbbApi {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Option<String>,
}

impl ImgbbApi {
    pub fn new(client: reqwest::Client, upload_url: String, api_key: String) -> Self {
        Self {
            client,
            upload_url,
            api_key,
        }
    }

    async fn send(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ImgbbError> {
        let form = Form::new()
            .text("key", self.api_key.clone())
            .part("image", Part::bytes(bytes).file_name(filename.to_string()));

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImgbbError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<serde_json::Value>().await?;
        hosted_url(&body)
    }
}

#[async_trait]
impl ImageHost for ImgbbApi {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ImgbbError> {
        let size = bytes.len();
        let url = self.send(filename, bytes).await?;
        tracing::info!(filename, size, url = %url, "Uploaded image to imgbb");
        Ok(url)
    }
}

/// Pull `data.url` out of an upload response body.
fn hosted_url(body: &serde_json::Value) -> Result<String, ImgbbError> {
    UploadResponse::deserialize(body)
        .ok()
        .and_then(|r| r.data)
        .and_then(|d| d.url)
        .filter(|url| !url.is_empty())
        .ok_or(ImgbbError::MissingUrl)
}
