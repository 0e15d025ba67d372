//! Image hosting: the `/uploads` endpoint and the download/upload helpers
//! used for re-hosting generated images.

use axum::extract::{Multipart, State};
use axum::Json;
use imagerelay_core::error::CoreError;
use imagerelay_imgbb::ImageHost;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::form::{read_image_upload, UploadedImage};
use crate::state::AppState;

/// Filename used for re-hosted images whose URL has no usable last segment.
const GENERATED_FILENAME: &str = "generated.png";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// POST /api/v1/uploads
///
/// Re-host one `image` file and return its public URL.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let host = state
        .image_host
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable("Image hosting is not configured".into()))?;

    let image = read_image_upload(multipart)
        .await?
        .ok_or_else(|| CoreError::MissingInput("An image file is required".into()))?;

    let url = host_image(host.as_ref(), image).await?;
    Ok(Json(UploadResponse { url }))
}

/// Upload an image to the host and return its public URL.
pub async fn host_image(host: &dyn ImageHost, image: UploadedImage) -> AppResult<String> {
    Ok(host.upload(&image.filename, image.bytes.to_vec()).await?)
}

/// Fetch an image by URL so it can be re-hosted.
///
/// Any failure, including a non-2xx status, is reported with the URL that
/// was attempted.
pub async fn download_image(client: &reqwest::Client, url: &str) -> AppResult<UploadedImage> {
    let failed = |message: String| AppError::DownloadFailed {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("HTTP {status}")));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    tracing::debug!(url, size = bytes.len(), "Downloaded generated image");

    Ok(UploadedImage {
        filename: filename_from_url(url),
        bytes,
    })
}

/// Last path segment of a URL, without query or fragment.
fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|segment| segment.contains('.') && !segment.contains(':'))
        .map(str::to_owned)
        .unwrap_or_else(|| GENERATED_FILENAME.to_string())
}
