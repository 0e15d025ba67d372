pub mod generation;
pub mod health;
pub mod uploads;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate                 image + prompt generation (POST, multipart)
/// /generate/text            prompt-only generation (POST, multipart)
/// /uploads                  re-host one image (POST, multipart)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generate", generation::router())
        .nest("/uploads", uploads::router())
}
