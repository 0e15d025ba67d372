//! Route definitions for generation.
//!
//! ```text
//! POST   /          generate_from_image
//! POST   /text      generate_from_text
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generate`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generation::generate_from_image))
        .route("/text", post(generation::generate_from_text))
}
