//! Request extractors.
//!
//! - [`auth::ReplicateToken`] -- Extracts the prediction-service credential.

pub mod auth;
