//! Client for the imgbb image-hosting API.
//!
//! Used to turn uploaded files into public URLs the prediction service can
//! read, and to re-host generated images.

pub mod api;

pub use api::{ImageHost, ImgbbApi, ImgbbError};
