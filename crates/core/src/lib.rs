//! Domain types for the image generation relay.
//!
//! Holds the prediction job model, result extraction, and generation
//! parameter validation. Nothing in this crate performs I/O.

pub mod error;
pub mod generation;
pub mod prediction;
