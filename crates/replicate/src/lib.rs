//! Client for the Replicate prediction API.
//!
//! Provides the REST wrapper used to create and read predictions, and the
//! cancellable poll loop that waits for a prediction to finish.

pub mod api;
pub mod poller;
