//! Request handlers.
//!
//! Handlers parse multipart input, call the upstream clients held in
//! [`AppState`](crate::state::AppState), and map failures via
//! [`AppError`](crate::error::AppError).

pub mod form;
pub mod generation;
pub mod uploads;
