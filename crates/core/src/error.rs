#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
