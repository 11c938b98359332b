use thiserror::Error;

/// Failures from polling the HR source (spec §6, "HR sync source").
#[derive(Debug, Error)]
pub enum HrError {
    #[error("HR source request failed: {0}")]
    Request(String),
    #[error("failed to decode HR source response: {0}")]
    Decode(String),
}
