use thiserror::Error;

/// Errors raised by an [`crate::store::AuditStore`] backend.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("connection error: {0}")]
    Connection(String),
}
