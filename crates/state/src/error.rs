use thiserror::Error;

/// Persistence-layer failures (spec §7 "Internal: DB error").
#[derive(Debug, Error)]
pub enum StateError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("transaction already completed")]
    TransactionClosed,
}
