use thiserror::Error;

/// Errors raised constructing or validating domain entities in [`crate`].
#[derive(Debug, Error)]
pub enum DomainError {
    /// A `single` strategy carried a cron expression, or a `periodic`
    /// strategy was missing one.
    #[error("strategy kind/cron mismatch: {0}")]
    StrategyShape(String),

    /// A quota amount that must be positive was zero or negative.
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    /// A lot balance went negative, which must never happen.
    #[error("lot amount cannot be negative, got {0}")]
    NegativeLotAmount(i64),
}
