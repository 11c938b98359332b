use thiserror::Error;

use qm_condition::CondError;
use qm_ledger::LedgerError;
use qm_state::StateError;

/// Failures from cron expression or timezone validation, grounded on
/// `crates/core/src/recurring.rs`'s `CronValidationError`.
#[derive(Debug, Clone, Error)]
pub enum CronError {
    #[error("invalid cron expression: {0}")]
    InvalidExpression(String),
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Errors raised by [`crate::StrategyEngine`] (spec §7).
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("condition parse error: {0}")]
    Condition(#[from] CondError),
    #[error(transparent)]
    Cron(#[from] CronError),
    #[error("strategy shape error: {0}")]
    Shape(#[from] qm_core::DomainError),
    #[error("a strategy named '{0}' already exists")]
    DuplicateName(String),
    #[error("strategy not found: {0}")]
    NotFound(String),
    #[error("persistence error: {0}")]
    State(#[from] StateError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("directory error: {0}")]
    Directory(String),
}
