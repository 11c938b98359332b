use thiserror::Error;

/// Failures from parsing or evaluating a condition expression.
#[derive(Debug, Error)]
pub enum CondError {
    #[error("unexpected end of input while parsing condition")]
    UnexpectedEof,
    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),
    #[error("expected `{expected}` at position {pos}, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        pos: usize,
    },
    #[error("malformed timestamp literal `{0}`, expected YYYY-MM-DD HH:MM:SS")]
    BadTimestamp(String),
    #[error("malformed integer literal `{0}`")]
    BadInteger(String),
    #[error("trailing input after condition: `{0}`")]
    TrailingInput(String),
    #[error("gateway lookup failed while evaluating quota-le: {0}")]
    GatewayLookup(String),
}
