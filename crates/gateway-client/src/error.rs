use thiserror::Error;

/// Errors from calling the upstream gateway (spec §7: "Gateway: transient
/// (retried once) vs terminal (rolled back)").
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or 5xx — worth one local retry.
    #[error("transient gateway error: {0}")]
    Transient(String),
    /// 4xx or a malformed response — retrying would not help.
    #[error("terminal gateway error: {0}")]
    Terminal(String),
    /// Response body did not deserialize as expected.
    #[error("failed to decode gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Returns `true` if this error is worth one local retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() {
            Self::Transient(format!("HTTP {status}: {body}"))
        } else {
            Self::Terminal(format!("HTTP {status}: {body}"))
        }
    }
}
