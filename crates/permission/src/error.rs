use qm_gateway_client::GatewayError;
use qm_hr_client::HrError;
use qm_state::StateError;
use thiserror::Error;

/// Errors raised by [`crate::PermissionComposer`] (spec §7).
#[derive(Debug, Error)]
pub enum PermissionError {
    /// `set_user_whitelist`/`set_user_check_flag` in strict sync mode
    /// against a user key absent from the current employee roster.
    #[error("user not found: {0}")]
    UserNotFound(String),
    /// `set_department_whitelist`/`set_department_check_flag` against a
    /// department key no employee currently maps to.
    #[error("department not found or has no members: {0}")]
    DepartmentNotFound(String),
    #[error("persistence error: {0}")]
    State(#[from] StateError),
    #[error("gateway push failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("HR source error: {0}")]
    Hr(#[from] HrError),
}
