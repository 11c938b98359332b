use qm_audit::AuditError;
use qm_gateway_client::GatewayError;
use qm_state::StateError;
use qm_voucher::VoucherError;
use thiserror::Error;

/// Errors raised by [`crate::QuotaLedger`] operations (spec §7).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A `transfer_out` request asked for more than a lot's available
    /// balance in this transaction.
    #[error("insufficient available quota")]
    InsufficientQuota,

    /// A `transfer_in` receiver did not match the voucher's `receiver_id`.
    #[error("voucher is not for this user")]
    NotReceiver,

    /// The voucher code had already been redeemed.
    #[error("voucher already redeemed")]
    AlreadyRedeemed,

    /// The voucher's MAC or encoding was invalid.
    #[error("invalid voucher")]
    InvalidVoucher,

    /// A gateway call failed after retry and the transaction was rolled back.
    #[error("gateway call failed: {0}")]
    Gateway(String),

    /// Persistence failure.
    #[error("persistence error: {0}")]
    State(#[from] StateError),

    /// Audit journal write failure.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}

impl From<GatewayError> for LedgerError {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e.to_string())
    }
}

impl From<VoucherError> for LedgerError {
    fn from(_: VoucherError) -> Self {
        Self::InvalidVoucher
    }
}
