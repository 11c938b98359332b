use thiserror::Error;

/// Voucher failures.
///
/// Validation failures are deliberately collapsed into a single
/// [`VoucherError::Invalid`] variant: the reason (bad base64, bad JSON, MAC
/// mismatch) is logged internally but never distinguished to the caller, so
/// a forged voucher can't be iteratively refined against error messages.
#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("voucher is invalid")]
    Invalid,
    #[error("invalid MAC key: {0}")]
    InvalidKey(String),
}
