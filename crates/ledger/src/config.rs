use qm_voucher::MacKey;

/// Construction-time settings for [`crate::QuotaLedger`].
#[derive(Clone)]
pub struct LedgerConfig {
    /// HMAC key used to sign and verify transfer vouchers.
    pub voucher_key: MacKey,
    /// The repository slug whose star is checked for the transfer-out
    /// "required star" bit (spec §3 `VoucherPayload.giver_has_required_star`).
    pub required_star_repo: String,
}

impl LedgerConfig {
    #[must_use]
    pub fn new(voucher_key: MacKey, required_star_repo: impl Into<String>) -> Self {
        Self { voucher_key, required_star_repo: required_star_repo.into() }
    }
}
