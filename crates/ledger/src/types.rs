use chrono::{DateTime, Utc};
use qm_core::{RedeemedLotResult, TransferInStatus, VoucherLot};

/// One `(amount, expiry_date)` row in a [`UserQuotaSummary`] (spec §4.5
/// `get_user_quota`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotView {
    pub amount: i64,
    pub expiry_date: DateTime<Utc>,
}

/// Result of [`crate::QuotaLedger::get_user_quota`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuotaSummary {
    /// Sum of valid lot amounts.
    pub total: i64,
    /// Gateway-reported used quota; the source of truth for consumption.
    pub used: i64,
    /// Valid, nonzero lots ordered by ascending `expiry_date`.
    pub lots: Vec<LotView>,
}

/// Request body for [`crate::QuotaLedger::transfer_out`].
#[derive(Debug, Clone)]
pub struct TransferOutRequest {
    pub receiver_id: String,
    pub quota_list: Vec<VoucherLot>,
}

/// Result of [`crate::QuotaLedger::transfer_out`].
#[derive(Debug, Clone)]
pub struct TransferOutResult {
    pub voucher_code: String,
}

/// Result of [`crate::QuotaLedger::transfer_in`].
#[derive(Debug, Clone)]
pub struct TransferInResult {
    pub giver_id: String,
    pub amount: i64,
    pub status: TransferInStatus,
    pub quota_list: Vec<RedeemedLotResult>,
}

impl TransferInResult {
    pub(crate) fn already_redeemed(giver_id: String) -> Self {
        Self { giver_id, amount: 0, status: TransferInStatus::AlreadyRedeemed, quota_list: Vec::new() }
    }
}
