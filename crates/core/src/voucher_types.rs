use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `(amount, expiry_date)` line item inside a voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherLot {
    /// Quota amount carried by this line item.
    pub amount: i64,
    /// The expiry date the receiving lot will carry, unchanged from the
    /// giver's original lot (spec §9, Open Question 1).
    pub expiry_date: DateTime<Utc>,
}

/// The signable content of a transfer voucher (spec §3 `Voucher`), i.e.
/// everything except the MAC itself. [`qm_voucher`](../qm_voucher/index.html)
/// (a sibling crate) canonicalizes and signs this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherPayload {
    /// The user who created the voucher.
    pub giver_id: String,
    /// Denormalized for display without a follow-up user lookup.
    pub giver_name: String,
    /// Denormalized contact info.
    pub giver_phone: String,
    /// Denormalized GitHub login.
    pub giver_github: String,
    /// Whether the giver held the star required by the issuing flow, at
    /// voucher-creation time.
    pub giver_has_required_star: bool,
    /// The user this voucher may be redeemed by.
    pub receiver_id: String,
    /// The lots this voucher transfers.
    pub quota_list: Vec<VoucherLot>,
    /// Random per-voucher value; defeats payload-replay via MAC reuse when
    /// two vouchers would otherwise canonicalize identically.
    pub nonce: String,
}

/// Marks a voucher code as spent (spec §3 `VoucherRedemption`).
///
/// Unique by `voucher_code`; the owning store's uniqueness constraint is
/// what actually prevents double-spend under concurrency (spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherRedemption {
    /// The redeemed voucher's opaque code.
    pub voucher_code: String,
    /// Who redeemed it.
    pub receiver_id: String,
    /// When the redemption was recorded.
    pub redeemed_at: DateTime<Utc>,
}

/// Per-lot outcome of a `transfer_in` call (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemedLotResult {
    /// The lot's amount.
    pub amount: i64,
    /// The lot's expiry date.
    pub expiry_date: DateTime<Utc>,
    /// Whether this particular lot was applied to the receiver's balance.
    pub success: bool,
    /// Whether the lot was rejected for having already expired.
    pub is_expired: bool,
}

/// Overall outcome of a `transfer_in` call (spec §4.5/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferInStatus {
    /// Every lot in the voucher was valid and applied.
    Success,
    /// Some lots were valid and applied, others had already expired.
    PartialSuccess,
    /// The voucher code was already redeemed by a prior call.
    AlreadyRedeemed,
    /// The call failed validation before any lot was considered.
    Failed,
}
