use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of ledger mutation an audit row records (spec §3).
///
/// Sign convention: [`AuditOperation::Recharge`] and
/// [`AuditOperation::TransferIn`] carry positive `amount`;
/// [`AuditOperation::TransferOut`] and [`AuditOperation::Expire`] carry
/// negative `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// Quota issued by a strategy dispatch.
    Recharge,
    /// Quota received via voucher redemption.
    TransferIn,
    /// Quota sent away via voucher creation.
    TransferOut,
    /// Quota destroyed by the expiry sweep.
    Expire,
}

impl AuditOperation {
    /// Returns the sign this operation's `amount` must carry.
    #[must_use]
    pub fn expected_sign(self) -> i8 {
        match self {
            Self::Recharge | Self::TransferIn => 1,
            Self::TransferOut | Self::Expire => -1,
        }
    }
}

/// An append-only journal row (spec §3 `QuotaAudit`, GLOSSARY).
///
/// `expiry_date` on a multi-lot operation is the earliest expiry among the
/// affected lots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaAudit {
    /// Unique identifier.
    pub id: String,
    /// The user this row pertains to.
    pub user_id: String,
    /// The kind of mutation.
    pub operation: AuditOperation,
    /// Signed amount; see [`AuditOperation::expected_sign`].
    pub amount: i64,
    /// Earliest expiry date among the lots affected by this operation.
    pub expiry_date: DateTime<Utc>,
    /// The strategy that issued this row, for `Recharge` rows.
    #[serde(default)]
    pub strategy_name: Option<String>,
    /// The voucher code involved, for `TransferIn`/`TransferOut` rows.
    #[serde(default)]
    pub voucher_code: Option<String>,
    /// When this row was written.
    pub created_at: DateTime<Utc>,
}

impl QuotaAudit {
    /// Returns `true` if `amount`'s sign matches [`AuditOperation::expected_sign`].
    #[must_use]
    pub fn has_consistent_sign(&self) -> bool {
        match self.operation.expected_sign() {
            1 => self.amount > 0,
            _ => self.amount < 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(op: AuditOperation, amount: i64) -> QuotaAudit {
        QuotaAudit {
            id: "a1".into(),
            user_id: "u1".into(),
            operation: op,
            amount,
            expiry_date: Utc::now(),
            strategy_name: None,
            voucher_code: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn recharge_and_transfer_in_are_positive() {
        assert!(row(AuditOperation::Recharge, 10).has_consistent_sign());
        assert!(row(AuditOperation::TransferIn, 10).has_consistent_sign());
        assert!(!row(AuditOperation::Recharge, -10).has_consistent_sign());
    }

    #[test]
    fn transfer_out_and_expire_are_negative() {
        assert!(row(AuditOperation::TransferOut, -10).has_consistent_sign());
        assert!(row(AuditOperation::Expire, -10).has_consistent_sign());
        assert!(!row(AuditOperation::Expire, 10).has_consistent_sign());
    }
}
