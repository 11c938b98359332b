use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle state of a [`QuotaLot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    /// Usable: counts toward the user's total and is eligible for transfer.
    Valid,
    /// Past its expiry date and reconciled with the gateway; frozen forever.
    Expired,
}

/// An indivisible quantum of granted quota with an expiry date (spec §3,
/// GLOSSARY "Lot").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaLot {
    /// Unique identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Remaining balance. Never negative.
    pub amount: i64,
    /// When this lot stops being usable.
    pub expiry_date: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: LotStatus,
}

impl QuotaLot {
    /// Returns `true` if the lot is [`LotStatus::Valid`] and `now` is before
    /// `expiry_date`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LotStatus::Valid && self.expiry_date > now
    }

    /// Decrement the lot's balance by `delta`, rejecting a negative result.
    ///
    /// # Errors
    /// Returns [`DomainError::NegativeLotAmount`] if `delta` exceeds the
    /// current balance.
    pub fn decrement(&mut self, delta: i64) -> Result<(), DomainError> {
        let new_amount = self.amount - delta;
        if new_amount < 0 {
            return Err(DomainError::NegativeLotAmount(new_amount));
        }
        self.amount = new_amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(amount: i64, expiry: &str) -> QuotaLot {
        QuotaLot {
            id: "l1".into(),
            user_id: "u1".into(),
            amount,
            expiry_date: DateTime::parse_from_rfc3339(expiry)
                .unwrap()
                .with_timezone(&Utc),
            status: LotStatus::Valid,
        }
    }

    #[test]
    fn usable_requires_valid_and_unexpired() {
        let now = DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut l = lot(10, "2026-07-01T00:00:00Z");
        assert!(l.is_usable_at(now));
        l.status = LotStatus::Expired;
        assert!(!l.is_usable_at(now));
    }

    #[test]
    fn expired_lot_not_usable() {
        let now = DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let l = lot(10, "2026-01-01T00:00:00Z");
        assert!(!l.is_usable_at(now));
    }

    #[test]
    fn decrement_rejects_overdraw() {
        let mut l = lot(10, "2026-07-01T00:00:00Z");
        assert!(l.decrement(5).is_ok());
        assert_eq!(l.amount, 5);
        assert!(l.decrement(6).is_err());
        assert_eq!(l.amount, 5, "failed decrement must not mutate balance");
    }

    #[test]
    fn decrement_to_exactly_zero_ok() {
        let mut l = lot(10, "2026-07-01T00:00:00Z");
        assert!(l.decrement(10).is_ok());
        assert_eq!(l.amount, 0);
    }
}
