use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qm_core::{
    CheckFlag, CheckFlavor, EffectiveCheckFlag, EffectivePermission, QuotaExecute, QuotaLot,
    Scope, VoucherRedemption, WhitelistEntry,
};

use crate::error::StateError;

/// Persists the ledger and permission tables (spec §3 entities).
///
/// A store hands out [`Transaction`]s; every write in this crate's
/// downstream crates (`qm-ledger`, `qm-permission`) happens inside one,
/// committed or rolled back as a unit (spec §5: "single database
/// transaction").
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StateError>;
}

/// A unit-of-work over the ledger and permission tables.
///
/// Object-safe so callers can hold `Box<dyn Transaction>` without knowing
/// the backend. Every mutating method takes `&mut self`; the transaction is
/// consumed by [`Transaction::commit`] or [`Transaction::rollback`].
#[async_trait]
pub trait Transaction: Send {
    // -- QuotaLot --
    async fn valid_lots_for_user(&mut self, user_id: &str) -> Result<Vec<QuotaLot>, StateError>;
    async fn lot_at_expiry(
        &mut self,
        user_id: &str,
        expiry_date: DateTime<Utc>,
    ) -> Result<Option<QuotaLot>, StateError>;
    async fn save_lot(&mut self, lot: &QuotaLot) -> Result<(), StateError>;
    async fn lots_due_for_expiry(&mut self, now: DateTime<Utc>) -> Result<Vec<QuotaLot>, StateError>;

    // -- QuotaExecute (strategy dispatch idempotency) --
    async fn find_execute(
        &mut self,
        strategy_id: &str,
        user_id: &str,
        batch_id: &str,
    ) -> Result<Option<QuotaExecute>, StateError>;
    async fn save_execute(&mut self, execute: &QuotaExecute) -> Result<(), StateError>;

    // -- VoucherRedemption --
    async fn find_redemption(
        &mut self,
        voucher_code: &str,
    ) -> Result<Option<VoucherRedemption>, StateError>;
    async fn save_redemption(&mut self, redemption: &VoucherRedemption) -> Result<(), StateError>;

    // -- WhitelistEntry / CheckFlag --
    async fn find_whitelist(
        &mut self,
        scope: Scope,
        key: &str,
    ) -> Result<Option<WhitelistEntry>, StateError>;
    async fn save_whitelist(&mut self, entry: &WhitelistEntry) -> Result<(), StateError>;
    async fn find_check_flag(
        &mut self,
        flavor: CheckFlavor,
        scope: Scope,
        key: &str,
    ) -> Result<Option<CheckFlag>, StateError>;
    async fn save_check_flag(&mut self, flag: &CheckFlag) -> Result<(), StateError>;

    // -- Effective rows (derived, gateway-authoritative) --
    async fn find_effective_permission(
        &mut self,
        user_id: &str,
    ) -> Result<Option<EffectivePermission>, StateError>;
    async fn save_effective_permission(
        &mut self,
        permission: &EffectivePermission,
    ) -> Result<(), StateError>;
    async fn find_effective_check_flag(
        &mut self,
        user_id: &str,
        flavor: CheckFlavor,
    ) -> Result<Option<EffectiveCheckFlag>, StateError>;
    async fn save_effective_check_flag(
        &mut self,
        user_id: &str,
        flag: EffectiveCheckFlag,
    ) -> Result<(), StateError>;
    /// Purge every derived row for a user (spec §4.6: "removed employees
    /// have their derived rows purged").
    async fn delete_effective_rows(&mut self, user_id: &str) -> Result<(), StateError>;
    /// Every user id with a persisted effective-permission or
    /// effective-check-flag row, the durable record HR sync diffs the
    /// current employee roster against to find removed employees (spec
    /// §4.6) without keeping an in-process cache across requests.
    async fn list_known_user_ids(&mut self) -> Result<Vec<String>, StateError>;

    async fn commit(self: Box<Self>) -> Result<(), StateError>;
    async fn rollback(self: Box<Self>) -> Result<(), StateError>;
}
