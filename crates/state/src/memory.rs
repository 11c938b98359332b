use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qm_core::{
    CheckFlag, CheckFlavor, EffectiveCheckFlag, EffectivePermission, LotStatus, QuotaExecute,
    QuotaLot, Scope, VoucherRedemption, WhitelistEntry,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StateError;
use crate::store::{LedgerStore, Transaction};

#[derive(Debug, Default, Clone)]
struct LedgerData {
    lots: Vec<QuotaLot>,
    executes: Vec<QuotaExecute>,
    redemptions: Vec<VoucherRedemption>,
    whitelists: Vec<WhitelistEntry>,
    check_flags: Vec<CheckFlag>,
    effective_permissions: Vec<EffectivePermission>,
    effective_check_flags: Vec<(String, CheckFlavor, bool)>,
}

/// In-memory [`LedgerStore`], test double used by `qm-ledger`/`qm-permission`
/// unit tests.
///
/// A transaction holds the single store-wide lock for its entire lifetime,
/// which serializes all writers (no per-row locking) but keeps rollback
/// trivial: take a snapshot at `begin`, restore it on `rollback`. This
/// trades memory-backend throughput for the simplicity appropriate to a
/// test double; [`crate::postgres::PostgresLedgerStore`] does real
/// row-level locking for production use.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    data: Arc<Mutex<LedgerData>>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StateError> {
        let guard = Arc::clone(&self.data).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, snapshot, done: false }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<LedgerData>,
    snapshot: LedgerData,
    done: bool,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn valid_lots_for_user(&mut self, user_id: &str) -> Result<Vec<QuotaLot>, StateError> {
        Ok(self
            .guard
            .lots
            .iter()
            .filter(|lot| lot.user_id == user_id && lot.status == LotStatus::Valid)
            .cloned()
            .collect())
    }

    async fn lot_at_expiry(
        &mut self,
        user_id: &str,
        expiry_date: DateTime<Utc>,
    ) -> Result<Option<QuotaLot>, StateError> {
        Ok(self
            .guard
            .lots
            .iter()
            .find(|lot| lot.user_id == user_id && lot.expiry_date == expiry_date)
            .cloned())
    }

    async fn save_lot(&mut self, lot: &QuotaLot) -> Result<(), StateError> {
        if let Some(existing) = self.guard.lots.iter_mut().find(|l| l.id == lot.id) {
            *existing = lot.clone();
        } else {
            self.guard.lots.push(lot.clone());
        }
        Ok(())
    }

    async fn lots_due_for_expiry(&mut self, now: DateTime<Utc>) -> Result<Vec<QuotaLot>, StateError> {
        Ok(self
            .guard
            .lots
            .iter()
            .filter(|lot| lot.status == LotStatus::Valid && lot.expiry_date < now)
            .cloned()
            .collect())
    }

    async fn find_execute(
        &mut self,
        strategy_id: &str,
        user_id: &str,
        batch_id: &str,
    ) -> Result<Option<QuotaExecute>, StateError> {
        // `batch_id` is `""` for `single` strategies (empty-string sentinel
        // for "no batch", matching `PostgresLedgerStore`'s column
        // convention since SQL uniqueness constraints don't compose well
        // with NULL).
        Ok(self
            .guard
            .executes
            .iter()
            .find(|e| {
                e.strategy_id == strategy_id
                    && e.user_id == user_id
                    && e.batch_id.as_deref().unwrap_or("") == batch_id
            })
            .cloned())
    }

    async fn save_execute(&mut self, execute: &QuotaExecute) -> Result<(), StateError> {
        let key_batch = execute.batch_id.as_deref().unwrap_or("");
        if let Some(existing) = self.guard.executes.iter_mut().find(|e| {
            e.strategy_id == execute.strategy_id
                && e.user_id == execute.user_id
                && e.batch_id.as_deref().unwrap_or("") == key_batch
        }) {
            *existing = execute.clone();
        } else {
            self.guard.executes.push(execute.clone());
        }
        Ok(())
    }

    async fn find_redemption(
        &mut self,
        voucher_code: &str,
    ) -> Result<Option<VoucherRedemption>, StateError> {
        Ok(self.guard.redemptions.iter().find(|r| r.voucher_code == voucher_code).cloned())
    }

    async fn save_redemption(&mut self, redemption: &VoucherRedemption) -> Result<(), StateError> {
        self.guard.redemptions.push(redemption.clone());
        Ok(())
    }

    async fn find_whitelist(
        &mut self,
        scope: Scope,
        key: &str,
    ) -> Result<Option<WhitelistEntry>, StateError> {
        Ok(self.guard.whitelists.iter().find(|w| w.scope == scope && w.key == key).cloned())
    }

    async fn save_whitelist(&mut self, entry: &WhitelistEntry) -> Result<(), StateError> {
        if let Some(existing) =
            self.guard.whitelists.iter_mut().find(|w| w.scope == entry.scope && w.key == entry.key)
        {
            *existing = entry.clone();
        } else {
            self.guard.whitelists.push(entry.clone());
        }
        Ok(())
    }

    async fn find_check_flag(
        &mut self,
        flavor: CheckFlavor,
        scope: Scope,
        key: &str,
    ) -> Result<Option<CheckFlag>, StateError> {
        Ok(self
            .guard
            .check_flags
            .iter()
            .find(|f| f.flavor == flavor && f.scope == scope && f.key == key)
            .cloned())
    }

    async fn save_check_flag(&mut self, flag: &CheckFlag) -> Result<(), StateError> {
        if let Some(existing) = self
            .guard
            .check_flags
            .iter_mut()
            .find(|f| f.flavor == flag.flavor && f.scope == flag.scope && f.key == flag.key)
        {
            *existing = flag.clone();
        } else {
            self.guard.check_flags.push(flag.clone());
        }
        Ok(())
    }

    async fn find_effective_permission(
        &mut self,
        user_id: &str,
    ) -> Result<Option<EffectivePermission>, StateError> {
        Ok(self.guard.effective_permissions.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn save_effective_permission(
        &mut self,
        permission: &EffectivePermission,
    ) -> Result<(), StateError> {
        if let Some(existing) =
            self.guard.effective_permissions.iter_mut().find(|p| p.user_id == permission.user_id)
        {
            *existing = permission.clone();
        } else {
            self.guard.effective_permissions.push(permission.clone());
        }
        Ok(())
    }

    async fn find_effective_check_flag(
        &mut self,
        user_id: &str,
        flavor: CheckFlavor,
    ) -> Result<Option<EffectiveCheckFlag>, StateError> {
        Ok(self
            .guard
            .effective_check_flags
            .iter()
            .find(|(uid, flv, _)| uid == user_id && *flv == flavor)
            .map(|(_, flavor, enabled)| EffectiveCheckFlag { flavor: *flavor, enabled: *enabled }))
    }

    async fn save_effective_check_flag(
        &mut self,
        user_id: &str,
        flag: EffectiveCheckFlag,
    ) -> Result<(), StateError> {
        if let Some(existing) = self
            .guard
            .effective_check_flags
            .iter_mut()
            .find(|(uid, flv, _)| uid == user_id && *flv == flag.flavor)
        {
            existing.2 = flag.enabled;
        } else {
            self.guard.effective_check_flags.push((user_id.to_owned(), flag.flavor, flag.enabled));
        }
        Ok(())
    }

    async fn delete_effective_rows(&mut self, user_id: &str) -> Result<(), StateError> {
        self.guard.effective_permissions.retain(|p| p.user_id != user_id);
        self.guard.effective_check_flags.retain(|(uid, _, _)| uid != user_id);
        Ok(())
    }

    async fn list_known_user_ids(&mut self) -> Result<Vec<String>, StateError> {
        let mut ids: std::collections::BTreeSet<String> =
            self.guard.effective_permissions.iter().map(|p| p.user_id.clone()).collect();
        ids.extend(self.guard.effective_check_flags.iter().map(|(uid, _, _)| uid.clone()));
        Ok(ids.into_iter().collect())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StateError> {
        self.done = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StateError> {
        *self.guard = self.snapshot.clone();
        self.done = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use qm_core::LotStatus;

    use super::*;

    fn sample_lot(id: &str, user: &str, amount: i64) -> QuotaLot {
        QuotaLot {
            id: id.into(),
            user_id: user.into(),
            amount,
            expiry_date: Utc::now() + chrono::Duration::days(30),
            status: LotStatus::Valid,
        }
    }

    #[tokio::test]
    async fn commit_persists_writes() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.save_lot(&sample_lot("l1", "u1", 100)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx2 = store.begin().await.unwrap();
        let lots = tx2.valid_lots_for_user("u1").await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].amount, 100);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.save_lot(&sample_lot("l1", "u1", 100)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx2 = store.begin().await.unwrap();
        let lots = tx2.valid_lots_for_user("u1").await.unwrap();
        assert!(lots.is_empty());
    }

    #[tokio::test]
    async fn transactions_serialize() {
        let store = Arc::new(MemoryLedgerStore::new());
        let store2 = Arc::clone(&store);
        let tx1 = store.begin().await.unwrap();

        let handle = tokio::spawn(async move {
            // This will block until tx1 is dropped, proving serialization.
            let tx2 = store2.begin().await.unwrap();
            tx2.commit().await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        tx1.commit().await.unwrap();
        handle.await.unwrap();
    }
}
