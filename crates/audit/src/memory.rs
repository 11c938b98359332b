use async_trait::async_trait;
use qm_core::QuotaAudit;
use tokio::sync::Mutex;

use crate::error::AuditError;
use crate::query::{AuditPage, AuditQuery};
use crate::store::AuditStore;

/// In-memory [`AuditStore`], test double for `qm-ledger`/`qm-permission`
/// unit tests.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    rows: Mutex<Vec<QuotaAudit>>,
}

impl MemoryAuditStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, entry: QuotaAudit) -> Result<(), AuditError> {
        self.rows.lock().await.push(entry);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<QuotaAudit>, AuditError> {
        let rows = self.rows.lock().await;
        let mut matched: Vec<QuotaAudit> =
            rows.iter().filter(|r| r.user_id == user_id).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let rows = self.rows.lock().await;
        let mut matched: Vec<QuotaAudit> = rows
            .iter()
            .filter(|r| query.user_id.as_deref().is_none_or(|u| r.user_id == u))
            .filter(|r| query.operation.is_none_or(|op| r.operation == op))
            .filter(|r| query.from.is_none_or(|from| r.created_at >= from))
            .filter(|r| query.to.is_none_or(|to| r.created_at <= to))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let records = matched.into_iter().skip(offset as usize).take(limit as usize).collect();

        Ok(AuditPage { records, total, limit, offset })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use qm_core::AuditOperation;

    use super::*;

    fn row(user: &str, op: AuditOperation, amount: i64) -> QuotaAudit {
        QuotaAudit {
            id: uuid_stub(),
            user_id: user.into(),
            operation: op,
            amount,
            expiry_date: Utc::now(),
            strategy_name: None,
            voucher_code: None,
            created_at: Utc::now(),
        }
    }

    fn uuid_stub() -> String {
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        format!("a{}", COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }

    #[tokio::test]
    async fn records_and_lists_for_user() {
        let store = MemoryAuditStore::new();
        store.record(row("u1", AuditOperation::Recharge, 10)).await.unwrap();
        store.record(row("u2", AuditOperation::Recharge, 20)).await.unwrap();

        let rows = store.list_for_user("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 10);
    }

    #[tokio::test]
    async fn query_filters_by_operation() {
        let store = MemoryAuditStore::new();
        store.record(row("u1", AuditOperation::Recharge, 10)).await.unwrap();
        store.record(row("u1", AuditOperation::Expire, -5)).await.unwrap();

        let page = store
            .query(&AuditQuery { operation: Some(AuditOperation::Expire), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].amount, -5);
    }

    #[tokio::test]
    async fn query_paginates() {
        let store = MemoryAuditStore::new();
        for i in 0..5 {
            store.record(row("u1", AuditOperation::Recharge, i)).await.unwrap();
        }
        let page = store
            .query(&AuditQuery { limit: Some(2), offset: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 2);
    }
}
