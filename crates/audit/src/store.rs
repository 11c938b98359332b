use async_trait::async_trait;
use qm_core::QuotaAudit;

use crate::error::AuditError;
use crate::query::{AuditPage, AuditQuery};

/// Trait for `QuotaAudit` storage backends.
///
/// The journal is append-only: there is no update or delete, only
/// [`AuditStore::record`] and the read paths below. Implementations must be
/// `Send + Sync` to be shared across the async tasks that write ledger and
/// permission audit rows concurrently.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a row to the journal.
    async fn record(&self, entry: QuotaAudit) -> Result<(), AuditError>;

    /// All rows for a user, newest first. Used by the sum-reconciliation
    /// invariant (spec §8: "for every user, sum of valid lots equals sum of
    /// signed audit amounts").
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<QuotaAudit>, AuditError>;

    /// Filtered, paginated read path for an admin/reporting surface.
    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError>;
}
