use chrono::{DateTime, Utc};
use qm_core::{AuditOperation, QuotaAudit};

/// Filter and pagination parameters for [`crate::store::AuditStore::query`].
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    /// Restrict to one user's rows.
    pub user_id: Option<String>,
    /// Restrict to one operation kind.
    pub operation: Option<AuditOperation>,
    /// Only rows created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only rows created at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Maximum rows to return (default 50, max 1000).
    pub limit: Option<u32>,
    /// Rows to skip for pagination.
    pub offset: Option<u32>,
}

impl AuditQuery {
    /// Effective limit, clamped to `1..=1000`, defaulting to 50.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }

    /// Effective offset, defaulting to 0.
    #[must_use]
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// A page of [`QuotaAudit`] rows, newest first unless otherwise noted.
#[derive(Debug, Clone)]
pub struct AuditPage {
    pub records: Vec<QuotaAudit>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_to_range() {
        let q = AuditQuery { limit: Some(5000), ..Default::default() };
        assert_eq!(q.effective_limit(), 1000);
        let q = AuditQuery { limit: Some(0), ..Default::default() };
        assert_eq!(q.effective_limit(), 1);
        let q = AuditQuery::default();
        assert_eq!(q.effective_limit(), 50);
    }
}
