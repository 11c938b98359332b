use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use qm_core::User;

use crate::error::CondError;

/// Lazy gateway-backed lookup for the `quota-le` predicate (spec §4.3: the
/// only predicate that needs a round trip rather than a field on [`User`]).
///
/// Kept as a trait object so `qm-condition` never depends on the gateway
/// client crate directly; callers (`qm-strategy`) supply an adapter.
#[async_trait]
pub trait QuotaLookup: Send + Sync {
    async fn total_quota(&self, user_id: &str, model: &str) -> Result<i64, CondError>;
}

/// Everything [`crate::eval::eval`] needs to resolve a condition for one
/// user at one instant.
pub struct EvalContext<'a> {
    pub user: &'a User,
    pub now: DateTime<Utc>,
    pub server_tz: Tz,
    pub quota: &'a dyn QuotaLookup,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(user: &'a User, now: DateTime<Utc>, server_tz: Tz, quota: &'a dyn QuotaLookup) -> Self {
        Self { user, now, server_tz, quota }
    }
}
