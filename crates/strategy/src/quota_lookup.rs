//! Bridges [`qm_condition::QuotaLookup`] to the gateway client.

use std::sync::Arc;

use async_trait::async_trait;
use qm_condition::{CondError, QuotaLookup};
use qm_gateway_client::GatewayClient;

/// The gateway exposes one quota pool per user, not one per `(user, model)`,
/// so `model` is accepted for API compatibility with the condition
/// language's `quota-le(model, n)` predicate and ignored.
pub struct GatewayQuotaLookup {
    gateway: Arc<dyn GatewayClient>,
}

impl GatewayQuotaLookup {
    #[must_use]
    pub fn new(gateway: Arc<dyn GatewayClient>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl QuotaLookup for GatewayQuotaLookup {
    async fn total_quota(&self, user_id: &str, _model: &str) -> Result<i64, CondError> {
        self.gateway.get_quota(user_id).await.map_err(|e| CondError::GatewayLookup(e.to_string()))
    }
}
