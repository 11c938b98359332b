use async_trait::async_trait;
use qm_core::QuotaStrategy;

use crate::error::StrategyError;

/// Persists `QuotaStrategy` entities. `QuotaExecute` idempotency rows live
/// in `qm_state::Transaction` instead, since they are written atomically
/// alongside lots and audits.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn create(&self, strategy: QuotaStrategy) -> Result<(), StrategyError>;
    async fn get(&self, id: &str) -> Result<Option<QuotaStrategy>, StrategyError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<QuotaStrategy>, StrategyError>;
    async fn update(&self, strategy: QuotaStrategy) -> Result<(), StrategyError>;
    async fn list_enabled(&self) -> Result<Vec<QuotaStrategy>, StrategyError>;
    async fn list_all(&self) -> Result<Vec<QuotaStrategy>, StrategyError>;
}
