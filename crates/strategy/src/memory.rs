use std::collections::BTreeMap;

use async_trait::async_trait;
use qm_core::QuotaStrategy;
use tokio::sync::Mutex;

use crate::error::StrategyError;
use crate::store::StrategyStore;

/// An in-memory `StrategyStore`, for tests and small deployments.
#[derive(Default)]
pub struct MemoryStrategyStore {
    strategies: Mutex<BTreeMap<String, QuotaStrategy>>,
}

impl MemoryStrategyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StrategyStore for MemoryStrategyStore {
    async fn create(&self, strategy: QuotaStrategy) -> Result<(), StrategyError> {
        let mut guard = self.strategies.lock().await;
        if guard.values().any(|s| s.name == strategy.name) {
            return Err(StrategyError::DuplicateName(strategy.name));
        }
        guard.insert(strategy.id.clone(), strategy);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<QuotaStrategy>, StrategyError> {
        Ok(self.strategies.lock().await.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<QuotaStrategy>, StrategyError> {
        Ok(self.strategies.lock().await.values().find(|s| s.name == name).cloned())
    }

    async fn update(&self, strategy: QuotaStrategy) -> Result<(), StrategyError> {
        let mut guard = self.strategies.lock().await;
        if !guard.contains_key(&strategy.id) {
            return Err(StrategyError::NotFound(strategy.id));
        }
        guard.insert(strategy.id.clone(), strategy);
        Ok(())
    }

    async fn list_enabled(&self) -> Result<Vec<QuotaStrategy>, StrategyError> {
        Ok(self.strategies.lock().await.values().filter(|s| s.enabled).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<QuotaStrategy>, StrategyError> {
        Ok(self.strategies.lock().await.values().cloned().collect())
    }
}
