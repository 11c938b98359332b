use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::GatewayClient;
use crate::error::GatewayError;

#[derive(Debug, Default, Clone, Copy)]
struct ConsumerState {
    quota: i64,
    used: i64,
}

/// In-memory [`GatewayClient`] double for tests, grounded on the in-memory
/// state-store pattern used elsewhere in this workspace.
#[derive(Debug, Default)]
pub struct MockGatewayClient {
    consumers: Mutex<HashMap<String, ConsumerState>>,
    model_permissions: Mutex<HashMap<String, Vec<String>>>,
    star_checks: Mutex<HashMap<String, bool>>,
    quota_checks: Mutex<HashMap<String, bool>>,
}

impl MockGatewayClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_used(&self, consumer: &str, used: i64) {
        let mut state = self.consumers.lock().await;
        state.entry(consumer.to_owned()).or_default().used = used;
    }

    pub async fn model_permission_for(&self, employee_number: &str) -> Option<Vec<String>> {
        self.model_permissions.lock().await.get(employee_number).cloned()
    }

    pub async fn star_check_for(&self, employee_number: &str) -> Option<bool> {
        self.star_checks.lock().await.get(employee_number).copied()
    }

    pub async fn quota_check_for(&self, employee_number: &str) -> Option<bool> {
        self.quota_checks.lock().await.get(employee_number).copied()
    }
}

#[async_trait]
impl GatewayClient for MockGatewayClient {
    async fn refresh_quota(&self, consumer: &str, quota: i64) -> Result<(), GatewayError> {
        let mut state = self.consumers.lock().await;
        state.entry(consumer.to_owned()).or_default().quota = quota;
        Ok(())
    }

    async fn get_quota(&self, consumer: &str) -> Result<i64, GatewayError> {
        Ok(self.consumers.lock().await.get(consumer).map_or(0, |s| s.quota))
    }

    async fn delta_quota(&self, consumer: &str, value: i64) -> Result<(), GatewayError> {
        let mut state = self.consumers.lock().await;
        state.entry(consumer.to_owned()).or_default().quota += value;
        Ok(())
    }

    async fn get_used(&self, consumer: &str) -> Result<i64, GatewayError> {
        Ok(self.consumers.lock().await.get(consumer).map_or(0, |s| s.used))
    }

    async fn delta_used(&self, consumer: &str, value: i64) -> Result<(), GatewayError> {
        let mut state = self.consumers.lock().await;
        state.entry(consumer.to_owned()).or_default().used += value;
        Ok(())
    }

    async fn push_model_permission(
        &self,
        employee_number: &str,
        models: &[String],
    ) -> Result<(), GatewayError> {
        self.model_permissions
            .lock()
            .await
            .insert(employee_number.to_owned(), models.to_vec());
        Ok(())
    }

    async fn push_star_check(&self, employee_number: &str, enabled: bool) -> Result<(), GatewayError> {
        self.star_checks.lock().await.insert(employee_number.to_owned(), enabled);
        Ok(())
    }

    async fn push_quota_check(&self, employee_number: &str, enabled: bool) -> Result<(), GatewayError> {
        self.quota_checks.lock().await.insert(employee_number.to_owned(), enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delta_accumulates_on_top_of_refresh() {
        let gw = MockGatewayClient::new();
        gw.refresh_quota("u1", 100).await.unwrap();
        gw.delta_quota("u1", -30).await.unwrap();
        assert_eq!(gw.get_quota("u1").await.unwrap(), 70);
    }

    #[tokio::test]
    async fn unseen_consumer_reads_as_zero() {
        let gw = MockGatewayClient::new();
        assert_eq!(gw.get_quota("nobody").await.unwrap(), 0);
        assert_eq!(gw.get_used("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn model_permission_push_is_recorded() {
        let gw = MockGatewayClient::new();
        gw.push_model_permission("e1", &["gpt-4".to_owned()]).await.unwrap();
        assert_eq!(gw.model_permission_for("e1").await, Some(vec!["gpt-4".to_owned()]));
    }
}
