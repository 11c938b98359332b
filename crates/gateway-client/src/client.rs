use async_trait::async_trait;

use crate::error::GatewayError;

/// The upstream gateway's quota and permission admin API (spec §6).
///
/// Implementations must classify failures as [`GatewayError::Transient`]
/// (worth a local retry) or [`GatewayError::Terminal`] (fail fast).
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// `POST {admin}/quota/refresh` — absolute set of a consumer's total quota.
    async fn refresh_quota(&self, consumer: &str, quota: i64) -> Result<(), GatewayError>;

    /// `GET {admin}/quota` — read a consumer's total quota.
    async fn get_quota(&self, consumer: &str) -> Result<i64, GatewayError>;

    /// `POST {admin}/quota/delta` — apply a signed delta to total quota.
    async fn delta_quota(&self, consumer: &str, value: i64) -> Result<(), GatewayError>;

    /// `GET {admin}/quota/used` — read a consumer's used quota.
    async fn get_used(&self, consumer: &str) -> Result<i64, GatewayError>;

    /// `POST {admin}/quota/used/delta` — apply a signed delta to used quota.
    async fn delta_used(&self, consumer: &str, value: i64) -> Result<(), GatewayError>;

    /// `POST {admin}/model-permission` — push the full effective model set
    /// for one employee (`set`, never a delta).
    async fn push_model_permission(
        &self,
        employee_number: &str,
        models: &[String],
    ) -> Result<(), GatewayError>;

    /// `POST {admin}/star-check` — push the effective star-check flag.
    async fn push_star_check(&self, employee_number: &str, enabled: bool) -> Result<(), GatewayError>;

    /// `POST {admin}/quota-check` — push the effective quota-check flag.
    async fn push_quota_check(&self, employee_number: &str, enabled: bool) -> Result<(), GatewayError>;
}
