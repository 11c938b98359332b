use qm_core::{QuotaStrategy, User};
use serde::Deserialize;

/// Top-level configuration for the `quota-manager` binary.
///
/// Every section carries `#[serde(default)]`, so an empty TOML file (or a
/// missing one, per [`crate::load`]) deserializes to a complete,
/// memory-backed, localhost-pointed configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub gateway: GatewaySection,
    pub hr: HrSection,
    pub ledger: LedgerSection,
    pub permission: PermissionSection,
    pub scheduler: SchedulerSection,
    /// Strategies seeded into the strategy store at startup.
    pub strategies: Vec<QuotaStrategy>,
    /// The fixed user roster backing the strategy engine's candidate list.
    ///
    /// User lifecycle is externally managed and out of scope (no REST
    /// surface creates or updates these records here); `qm-hr-client` only
    /// carries department membership, not the quota-manager-owned fields
    /// (`github_stars`, `vip_level`, `inviter_id`) a condition needs, so a
    /// real deployment populates this from whatever external system owns
    /// user lifecycle and reloads the config to pick up roster changes.
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// IANA timezone name used to evaluate `valid_from`/`valid_to` windows
    /// and cron schedules for periodic strategies.
    pub timezone: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_owned(), port: 8080, timezone: "UTC".to_owned() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    pub postgres: PostgresSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresSection {
    pub url: String,
    pub pool_size: u32,
    pub schema: String,
    pub table_prefix: String,
}

impl Default for PostgresSection {
    fn default() -> Self {
        let defaults = qm_state::PostgresConfig::default();
        Self {
            url: defaults.url,
            pool_size: defaults.pool_size,
            schema: defaults.schema,
            table_prefix: defaults.table_prefix,
        }
    }
}

impl From<&PostgresSection> for qm_state::PostgresConfig {
    fn from(section: &PostgresSection) -> Self {
        Self {
            url: section.url.clone(),
            pool_size: section.pool_size,
            schema: section.schema.clone(),
            table_prefix: section.table_prefix.clone(),
        }
    }
}

impl PostgresSection {
    fn audit_config(&self) -> qm_audit::PostgresAuditConfig {
        qm_audit::PostgresAuditConfig::new(self.url.clone()).with_prefix(self.table_prefix.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub base_url: String,
    pub token: String,
    pub timeout_seconds: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self { base_url: "http://localhost:9100".to_owned(), token: String::new(), timeout_seconds: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HrSection {
    pub base_url: String,
}

impl Default for HrSection {
    fn default() -> Self {
        Self { base_url: "http://localhost:9200".to_owned() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// HMAC key for transfer vouchers, hex (64 chars) or base64.
    pub voucher_key: String,
    pub required_star_repo: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self { voucher_key: "0".repeat(64), required_star_repo: String::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncModeSetting {
    Strict,
    Permissive,
}

impl From<SyncModeSetting> for qm_permission::SyncMode {
    fn from(setting: SyncModeSetting) -> Self {
        match setting {
            SyncModeSetting::Strict => Self::Strict,
            SyncModeSetting::Permissive => Self::Permissive,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionSection {
    pub sync_mode: SyncModeSetting,
}

impl Default for PermissionSection {
    fn default() -> Self {
        Self { sync_mode: SyncModeSetting::Permissive }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub strategy_poll_interval_seconds: u64,
    pub expiry_sweep_interval_seconds: u64,
    pub hr_sync_interval_seconds: u64,
    pub enable_strategy_dispatch: bool,
    pub enable_expiry_sweep: bool,
    pub enable_hr_sync: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = qm_scheduler::SchedulerConfig::default();
        Self {
            strategy_poll_interval_seconds: defaults.strategy_poll_interval.as_secs(),
            expiry_sweep_interval_seconds: defaults.expiry_sweep_interval.as_secs(),
            hr_sync_interval_seconds: defaults.hr_sync_interval.as_secs(),
            enable_strategy_dispatch: defaults.enable_strategy_dispatch,
            enable_expiry_sweep: defaults.enable_expiry_sweep,
            enable_hr_sync: defaults.enable_hr_sync,
        }
    }
}

impl From<&SchedulerSection> for qm_scheduler::SchedulerConfig {
    fn from(section: &SchedulerSection) -> Self {
        Self {
            strategy_poll_interval: std::time::Duration::from_secs(section.strategy_poll_interval_seconds),
            expiry_sweep_interval: std::time::Duration::from_secs(section.expiry_sweep_interval_seconds),
            hr_sync_interval: std::time::Duration::from_secs(section.hr_sync_interval_seconds),
            enable_strategy_dispatch: section.enable_strategy_dispatch,
            enable_expiry_sweep: section.enable_expiry_sweep,
            enable_hr_sync: section.enable_hr_sync,
        }
    }
}

impl StorageSection {
    pub(crate) fn postgres_config(&self) -> qm_state::PostgresConfig {
        (&self.postgres).into()
    }

    pub(crate) fn postgres_audit_config(&self) -> qm_audit::PostgresAuditConfig {
        self.postgres.audit_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.strategies.is_empty());
    }

    #[test]
    fn partial_overrides_leave_the_rest_defaulted() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "postgres"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
    }
}
