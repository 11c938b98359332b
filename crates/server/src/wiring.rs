use std::sync::Arc;

use chrono_tz::Tz;
use qm_audit::{AuditStore, MemoryAuditStore, PostgresAuditStore};
use qm_core::{Clock, SystemClock};
use qm_gateway_client::{GatewayClient, HttpGatewayClientBuilder};
use qm_hr_client::{HrClient, HttpHrClient};
use qm_ledger::{LedgerConfig, QuotaLedger};
use qm_permission::{PermissionComposer, PermissionConfig};
use qm_scheduler::BackgroundProcessor;
use qm_state::{LedgerStore, MemoryLedgerStore, PostgresLedgerStore};
use qm_strategy::{GatewayQuotaLookup, MemoryStrategyStore, StaticUserDirectory, StrategyEngine, StrategyStore};
use tokio::sync::mpsc;

use crate::config::{AppConfig, StorageBackend};
use crate::error::ServerError;
use crate::health::AppState;

/// Every long-lived component the binary needs, assembled from an
/// [`AppConfig`]. Held together in one struct so `main` only has to own
/// and shut down one thing.
pub struct AppContext {
    pub health_state: AppState,
    pub scheduler: BackgroundProcessor,
    pub scheduler_shutdown: mpsc::Sender<()>,
    pub server_addr: String,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").field("server_addr", &self.server_addr).finish_non_exhaustive()
    }
}

/// Wire every domain crate together per an [`AppConfig`]. The strategy
/// engine's candidate roster (`directory`) comes straight from
/// `config.users`: restarting the process (or reloading config, once that
/// exists) is how a real deployment picks up roster changes, since user
/// lifecycle is owned by a system out of scope here.
pub async fn build(config: &AppConfig) -> Result<AppContext, ServerError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let server_tz: Tz = config.server.timezone.parse().unwrap_or(chrono_tz::UTC);

    let gateway: Arc<dyn GatewayClient> = Arc::new(
        HttpGatewayClientBuilder::new(config.gateway.base_url.clone(), config.gateway.token.clone())
            .timeout(std::time::Duration::from_secs(config.gateway.timeout_seconds))
            .build()?,
    );
    let hr: Arc<dyn HrClient> = Arc::new(HttpHrClient::new(config.hr.base_url.clone()));

    let state: Arc<dyn LedgerStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryLedgerStore::new()),
        StorageBackend::Postgres => {
            Arc::new(PostgresLedgerStore::connect(&config.storage.postgres_config()).await?)
        }
    };
    let audit: Arc<dyn AuditStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryAuditStore::new()),
        StorageBackend::Postgres => {
            Arc::new(PostgresAuditStore::new(&config.storage.postgres_audit_config()).await?)
        }
    };

    let voucher_key = qm_voucher::parse_mac_key(&config.ledger.voucher_key)?;
    let ledger = Arc::new(QuotaLedger::new(
        state.clone(),
        audit.clone(),
        gateway.clone(),
        clock.clone(),
        LedgerConfig::new(voucher_key, config.ledger.required_star_repo.clone()),
    ));

    let strategy_store: Arc<dyn StrategyStore> = Arc::new(MemoryStrategyStore::new());
    let directory = Arc::new(StaticUserDirectory::new(config.users.clone()));
    let quota_lookup = Arc::new(GatewayQuotaLookup::new(gateway.clone()));
    let strategy_engine = Arc::new(StrategyEngine::new(
        strategy_store.clone(),
        state.clone(),
        ledger.clone(),
        directory,
        quota_lookup,
        clock.clone(),
        server_tz,
    ));
    for strategy in &config.strategies {
        strategy_engine
            .create(strategy.clone())
            .await
            .map_err(|source| ServerError::SeedStrategy { name: strategy.name.clone(), source })?;
    }

    let composer = Arc::new(PermissionComposer::new(
        state,
        gateway,
        hr,
        PermissionConfig::new(config.permission.sync_mode.into()),
    ));

    let (scheduler, scheduler_shutdown) = BackgroundProcessor::new(
        (&config.scheduler).into(),
        strategy_store,
        strategy_engine,
        ledger,
        composer,
        clock.clone(),
        server_tz,
    );

    Ok(AppContext {
        health_state: AppState { clock },
        scheduler,
        scheduler_shutdown,
        server_addr: format!("{}:{}", config.server.host, config.server.port),
    })
}
