use thiserror::Error;

/// Errors raised while loading configuration or wiring the dependency graph
/// at startup. Once running, each subsystem logs and recovers from its own
/// errors (see `qm_scheduler::BackgroundProcessor::run`); this type only
/// covers failures that should prevent the process from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse { path: String, source: toml::de::Error },
    #[error("invalid voucher_key: {0}")]
    VoucherKey(#[from] qm_voucher::VoucherError),
    #[error("failed to seed strategy '{name}': {source}")]
    SeedStrategy { name: String, source: qm_strategy::StrategyError },
    #[error("storage error: {0}")]
    Storage(#[from] qm_state::StateError),
    #[error("audit storage error: {0}")]
    Audit(#[from] qm_audit::AuditError),
    #[error("gateway client error: {0}")]
    Gateway(#[from] qm_gateway_client::GatewayError),
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
    #[error("HTTP server error: {0}")]
    Http(std::io::Error),
}
