//! Composition root for the `quota-manager` binary: configuration, tracing
//! setup, wiring of every domain crate, and the one HTTP surface this
//! service exposes (a liveness probe). The strategy engine, ledger, and
//! permission composer only run from the background scheduler in
//! `qm-scheduler`; there is no admin REST API in this build.

pub mod config;
pub mod error;
pub mod health;
pub mod telemetry;
pub mod wiring;

pub use config::AppConfig;
pub use error::ServerError;
pub use wiring::{AppContext, build};

/// Load [`AppConfig`] from `path`, or fall back to an all-defaults
/// configuration if the file does not exist.
pub fn load_config(path: &str) -> Result<AppConfig, ServerError> {
    if std::path::Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ServerError::ConfigRead { path: path.to_owned(), source })?;
        toml::from_str(&contents).map_err(|source| ServerError::ConfigParse { path: path.to_owned(), source })
    } else {
        tracing::info!(path, "config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
