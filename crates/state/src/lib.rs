//! Ledger persistence.
//!
//! Stores the tables from spec §3 (`QuotaLot`, `QuotaExecute`,
//! `VoucherRedemption`, `WhitelistEntry`, `CheckFlag`, `EffectivePermission`,
//! `EffectiveCheckFlag`) behind a single transactional unit-of-work trait, so
//! `qm-ledger` and `qm-permission` can commit multi-table writes atomically
//! without knowing whether they're backed by Postgres or an in-memory store.

pub mod config;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod postgres;
pub mod store;

pub use config::PostgresConfig;
pub use error::StateError;
pub use memory::MemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use store::{LedgerStore, Transaction};
