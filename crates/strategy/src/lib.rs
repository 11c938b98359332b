//! Strategy CRUD, cron/condition validation, and scheduler-tick dispatch
//! against the quota ledger (spec §4.4).

pub mod cron;
pub mod directory;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod memory;
pub mod quota_lookup;
pub mod store;

pub use directory::{DirectoryError, StaticUserDirectory, UserDirectory};
pub use engine::{StrategyEngine, TickSummary};
pub use error::{CronError, StrategyError};
pub use fingerprint::canonical_fingerprint;
pub use memory::MemoryStrategyStore;
pub use quota_lookup::GatewayQuotaLookup;
pub use store::StrategyStore;
