//! Shared domain types for the quota manager.
//!
//! This crate has no I/O and no async: it is the vocabulary every other
//! crate in the workspace builds on (`qm-condition`, `qm-voucher`,
//! `qm-state`, `qm-audit`, `qm-ledger`, `qm-strategy`, `qm-permission`).

pub mod audit;
pub mod clock;
pub mod error;
pub mod expiry;
pub mod lot;
pub mod permission;
pub mod strategy;
pub mod user;
pub mod voucher_types;

pub use audit::{AuditOperation, QuotaAudit};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::DomainError;
pub use expiry::compute_expiry;
pub use lot::{LotStatus, QuotaLot};
pub use permission::{
    CheckFlag, CheckFlavor, EffectiveCheckFlag, EffectivePermission, Scope, TriState,
    WhitelistEntry, default_check_flag,
};
pub use strategy::{ExecuteStatus, QuotaExecute, QuotaStrategy, StrategyKind};
pub use user::User;
pub use voucher_types::{
    RedeemedLotResult, TransferInStatus, VoucherLot, VoucherPayload, VoucherRedemption,
};
