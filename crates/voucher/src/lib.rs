//! Canonicalization, HMAC-SHA256 signing, and encoding for transfer
//! vouchers (spec §4.5/§6).

pub mod error;
pub mod key;
pub mod sign;

pub use error::VoucherError;
pub use key::{MacKey, parse_mac_key};
pub use sign::{generate, validate};

/// A random per-voucher nonce, to be stored in [`qm_core::VoucherPayload::nonce`]
/// so two vouchers with otherwise-identical content never canonicalize to
/// the same signable bytes.
#[must_use]
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}
