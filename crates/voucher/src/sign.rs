use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use hmac::{Hmac, Mac};
use qm_core::VoucherPayload;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::VoucherError;
use crate::key::MacKey;

type HmacSha256 = Hmac<Sha256>;

/// Serialize a payload to its canonical signable bytes.
///
/// [`VoucherPayload`] is a plain struct (not a map), so `serde_json`
/// already emits fields in a fixed declaration order — no separate key
/// sorting pass is needed for determinism.
fn canonicalize(payload: &VoucherPayload) -> Result<Vec<u8>, VoucherError> {
    serde_json::to_vec(payload).map_err(|_| VoucherError::Invalid)
}

fn compute_mac(key: &MacKey, body: &[u8]) -> Result<[u8; 32], VoucherError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| VoucherError::InvalidKey(e.to_string()))?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().into())
}

/// Sign `payload`, producing an opaque voucher code: base64url(payload) +
/// `.` + hex(HMAC-SHA256(payload)).
pub fn generate(payload: &VoucherPayload, key: &MacKey) -> Result<String, VoucherError> {
    let body = canonicalize(payload)?;
    let mac = compute_mac(key, &body)?;
    Ok(format!("{}.{}", B64.encode(&body), hex::encode(mac)))
}

/// Verify and decode a voucher code, returning the payload on success.
///
/// Every failure mode (malformed code, bad base64, bad JSON, MAC mismatch)
/// collapses to [`VoucherError::Invalid`].
pub fn validate(code: &str, key: &MacKey) -> Result<VoucherPayload, VoucherError> {
    let (encoded_body, mac_hex) = code.rsplit_once('.').ok_or(VoucherError::Invalid)?;
    let body = B64.decode(encoded_body).map_err(|_| VoucherError::Invalid)?;
    let provided_mac = hex::decode(mac_hex).map_err(|_| VoucherError::Invalid)?;
    let expected_mac = compute_mac(key, &body)?;

    if provided_mac.len() != expected_mac.len() {
        return Err(VoucherError::Invalid);
    }
    if expected_mac.ct_eq(&provided_mac).unwrap_u8() != 1 {
        return Err(VoucherError::Invalid);
    }

    serde_json::from_slice(&body).map_err(|_| VoucherError::Invalid)
}
