use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::VoucherError;

/// A 32-byte HMAC-SHA256 key, zeroized on drop.
///
/// Raw bytes never leave this crate; every signing/verification operation
/// goes through [`crate::sign`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MacKey([u8; 32]);

impl MacKey {
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacKey([REDACTED])")
    }
}

/// Parse a 32-byte MAC key from hex (64 chars) or standard base64.
pub fn parse_mac_key(raw: &str) -> Result<MacKey, VoucherError> {
    let trimmed = raw.trim();
    if trimmed.len() == 64
        && let Ok(bytes) = hex::decode(trimmed)
        && bytes.len() == 32
    {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        return Ok(MacKey(key));
    }
    use base64::Engine;
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(trimmed)
        && bytes.len() == 32
    {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        return Ok(MacKey(key));
    }
    Err(VoucherError::InvalidKey(
        "must be 32 bytes encoded as 64 hex chars or base64".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_key() {
        let key = parse_mac_key(&"aa".repeat(32)).unwrap();
        assert_eq!(key.as_bytes(), &[0xaa; 32]);
    }

    #[test]
    fn rejects_short_key() {
        assert!(parse_mac_key("too-short").is_err());
    }

    #[test]
    fn debug_is_redacted() {
        let key = parse_mac_key(&"11".repeat(32)).unwrap();
        assert_eq!(format!("{key:?}"), "MacKey([REDACTED])");
    }
}
