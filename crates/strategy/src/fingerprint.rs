//! Batch fingerprinting for periodic strategy dispatch (spec §4.4 step 3).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A stable identifier for one cron fire time, used as the `batch_id`
/// component of a periodic strategy's idempotency key.
#[must_use]
pub fn canonical_fingerprint(cron_fire_time: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cron_fire_time.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instant_same_fingerprint() {
        let t = DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(canonical_fingerprint(t), canonical_fingerprint(t));
    }

    #[test]
    fn different_instants_differ() {
        let a = DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2026-03-02T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_ne!(canonical_fingerprint(a), canonical_fingerprint(b));
    }
}
