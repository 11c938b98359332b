/// Whether a whitelist/check-flag mutation against a user key requires the
/// key to already exist in the HR employee table (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Reject mutations against unknown user keys.
    Strict,
    /// Create or update regardless of whether HR knows the key.
    Permissive,
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionConfig {
    pub sync_mode: SyncMode,
}

impl PermissionConfig {
    #[must_use]
    pub fn new(sync_mode: SyncMode) -> Self {
        Self { sync_mode }
    }
}
