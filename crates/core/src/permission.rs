use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Whether a setting applies to a single user or an entire department
/// (spec §3/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Applies to exactly one user.
    User,
    /// Applies to every employee under a department key.
    Department,
}

/// Which boolean entitlement a [`CheckFlag`] toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFlavor {
    /// Whether the gateway should require a GitHub star before serving.
    StarCheck,
    /// Whether the gateway should enforce quota at all for this scope.
    QuotaCheck,
}

/// A model whitelist set at user or department scope (spec §3
/// `WhitelistEntry`). Unique by `(scope, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// `User` or `Department`.
    pub scope: Scope,
    /// The user id or department key this entry applies to.
    pub key: String,
    /// The whitelisted model set.
    pub models: BTreeSet<String>,
}

impl WhitelistEntry {
    /// Render `models` as the stable, comma-joined form used for equality
    /// diffing and gateway pushes (spec §6).
    #[must_use]
    pub fn models_joined(&self) -> String {
        self.models.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Tri-state value for a [`CheckFlag`] (spec §3: "plus a sentinel unset").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    /// Explicitly enabled at this scope.
    SetTrue,
    /// Explicitly disabled at this scope.
    SetFalse,
    /// No setting at this scope; defer to the next scope in the walk.
    Unset,
}

impl TriState {
    /// Returns the effective boolean if this state is not [`TriState::Unset`].
    #[must_use]
    pub fn resolved(self) -> Option<bool> {
        match self {
            Self::SetTrue => Some(true),
            Self::SetFalse => Some(false),
            Self::Unset => None,
        }
    }
}

/// A boolean entitlement toggle at user or department scope (spec §3
/// `CheckFlag`). Unique by `(flavor, scope, key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFlag {
    /// Which entitlement this toggles.
    pub flavor: CheckFlavor,
    /// `User` or `Department`.
    pub scope: Scope,
    /// The user id or department key this entry applies to.
    pub key: String,
    /// Tri-state value.
    pub state: TriState,
}

/// The derived, gateway-authoritative model set for one user (spec §3
/// `EffectivePermission`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivePermission {
    /// The user this applies to.
    pub user_id: String,
    /// The composed model set.
    pub models: BTreeSet<String>,
}

/// The derived, gateway-authoritative flag value for one user and flavor
/// (spec §3 `EffectiveCheckFlag`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveCheckFlag {
    /// The user this applies to. Stored as `&str` at call sites; owned here
    /// for storage round-trips.
    pub flavor: CheckFlavor,
    /// The composed boolean value.
    pub enabled: bool,
}

/// Default value for a check flag flavor when no scope in the walk sets it
/// (spec §4.6: "default false for star-check and false for quota-check").
#[must_use]
pub fn default_check_flag(_flavor: CheckFlavor) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_joined_is_sorted_and_stable() {
        let entry = WhitelistEntry {
            scope: Scope::Department,
            key: "eng".into(),
            models: BTreeSet::from(["gpt-4".to_owned(), "claude".to_owned()]),
        };
        assert_eq!(entry.models_joined(), "claude,gpt-4");
    }

    #[test]
    fn tristate_resolution() {
        assert_eq!(TriState::SetTrue.resolved(), Some(true));
        assert_eq!(TriState::SetFalse.resolved(), Some(false));
        assert_eq!(TriState::Unset.resolved(), None);
    }

    #[test]
    fn default_check_flags_are_false() {
        assert!(!default_check_flag(CheckFlavor::StarCheck));
        assert!(!default_check_flag(CheckFlavor::QuotaCheck));
    }
}
