use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the quota manager.
///
/// Lifecycle is externally managed (spec §3): the quota manager never
/// creates or deletes users itself, only reads and (via HR sync, for
/// department membership) refreshes attributes relevant to entitlements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// GitHub login, if linked.
    pub github_login: String,
    /// Repository slugs the user has starred, as reported by the source
    /// system (comma-split source text collapses into this set).
    #[serde(default)]
    pub github_stars: BTreeSet<String>,
    /// VIP tier, higher is more privileged.
    #[serde(default)]
    pub vip_level: u32,
    /// Organization/department path label; empty if unaffiliated.
    #[serde(default)]
    pub org: String,
    /// When the user record was first created.
    pub created_at: DateTime<Utc>,
    /// When the user last interacted with the system.
    pub last_access_at: DateTime<Utc>,
    /// The user who invited this user, if any.
    #[serde(default)]
    pub inviter_id: Option<String>,
}

impl User {
    /// Returns `true` if `repo` is in the user's starred set.
    ///
    /// An empty star set is always `false`, per spec §4.3's `github-star`
    /// predicate.
    #[must_use]
    pub fn has_star(&self, repo: &str) -> bool {
        !self.github_stars.is_empty() && self.github_stars.contains(repo)
    }

    /// Returns `true` if the user has a recorded inviter.
    #[must_use]
    pub fn has_inviter(&self) -> bool {
        self.inviter_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}
