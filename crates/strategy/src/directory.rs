//! Supplies the candidate user set for a strategy tick.
//!
//! `qm-hr-client` only carries employee/department rows, not the quota-
//! manager-owned fields (`github_stars`, `vip_level`, `inviter_id`) that
//! condition evaluation needs, so this seam is local to `qm-strategy` and
//! supplied by the composition root rather than by `qm-hr-client` itself.

use async_trait::async_trait;
use qm_core::User;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user directory lookup failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All users eligible to be evaluated as strategy dispatch candidates.
    async fn list_active_users(&self) -> Result<Vec<User>, DirectoryError>;

    /// A single user by id, used to resolve an invitation-style strategy's
    /// redirected recipient (spec §4.4 point 6).
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, DirectoryError>;
}

/// A fixed in-memory roster, for tests and small deployments.
pub struct StaticUserDirectory {
    users: Vec<User>,
}

impl StaticUserDirectory {
    #[must_use]
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn list_active_users(&self) -> Result<Vec<User>, DirectoryError> {
        Ok(self.users.clone())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }
}
