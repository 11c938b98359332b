use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Whether a strategy fires once per user or repeatedly on a cron schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fires at most once per `(strategy, user)`.
    Single,
    /// Fires on every cron tick, once per `(strategy, user, batch)`.
    Periodic,
}

/// A quota-granting strategy (spec §3 `QuotaStrategy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStrategy {
    /// Unique identifier.
    pub id: String,
    /// Unique human-readable name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Single-shot or periodic.
    pub kind: StrategyKind,
    /// Quota amount granted per successful dispatch. Always positive.
    pub amount: i64,
    /// Gateway model this strategy's quota applies to.
    pub model: String,
    /// Condition source text; empty means "always true".
    #[serde(default)]
    pub condition: String,
    /// Required iff `kind == Periodic`.
    #[serde(default)]
    pub cron_expr: Option<String>,
    /// Optional explicit lot lifetime in days; `None` uses the
    /// end-of-month expiry policy (spec §4.1).
    #[serde(default)]
    pub expiry_days: Option<u32>,
    /// Whether the strategy currently dispatches on scheduler ticks.
    pub enabled: bool,
    /// Strategy is only eligible for dispatch on/after this instant.
    pub valid_from: DateTime<Utc>,
    /// Strategy stops being eligible after this instant, if set.
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

impl QuotaStrategy {
    /// Validate the `kind`/`cron_expr`/`amount` invariants from spec §3.
    ///
    /// Does not validate that `cron_expr` parses or that `condition` parses;
    /// those require the condition parser and cron crate respectively and
    /// are checked by `qm-strategy::StrategyEngine::create`.
    pub fn validate_shape(&self) -> Result<(), DomainError> {
        if self.amount <= 0 {
            return Err(DomainError::NonPositiveAmount(self.amount));
        }
        match self.kind {
            StrategyKind::Single => {
                if self.cron_expr.is_some() {
                    return Err(DomainError::StrategyShape(
                        "single strategy must not carry a cron_expr".to_owned(),
                    ));
                }
            }
            StrategyKind::Periodic => {
                if self.cron_expr.as_deref().is_none_or(str::is_empty) {
                    return Err(DomainError::StrategyShape(
                        "periodic strategy requires a cron_expr".to_owned(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `at` falls within `[valid_from, valid_to]`.
    #[must_use]
    pub fn is_within_validity_window(&self, at: DateTime<Utc>) -> bool {
        if at < self.valid_from {
            return false;
        }
        match self.valid_to {
            Some(to) => at <= to,
            None => true,
        }
    }
}

/// Outcome of a single `QuotaExecute` row (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteStatus {
    /// The dispatch committed: lot, audit, and gateway push all succeeded.
    Completed,
    /// The dispatch was attempted and failed; does not satisfy idempotency.
    Failed,
}

/// Records a single dispatch attempt of a strategy against a user (spec §3
/// `QuotaExecute`). Idempotency keys per kind are enforced by the owning
/// store's uniqueness constraints, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaExecute {
    /// The strategy that was dispatched.
    pub strategy_id: String,
    /// The user the strategy was evaluated/dispatched against.
    pub user_id: String,
    /// The expiry date computed for the lot this dispatch would grant.
    pub expiry_date: DateTime<Utc>,
    /// Whether the dispatch committed or failed.
    pub status: ExecuteStatus,
    /// Cron-tick fingerprint; `None` for `single` strategies.
    #[serde(default)]
    pub batch_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(kind: StrategyKind, cron: Option<&str>) -> QuotaStrategy {
        QuotaStrategy {
            id: "s1".into(),
            name: "welcome".into(),
            title: "Welcome grant".into(),
            kind,
            amount: 10,
            model: "gpt".into(),
            condition: String::new(),
            cron_expr: cron.map(str::to_owned),
            expiry_days: None,
            enabled: true,
            valid_from: Utc::now(),
            valid_to: None,
        }
    }

    #[test]
    fn single_with_cron_is_rejected() {
        let s = base(StrategyKind::Single, Some("0 0 * * *"));
        assert!(s.validate_shape().is_err());
    }

    #[test]
    fn periodic_without_cron_is_rejected() {
        let s = base(StrategyKind::Periodic, None);
        assert!(s.validate_shape().is_err());
    }

    #[test]
    fn periodic_without_cron_empty_string_is_rejected() {
        let s = base(StrategyKind::Periodic, Some(""));
        assert!(s.validate_shape().is_err());
    }

    #[test]
    fn valid_shapes_pass() {
        assert!(base(StrategyKind::Single, None).validate_shape().is_ok());
        assert!(
            base(StrategyKind::Periodic, Some("0 0 * * *"))
                .validate_shape()
                .is_ok()
        );
    }

    #[test]
    fn nonpositive_amount_is_rejected() {
        let mut s = base(StrategyKind::Single, None);
        s.amount = 0;
        assert!(s.validate_shape().is_err());
    }

    #[test]
    fn validity_window() {
        let mut s = base(StrategyKind::Single, None);
        s.valid_from = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        s.valid_to = Some(
            DateTime::parse_from_rfc3339("2026-12-31T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let inside = DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let before = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(s.is_within_validity_window(inside));
        assert!(!s.is_within_validity_window(before));
    }
}
