use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use qm_condition::{EvalContext, QuotaLookup};
use qm_core::{Clock, ExecuteStatus, QuotaExecute, QuotaStrategy, StrategyKind, compute_expiry};
use qm_ledger::{LedgerError, QuotaLedger};
use qm_state::LedgerStore;
use tracing::warn;

use crate::cron;
use crate::directory::UserDirectory;
use crate::error::StrategyError;
use crate::fingerprint::canonical_fingerprint;
use crate::store::StrategyStore;

/// Per-user dispatch outcome, rolled up into a [`TickSummary`].
enum Dispatched {
    Granted,
    Skipped,
}

/// Tally of what one [`StrategyEngine::tick`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub granted: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// CRUD, validation, and scheduler-tick dispatch for [`QuotaStrategy`] (spec
/// §4.4). Composes a strategy store, the ledger, a user directory, and a
/// gateway-backed condition evaluator the way [`qm_ledger::QuotaLedger`]
/// composes its own collaborators behind one façade.
pub struct StrategyEngine {
    store: Arc<dyn StrategyStore>,
    state: Arc<dyn LedgerStore>,
    ledger: Arc<QuotaLedger>,
    directory: Arc<dyn UserDirectory>,
    quota: Arc<dyn QuotaLookup>,
    clock: Arc<dyn Clock>,
    server_tz: Tz,
}

impl StrategyEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn StrategyStore>,
        state: Arc<dyn LedgerStore>,
        ledger: Arc<QuotaLedger>,
        directory: Arc<dyn UserDirectory>,
        quota: Arc<dyn QuotaLookup>,
        clock: Arc<dyn Clock>,
        server_tz: Tz,
    ) -> Self {
        Self { store, state, ledger, directory, quota, clock, server_tz }
    }

    /// Validate and persist a new strategy (spec §4.4 `create`).
    pub async fn create(&self, strategy: QuotaStrategy) -> Result<(), StrategyError> {
        strategy.validate_shape()?;
        qm_condition::parse(&strategy.condition)?;
        if strategy.kind == StrategyKind::Periodic {
            let expr = strategy.cron_expr.as_deref().unwrap_or_default();
            cron::validate_cron_expr(expr)?;
        }
        if self.store.find_by_name(&strategy.name).await?.is_some() {
            return Err(StrategyError::DuplicateName(strategy.name));
        }
        self.store.create(strategy).await
    }

    pub async fn enable(&self, id: &str) -> Result<(), StrategyError> {
        self.set_enabled(id, true).await
    }

    pub async fn disable(&self, id: &str) -> Result<(), StrategyError> {
        self.set_enabled(id, false).await
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), StrategyError> {
        let mut strategy =
            self.store.get(id).await?.ok_or_else(|| StrategyError::NotFound(id.to_owned()))?;
        strategy.enabled = enabled;
        self.store.update(strategy).await
    }

    /// Dispatch one strategy against every candidate user (spec §4.4
    /// `tick`). `cron_fire_time` is the scheduler's nominal fire instant for
    /// a periodic strategy; ignored for `single` strategies, defaults to
    /// the current instant when not supplied (e.g. an admin-triggered tick).
    pub async fn tick(
        &self,
        strategy_id: &str,
        cron_fire_time: Option<DateTime<Utc>>,
    ) -> Result<TickSummary, StrategyError> {
        let now = self.clock.now();
        let strategy =
            self.store.get(strategy_id).await?.ok_or_else(|| StrategyError::NotFound(strategy_id.to_owned()))?;

        let mut summary = TickSummary::default();
        if !strategy.enabled || !strategy.is_within_validity_window(now) {
            return Ok(summary);
        }

        let expr = qm_condition::parse(&strategy.condition)?;
        let invitation_style = expr.mentions_has_inviter();

        let batch_id = match strategy.kind {
            StrategyKind::Single => String::new(),
            StrategyKind::Periodic => canonical_fingerprint(cron_fire_time.unwrap_or(now)),
        };

        let users = self
            .directory
            .list_active_users()
            .await
            .map_err(|e| StrategyError::Directory(e.to_string()))?;

        for user in &users {
            let ctx = EvalContext::new(user, now, self.server_tz, self.quota.as_ref());
            let matched = match qm_condition::evaluate(&expr, &ctx).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(user_id = %user.id, strategy = %strategy.name, error = %e, "condition evaluation failed, skipping user");
                    summary.failed += 1;
                    continue;
                }
            };
            if !matched {
                summary.skipped += 1;
                continue;
            }

            match self.dispatch_one(&strategy, invitation_style, &batch_id, user, now).await {
                Ok(Dispatched::Granted) => summary.granted += 1,
                Ok(Dispatched::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(user_id = %user.id, strategy = %strategy.name, error = %e, "strategy dispatch failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn dispatch_one(
        &self,
        strategy: &QuotaStrategy,
        invitation_style: bool,
        batch_id: &str,
        user: &qm_core::User,
        now: DateTime<Utc>,
    ) -> Result<Dispatched, StrategyError> {
        // Idempotency gate (spec §4.4 step 3). Keyed on the candidate user
        // regardless of who the recipient ends up being, so an invitee
        // cannot trigger repeated grants to their inviter.
        let mut tx = self.state.begin().await?;
        let existing = tx.find_execute(&strategy.id, &user.id, batch_id).await?;
        tx.rollback().await?;
        if existing.is_some_and(|e| e.status == ExecuteStatus::Completed) {
            return Ok(Dispatched::Skipped);
        }

        let recipient_id = if invitation_style {
            match user.inviter_id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => id.to_owned(),
                None => return Ok(Dispatched::Skipped),
            }
        } else {
            user.id.clone()
        };

        let expiry_date = compute_expiry(now, strategy.expiry_days, self.server_tz);

        let mut result = self.ledger.add_for_strategy(&recipient_id, strategy.amount, &strategy.name, expiry_date).await;
        if matches!(result, Err(LedgerError::Gateway(_))) {
            result = self.ledger.add_for_strategy(&recipient_id, strategy.amount, &strategy.name, expiry_date).await;
        }

        let status = if result.is_ok() { ExecuteStatus::Completed } else { ExecuteStatus::Failed };
        let execute = QuotaExecute {
            strategy_id: strategy.id.clone(),
            user_id: user.id.clone(),
            expiry_date,
            status,
            batch_id: matches!(strategy.kind, StrategyKind::Periodic).then(|| batch_id.to_owned()),
        };
        let mut tx = self.state.begin().await?;
        tx.save_execute(&execute).await?;
        tx.commit().await?;

        Ok(result.map(|()| Dispatched::Granted)?)
    }
}
