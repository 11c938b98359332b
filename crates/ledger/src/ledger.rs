use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use qm_audit::AuditStore;
use qm_core::{
    AuditOperation, Clock, LotStatus, QuotaAudit, QuotaLot, RedeemedLotResult, TransferInStatus,
    User, VoucherLot, VoucherPayload,
};
use qm_gateway_client::GatewayClient;
use qm_state::LedgerStore;
use tracing::warn;

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::types::{LotView, TransferInResult, TransferOutRequest, TransferOutResult, UserQuotaSummary};

/// The lot-based quota ledger (spec §4.5).
///
/// Composes a state store, an audit journal, a gateway client, and a clock
/// behind one façade, the way `Gateway` composes its own collaborators.
/// Every mutating operation opens one [`qm_state::Transaction`], performs
/// the gateway call before commit (rolling back on gateway failure), and
/// appends the audit row after commit — the audit store is a separate
/// backend from the ledger's own tables, so a crash between commit and the
/// audit write can leave a lot change with no matching audit row. This
/// mirrors the gateway dual-write caveat spec.md already accepts, extended
/// to cover the audit store too.
pub struct QuotaLedger {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditStore>,
    gateway: Arc<dyn GatewayClient>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl QuotaLedger {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        audit: Arc<dyn AuditStore>,
        gateway: Arc<dyn GatewayClient>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self { store, audit, gateway, clock, config }
    }

    /// Grant `amount` to `user_id` from a strategy dispatch (spec §4.5).
    ///
    /// `expiry_date` is computed by the caller (`qm-strategy`, via
    /// `compute_expiry(now, strategy.expiry_days, tz)`) since only the
    /// dispatching strategy knows its own `expiry_days` and timezone.
    pub async fn add_for_strategy(
        &self,
        user_id: &str,
        amount: i64,
        strategy_name: &str,
        expiry_date: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut lot = match tx.lot_at_expiry(user_id, expiry_date).await? {
            Some(mut existing) => {
                // A same-dated row may have already been flipped to Expired
                // by `expire_quotas`; crediting it resurrects it.
                existing.status = LotStatus::Valid;
                existing
            }
            None => QuotaLot {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                amount: 0,
                expiry_date,
                status: LotStatus::Valid,
            },
        };
        lot.amount += amount;
        tx.save_lot(&lot).await?;

        if let Err(e) = self.gateway.delta_quota(user_id, amount).await {
            tx.rollback().await?;
            return Err(e.into());
        }
        tx.commit().await?;

        self.audit
            .record(QuotaAudit {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                operation: AuditOperation::Recharge,
                amount,
                expiry_date,
                strategy_name: Some(strategy_name.to_owned()),
                voucher_code: None,
                created_at: now,
            })
            .await?;
        Ok(())
    }

    /// Read a user's quota summary (spec §4.5 `get_user_quota`).
    pub async fn get_user_quota(&self, user_id: &str) -> Result<UserQuotaSummary, LedgerError> {
        let mut tx = self.store.begin().await?;
        let mut lots = tx.valid_lots_for_user(user_id).await?;
        tx.rollback().await?;

        lots.sort_by_key(|l| l.expiry_date);
        let total = lots.iter().map(|l| l.amount).sum();
        let used = self.gateway.get_used(user_id).await?;

        let views = lots
            .into_iter()
            .filter(|l| l.amount > 0)
            .map(|l| LotView { amount: l.amount, expiry_date: l.expiry_date })
            .collect();

        Ok(UserQuotaSummary { total, used, lots: views })
    }

    /// Send quota to another user via a signed voucher (spec §4.5
    /// `transfer_out`).
    pub async fn transfer_out(
        &self,
        giver: &User,
        req: &TransferOutRequest,
    ) -> Result<TransferOutResult, LedgerError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut reserved: HashMap<String, i64> = HashMap::new();
        let mut lots_by_line: Vec<(QuotaLot, i64)> = Vec::with_capacity(req.quota_list.len());

        for item in &req.quota_list {
            // An expired lot is never decremented or transferred (spec §3),
            // even if `expire_quotas` hasn't swept it yet.
            let lot = match tx.lot_at_expiry(&giver.id, item.expiry_date).await? {
                Some(lot) if lot.is_usable_at(now) => lot,
                _ => {
                    tx.rollback().await?;
                    return Err(LedgerError::InsufficientQuota);
                }
            };
            let already_reserved = reserved.get(&lot.id).copied().unwrap_or(0);
            let available = lot.amount - already_reserved;
            if item.amount > available {
                tx.rollback().await?;
                return Err(LedgerError::InsufficientQuota);
            }
            reserved.insert(lot.id.clone(), already_reserved + item.amount);
            lots_by_line.push((lot, item.amount));
        }

        let mut decremented: HashMap<String, QuotaLot> = HashMap::new();
        for (lot, amount) in &lots_by_line {
            let entry = decremented.entry(lot.id.clone()).or_insert_with(|| lot.clone());
            if entry.decrement(*amount).is_err() {
                tx.rollback().await?;
                return Err(LedgerError::InsufficientQuota);
            }
        }
        for lot in decremented.values() {
            tx.save_lot(lot).await?;
        }

        let sum: i64 = req.quota_list.iter().map(|l| l.amount).sum();
        let earliest_expiry = req
            .quota_list
            .iter()
            .map(|l| l.expiry_date)
            .min()
            .expect("quota_list is non-empty");

        let payload = VoucherPayload {
            giver_id: giver.id.clone(),
            giver_name: giver.name.clone(),
            giver_phone: giver.phone.clone(),
            giver_github: giver.github_login.clone(),
            giver_has_required_star: giver.has_star(&self.config.required_star_repo),
            receiver_id: req.receiver_id.clone(),
            quota_list: req.quota_list.clone(),
            nonce: qm_voucher::generate_nonce(),
        };
        let voucher_code = qm_voucher::generate(&payload, &self.config.voucher_key)
            .map_err(|_| LedgerError::InvalidVoucher)?;

        if let Err(e) = self.gateway.delta_quota(&giver.id, -sum).await {
            tx.rollback().await?;
            return Err(e.into());
        }
        tx.commit().await?;

        self.audit
            .record(QuotaAudit {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: giver.id.clone(),
                operation: AuditOperation::TransferOut,
                amount: -sum,
                expiry_date: earliest_expiry,
                strategy_name: None,
                voucher_code: Some(voucher_code.clone()),
                created_at: now,
            })
            .await?;

        Ok(TransferOutResult { voucher_code })
    }

    /// Redeem a voucher for `receiver` (spec §4.5 `transfer_in`).
    pub async fn transfer_in(
        &self,
        receiver: &User,
        voucher_code: &str,
    ) -> Result<TransferInResult, LedgerError> {
        let payload = qm_voucher::validate(voucher_code, &self.config.voucher_key)
            .map_err(|_| LedgerError::InvalidVoucher)?;

        if payload.receiver_id != receiver.id {
            return Err(LedgerError::NotReceiver);
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        if tx.find_redemption(voucher_code).await?.is_some() {
            tx.rollback().await?;
            return Ok(TransferInResult::already_redeemed(payload.giver_id));
        }

        let (valid, expired): (Vec<VoucherLot>, Vec<VoucherLot>) =
            payload.quota_list.iter().copied().partition(|l| l.expiry_date > now);

        let mut sum_valid: i64 = 0;
        let mut earliest_valid_expiry = None;
        for item in &valid {
            let mut lot = match tx.lot_at_expiry(&receiver.id, item.expiry_date).await? {
                Some(mut existing) => {
                    // Same reasoning as `add_for_strategy`: a same-dated row
                    // may already be Expired; crediting it resurrects it.
                    existing.status = LotStatus::Valid;
                    existing
                }
                None => QuotaLot {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: receiver.id.clone(),
                    amount: 0,
                    expiry_date: item.expiry_date,
                    status: LotStatus::Valid,
                },
            };
            lot.amount += item.amount;
            tx.save_lot(&lot).await?;
            sum_valid += item.amount;
            earliest_valid_expiry =
                Some(earliest_valid_expiry.map_or(item.expiry_date, |e: chrono::DateTime<chrono::Utc>| e.min(item.expiry_date)));
        }

        if sum_valid > 0
            && let Err(e) = self.gateway.delta_quota(&receiver.id, sum_valid).await
        {
            tx.rollback().await?;
            return Err(e.into());
        }

        if payload.giver_has_required_star
            && let Err(e) = self.gateway.push_star_check(&receiver.id, true).await
        {
            tx.rollback().await?;
            return Err(e.into());
        }

        tx.save_redemption(&qm_core::VoucherRedemption {
            voucher_code: voucher_code.to_owned(),
            receiver_id: receiver.id.clone(),
            redeemed_at: now,
        })
        .await?;

        tx.commit().await?;

        if sum_valid > 0 {
            self.audit
                .record(QuotaAudit {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: receiver.id.clone(),
                    operation: AuditOperation::TransferIn,
                    amount: sum_valid,
                    expiry_date: earliest_valid_expiry.expect("sum_valid > 0 implies a lot"),
                    strategy_name: None,
                    voucher_code: Some(voucher_code.to_owned()),
                    created_at: now,
                })
                .await?;
        }

        let mut quota_list = Vec::with_capacity(payload.quota_list.len());
        for item in &valid {
            quota_list.push(RedeemedLotResult {
                amount: item.amount,
                expiry_date: item.expiry_date,
                success: true,
                is_expired: false,
            });
        }
        for item in &expired {
            quota_list.push(RedeemedLotResult {
                amount: item.amount,
                expiry_date: item.expiry_date,
                success: false,
                is_expired: true,
            });
        }

        let status = if expired.is_empty() {
            TransferInStatus::Success
        } else if valid.is_empty() {
            TransferInStatus::Failed
        } else {
            TransferInStatus::PartialSuccess
        };

        Ok(TransferInResult { giver_id: payload.giver_id, amount: sum_valid, status, quota_list })
    }

    /// Flip every lot past its expiry date to [`LotStatus::Expired`] and
    /// reconcile the gateway's per-user counters (spec §4.5 `expire_quotas`).
    ///
    /// All-or-nothing across the whole sweep: a gateway failure for any one
    /// user rolls back lot and audit state for every user processed in this
    /// call, not just the failing one.
    pub async fn expire_quotas(&self) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let due = tx.lots_due_for_expiry(now).await?;
        let mut by_user: BTreeMap<String, Vec<QuotaLot>> = BTreeMap::new();
        for lot in due {
            by_user.entry(lot.user_id.clone()).or_default().push(lot);
        }

        let mut pending_audits = Vec::new();
        for (user_id, mut lots) in by_user {
            lots.sort_by_key(|l| l.expiry_date);
            let to_expire: i64 = lots.iter().map(|l| l.amount).sum();
            if to_expire == 0 {
                continue;
            }
            let earliest_expired_expiry = lots[0].expiry_date;

            let used = match self.gateway.get_used(&user_id).await {
                Ok(u) => u,
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e.into());
                }
            };

            for mut lot in lots {
                lot.status = LotStatus::Expired;
                tx.save_lot(&lot).await?;
            }

            if let Err(e) = self.gateway.delta_quota(&user_id, -to_expire).await {
                tx.rollback().await?;
                return Err(e.into());
            }
            if used > 0
                && let Err(e) = self.gateway.delta_used(&user_id, -used).await
            {
                tx.rollback().await?;
                return Err(e.into());
            }

            pending_audits.push(QuotaAudit {
                id: uuid::Uuid::new_v4().to_string(),
                user_id,
                operation: AuditOperation::Expire,
                amount: -to_expire,
                expiry_date: earliest_expired_expiry,
                strategy_name: None,
                voucher_code: None,
                created_at: now,
            });
        }

        tx.commit().await?;

        for audit in pending_audits {
            if let Err(e) = self.audit.record(audit).await {
                warn!(error = %e, "expire_quotas: audit row write failed after commit");
            }
        }
        Ok(())
    }
}
