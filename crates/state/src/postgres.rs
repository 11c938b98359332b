use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qm_core::{
    CheckFlag, CheckFlavor, EffectiveCheckFlag, EffectivePermission, ExecuteStatus, LotStatus,
    QuotaExecute, QuotaLot, Scope, TriState, VoucherRedemption, WhitelistEntry,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row};

use crate::config::PostgresConfig;
use crate::error::StateError;
use crate::migrations;
use crate::store::{LedgerStore, Transaction};

/// Postgres-backed [`LedgerStore`].
///
/// Row locking for the read-modify-write sequences in `qm-ledger` and
/// `qm-permission` (read a lot, decrement it, write it back within one
/// transaction) is done with `SELECT ... FOR UPDATE`, so concurrent callers
/// serialize on the rows they actually touch rather than the whole table.
pub struct PostgresLedgerStore {
    pool: PgPool,
    tables: TableNames,
}

/// Fully-qualified table names, resolved once from a [`PostgresConfig`] so
/// query strings don't re-format them on every call.
#[derive(Debug, Clone)]
struct TableNames {
    quota_lots: String,
    quota_executes: String,
    voucher_redemptions: String,
    whitelist_entries: String,
    check_flags: String,
    effective_permissions: String,
    effective_check_flags: String,
}

impl TableNames {
    fn from_config(config: &PostgresConfig) -> Self {
        Self {
            quota_lots: config.table("quota_lots"),
            quota_executes: config.table("quota_executes"),
            voucher_redemptions: config.table("voucher_redemptions"),
            whitelist_entries: config.table("whitelist_entries"),
            check_flags: config.table("check_flags"),
            effective_permissions: config.table("effective_permissions"),
            effective_check_flags: config.table("effective_check_flags"),
        }
    }
}

impl PostgresLedgerStore {
    /// Connect to `config.url` and ensure the ledger tables exist.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StateError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;
        migrations::run_migrations(&pool, config).await?;
        Ok(Self { pool, tables: TableNames::from_config(config) })
    }

    /// Wrap an already-constructed pool, running migrations against it.
    pub async fn from_pool(pool: PgPool, config: &PostgresConfig) -> Result<Self, StateError> {
        migrations::run_migrations(&pool, config).await?;
        Ok(Self { pool, tables: TableNames::from_config(config) })
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StateError> {
        let tx = self.pool.begin().await.map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx), tables: self.tables.clone() }))
    }
}

struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    tables: TableNames,
}

impl PostgresTransaction {
    fn conn(&mut self) -> &mut sqlx::Transaction<'static, Postgres> {
        self.tx.as_mut().expect("transaction used after commit/rollback")
    }
}

fn lot_status_str(status: LotStatus) -> &'static str {
    match status {
        LotStatus::Valid => "valid",
        LotStatus::Expired => "expired",
    }
}

fn lot_status_from_str(s: &str) -> Result<LotStatus, StateError> {
    match s {
        "valid" => Ok(LotStatus::Valid),
        "expired" => Ok(LotStatus::Expired),
        other => Err(StateError::Serialization(format!("unknown lot status: {other}"))),
    }
}

fn execute_status_str(status: ExecuteStatus) -> &'static str {
    match status {
        ExecuteStatus::Completed => "completed",
        ExecuteStatus::Failed => "failed",
    }
}

fn execute_status_from_str(s: &str) -> Result<ExecuteStatus, StateError> {
    match s {
        "completed" => Ok(ExecuteStatus::Completed),
        "failed" => Ok(ExecuteStatus::Failed),
        other => Err(StateError::Serialization(format!("unknown execute status: {other}"))),
    }
}

fn scope_str(scope: Scope) -> &'static str {
    match scope {
        Scope::User => "user",
        Scope::Department => "department",
    }
}

fn scope_from_str(s: &str) -> Result<Scope, StateError> {
    match s {
        "user" => Ok(Scope::User),
        "department" => Ok(Scope::Department),
        other => Err(StateError::Serialization(format!("unknown scope: {other}"))),
    }
}

fn flavor_str(flavor: CheckFlavor) -> &'static str {
    match flavor {
        CheckFlavor::StarCheck => "star_check",
        CheckFlavor::QuotaCheck => "quota_check",
    }
}

fn flavor_from_str(s: &str) -> Result<CheckFlavor, StateError> {
    match s {
        "star_check" => Ok(CheckFlavor::StarCheck),
        "quota_check" => Ok(CheckFlavor::QuotaCheck),
        other => Err(StateError::Serialization(format!("unknown check flavor: {other}"))),
    }
}

fn tristate_str(state: TriState) -> &'static str {
    match state {
        TriState::SetTrue => "set_true",
        TriState::SetFalse => "set_false",
        TriState::Unset => "unset",
    }
}

fn tristate_from_str(s: &str) -> Result<TriState, StateError> {
    match s {
        "set_true" => Ok(TriState::SetTrue),
        "set_false" => Ok(TriState::SetFalse),
        "unset" => Ok(TriState::Unset),
        other => Err(StateError::Serialization(format!("unknown tristate: {other}"))),
    }
}

fn join_models(models: &BTreeSet<String>) -> String {
    models.iter().cloned().collect::<Vec<_>>().join(",")
}

fn split_models(joined: &str) -> BTreeSet<String> {
    joined.split(',').filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

fn backend_err(e: sqlx::Error) -> StateError {
    StateError::Backend(e.to_string())
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn valid_lots_for_user(&mut self, user_id: &str) -> Result<Vec<QuotaLot>, StateError> {
        let sql = format!(
            "SELECT id, user_id, amount, expiry_date, status FROM {} \
             WHERE user_id = $1 AND status = 'valid' FOR UPDATE",
            self.tables.quota_lots
        );
        let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(QuotaLot {
                    id: row.try_get("id").map_err(backend_err)?,
                    user_id: row.try_get("user_id").map_err(backend_err)?,
                    amount: row.try_get("amount").map_err(backend_err)?,
                    expiry_date: row.try_get("expiry_date").map_err(backend_err)?,
                    status: lot_status_from_str(row.try_get("status").map_err(backend_err)?)?,
                })
            })
            .collect()
    }

    async fn lot_at_expiry(
        &mut self,
        user_id: &str,
        expiry_date: DateTime<Utc>,
    ) -> Result<Option<QuotaLot>, StateError> {
        let sql = format!(
            "SELECT id, user_id, amount, expiry_date, status FROM {} \
             WHERE user_id = $1 AND expiry_date = $2 FOR UPDATE",
            self.tables.quota_lots
        );
        let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(expiry_date)
        .fetch_optional(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        row.map(|row| {
            Ok(QuotaLot {
                id: row.try_get("id").map_err(backend_err)?,
                user_id: row.try_get("user_id").map_err(backend_err)?,
                amount: row.try_get("amount").map_err(backend_err)?,
                expiry_date: row.try_get("expiry_date").map_err(backend_err)?,
                status: lot_status_from_str(row.try_get("status").map_err(backend_err)?)?,
            })
        })
        .transpose()
    }

    async fn save_lot(&mut self, lot: &QuotaLot) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (id, user_id, amount, expiry_date, status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET amount = EXCLUDED.amount, status = EXCLUDED.status",
            self.tables.quota_lots
        );
        sqlx::query(&sql)
        .bind(&lot.id)
        .bind(&lot.user_id)
        .bind(lot.amount)
        .bind(lot.expiry_date)
        .bind(lot_status_str(lot.status))
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn lots_due_for_expiry(&mut self, now: DateTime<Utc>) -> Result<Vec<QuotaLot>, StateError> {
        let sql = format!(
            "SELECT id, user_id, amount, expiry_date, status FROM {} \
             WHERE status = 'valid' AND expiry_date < $1 FOR UPDATE",
            self.tables.quota_lots
        );
        let rows = sqlx::query(&sql)
        .bind(now)
        .fetch_all(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(QuotaLot {
                    id: row.try_get("id").map_err(backend_err)?,
                    user_id: row.try_get("user_id").map_err(backend_err)?,
                    amount: row.try_get("amount").map_err(backend_err)?,
                    expiry_date: row.try_get("expiry_date").map_err(backend_err)?,
                    status: lot_status_from_str(row.try_get("status").map_err(backend_err)?)?,
                })
            })
            .collect()
    }

    async fn find_execute(
        &mut self,
        strategy_id: &str,
        user_id: &str,
        batch_id: &str,
    ) -> Result<Option<QuotaExecute>, StateError> {
        let sql = format!(
            "SELECT strategy_id, user_id, expiry_date, status, batch_id FROM {} \
             WHERE strategy_id = $1 AND user_id = $2 AND batch_id = $3",
            self.tables.quota_executes
        );
        let row = sqlx::query(&sql)
        .bind(strategy_id)
        .bind(user_id)
        .bind(batch_id)
        .fetch_optional(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        row.map(|row| {
            let batch_id: String = row.try_get("batch_id").map_err(backend_err)?;
            Ok(QuotaExecute {
                strategy_id: row.try_get("strategy_id").map_err(backend_err)?,
                user_id: row.try_get("user_id").map_err(backend_err)?,
                expiry_date: row.try_get("expiry_date").map_err(backend_err)?,
                status: execute_status_from_str(row.try_get("status").map_err(backend_err)?)?,
                batch_id: if batch_id.is_empty() { None } else { Some(batch_id) },
            })
        })
        .transpose()
    }

    async fn save_execute(&mut self, execute: &QuotaExecute) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (strategy_id, user_id, expiry_date, status, batch_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (strategy_id, user_id, batch_id) DO UPDATE SET status = EXCLUDED.status",
            self.tables.quota_executes
        );
        sqlx::query(&sql)
        .bind(&execute.strategy_id)
        .bind(&execute.user_id)
        .bind(execute.expiry_date)
        .bind(execute_status_str(execute.status))
        .bind(execute.batch_id.as_deref().unwrap_or(""))
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn find_redemption(
        &mut self,
        voucher_code: &str,
    ) -> Result<Option<VoucherRedemption>, StateError> {
        let sql = format!(
            "SELECT voucher_code, receiver_id, redeemed_at FROM {} \
             WHERE voucher_code = $1 FOR UPDATE",
            self.tables.voucher_redemptions
        );
        let row = sqlx::query(&sql)
        .bind(voucher_code)
        .fetch_optional(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        row.map(|row| {
            Ok(VoucherRedemption {
                voucher_code: row.try_get("voucher_code").map_err(backend_err)?,
                receiver_id: row.try_get("receiver_id").map_err(backend_err)?,
                redeemed_at: row.try_get("redeemed_at").map_err(backend_err)?,
            })
        })
        .transpose()
    }

    async fn save_redemption(&mut self, redemption: &VoucherRedemption) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (voucher_code, receiver_id, redeemed_at) VALUES ($1, $2, $3)",
            self.tables.voucher_redemptions
        );
        sqlx::query(&sql)
        .bind(&redemption.voucher_code)
        .bind(&redemption.receiver_id)
        .bind(redemption.redeemed_at)
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn find_whitelist(
        &mut self,
        scope: Scope,
        key: &str,
    ) -> Result<Option<WhitelistEntry>, StateError> {
        let sql = format!(
            "SELECT scope, key, models FROM {} WHERE scope = $1 AND key = $2",
            self.tables.whitelist_entries
        );
        let row = sqlx::query(&sql)
        .bind(scope_str(scope))
        .bind(key)
        .fetch_optional(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        row.map(|row| {
            Ok(WhitelistEntry {
                scope: scope_from_str(row.try_get("scope").map_err(backend_err)?)?,
                key: row.try_get("key").map_err(backend_err)?,
                models: split_models(row.try_get::<String, _>("models").map_err(backend_err)?.as_str()),
            })
        })
        .transpose()
    }

    async fn save_whitelist(&mut self, entry: &WhitelistEntry) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (scope, key, models) VALUES ($1, $2, $3) \
             ON CONFLICT (scope, key) DO UPDATE SET models = EXCLUDED.models",
            self.tables.whitelist_entries
        );
        sqlx::query(&sql)
        .bind(scope_str(entry.scope))
        .bind(&entry.key)
        .bind(join_models(&entry.models))
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn find_check_flag(
        &mut self,
        flavor: CheckFlavor,
        scope: Scope,
        key: &str,
    ) -> Result<Option<CheckFlag>, StateError> {
        let sql = format!(
            "SELECT flavor, scope, key, state FROM {} \
             WHERE flavor = $1 AND scope = $2 AND key = $3",
            self.tables.check_flags
        );
        let row = sqlx::query(&sql)
        .bind(flavor_str(flavor))
        .bind(scope_str(scope))
        .bind(key)
        .fetch_optional(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        row.map(|row| {
            Ok(CheckFlag {
                flavor: flavor_from_str(row.try_get("flavor").map_err(backend_err)?)?,
                scope: scope_from_str(row.try_get("scope").map_err(backend_err)?)?,
                key: row.try_get("key").map_err(backend_err)?,
                state: tristate_from_str(row.try_get("state").map_err(backend_err)?)?,
            })
        })
        .transpose()
    }

    async fn save_check_flag(&mut self, flag: &CheckFlag) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (flavor, scope, key, state) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (flavor, scope, key) DO UPDATE SET state = EXCLUDED.state",
            self.tables.check_flags
        );
        sqlx::query(&sql)
        .bind(flavor_str(flag.flavor))
        .bind(scope_str(flag.scope))
        .bind(&flag.key)
        .bind(tristate_str(flag.state))
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn find_effective_permission(
        &mut self,
        user_id: &str,
    ) -> Result<Option<EffectivePermission>, StateError> {
        let sql = format!(
            "SELECT user_id, models FROM {} WHERE user_id = $1",
            self.tables.effective_permissions
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.conn().as_mut())
            .await
            .map_err(backend_err)?;

        row.map(|row| {
            Ok(EffectivePermission {
                user_id: row.try_get("user_id").map_err(backend_err)?,
                models: split_models(row.try_get::<String, _>("models").map_err(backend_err)?.as_str()),
            })
        })
        .transpose()
    }

    async fn save_effective_permission(
        &mut self,
        permission: &EffectivePermission,
    ) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (user_id, models) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET models = EXCLUDED.models",
            self.tables.effective_permissions
        );
        sqlx::query(&sql)
        .bind(&permission.user_id)
        .bind(join_models(&permission.models))
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn find_effective_check_flag(
        &mut self,
        user_id: &str,
        flavor: CheckFlavor,
    ) -> Result<Option<EffectiveCheckFlag>, StateError> {
        let sql = format!(
            "SELECT flavor, enabled FROM {} WHERE user_id = $1 AND flavor = $2",
            self.tables.effective_check_flags
        );
        let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(flavor_str(flavor))
        .fetch_optional(self.conn().as_mut())
        .await
        .map_err(backend_err)?;

        row.map(|row| {
            Ok(EffectiveCheckFlag {
                flavor: flavor_from_str(row.try_get("flavor").map_err(backend_err)?)?,
                enabled: row.try_get("enabled").map_err(backend_err)?,
            })
        })
        .transpose()
    }

    async fn save_effective_check_flag(
        &mut self,
        user_id: &str,
        flag: EffectiveCheckFlag,
    ) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO {} (user_id, flavor, enabled) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, flavor) DO UPDATE SET enabled = EXCLUDED.enabled",
            self.tables.effective_check_flags
        );
        sqlx::query(&sql)
        .bind(user_id)
        .bind(flavor_str(flag.flavor))
        .bind(flag.enabled)
        .execute(self.conn().as_mut())
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn delete_effective_rows(&mut self, user_id: &str) -> Result<(), StateError> {
        let perm_sql = format!("DELETE FROM {} WHERE user_id = $1", self.tables.effective_permissions);
        sqlx::query(&perm_sql)
            .bind(user_id)
            .execute(self.conn().as_mut())
            .await
            .map_err(backend_err)?;
        let flag_sql =
            format!("DELETE FROM {} WHERE user_id = $1", self.tables.effective_check_flags);
        sqlx::query(&flag_sql)
            .bind(user_id)
            .execute(self.conn().as_mut())
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn list_known_user_ids(&mut self) -> Result<Vec<String>, StateError> {
        let sql = format!(
            "SELECT user_id FROM {} UNION SELECT user_id FROM {}",
            self.tables.effective_permissions, self.tables.effective_check_flags
        );
        let rows = sqlx::query(&sql).fetch_all(self.conn().as_mut()).await.map_err(backend_err)?;
        rows.into_iter().map(|row| row.try_get("user_id").map_err(backend_err)).collect()
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StateError> {
        self.tx.take().expect("used once").commit().await.map_err(backend_err)
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StateError> {
        self.tx.take().expect("used once").rollback().await.map_err(backend_err)
    }
}
