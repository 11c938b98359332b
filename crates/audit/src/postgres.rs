use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qm_core::{AuditOperation, QuotaAudit};
use sqlx::PgPool;

use crate::config::PostgresAuditConfig;
use crate::error::AuditError;
use crate::migrations;
use crate::query::{AuditPage, AuditQuery};
use crate::store::AuditStore;

/// Postgres-backed [`AuditStore`].
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Connect to `config.url` and ensure the audit table exists.
    pub async fn new(config: &PostgresAuditConfig) -> Result<Self, AuditError> {
        let pool = PgPool::connect(&config.url).await.map_err(|e| AuditError::Connection(e.to_string()))?;
        migrations::run_migrations(&pool, &config.prefix)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(Self { pool, table: config.table() })
    }

    /// Wrap an already-constructed pool, useful in tests.
    pub async fn from_pool(pool: PgPool, prefix: &str) -> Result<Self, AuditError> {
        migrations::run_migrations(&pool, prefix).await.map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(Self { pool, table: format!("{prefix}audit") })
    }
}

fn operation_str(op: AuditOperation) -> &'static str {
    match op {
        AuditOperation::Recharge => "recharge",
        AuditOperation::TransferIn => "transfer_in",
        AuditOperation::TransferOut => "transfer_out",
        AuditOperation::Expire => "expire",
    }
}

fn operation_from_str(s: &str) -> Result<AuditOperation, AuditError> {
    match s {
        "recharge" => Ok(AuditOperation::Recharge),
        "transfer_in" => Ok(AuditOperation::TransferIn),
        "transfer_out" => Ok(AuditOperation::TransferOut),
        "expire" => Ok(AuditOperation::Expire),
        other => Err(AuditError::Storage(format!("unknown audit operation: {other}"))),
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    user_id: String,
    operation: String,
    amount: i64,
    expiry_date: DateTime<Utc>,
    strategy_name: Option<String>,
    voucher_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for QuotaAudit {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> Result<Self, AuditError> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            operation: operation_from_str(&row.operation)?,
            amount: row.amount,
            expiry_date: row.expiry_date,
            strategy_name: row.strategy_name,
            voucher_code: row.voucher_code,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn record(&self, entry: QuotaAudit) -> Result<(), AuditError> {
        let sql = format!(
            "INSERT INTO {} (id, user_id, operation, amount, expiry_date, strategy_name, voucher_code, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&entry.user_id)
            .bind(operation_str(entry.operation))
            .bind(entry.amount)
            .bind(entry.expiry_date)
            .bind(&entry.strategy_name)
            .bind(&entry.voucher_code)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<QuotaAudit>, AuditError> {
        let sql =
            format!("SELECT * FROM {} WHERE user_id = $1 ORDER BY created_at DESC", self.table);
        let rows: Vec<AuditRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let (where_clause, bind_idx) = build_where_clause(query);

        let count_sql = format!("SELECT COUNT(*) FROM {} {where_clause}", self.table);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(user_id) = &query.user_id {
            count_q = count_q.bind(user_id);
        }
        if let Some(op) = query.operation {
            count_q = count_q.bind(operation_str(op));
        }
        if let Some(from) = query.from {
            count_q = count_q.bind(from);
        }
        if let Some(to) = query.to {
            count_q = count_q.bind(to);
        }
        let total =
            count_q.fetch_one(&self.pool).await.map_err(|e| AuditError::Storage(e.to_string()))?;

        let limit_idx = bind_idx;
        let offset_idx = bind_idx + 1;
        let data_sql = format!(
            "SELECT * FROM {} {where_clause} ORDER BY created_at DESC LIMIT ${limit_idx} OFFSET ${offset_idx}",
            self.table
        );
        let mut data_q = sqlx::query_as::<_, AuditRow>(&data_sql);
        if let Some(user_id) = &query.user_id {
            data_q = data_q.bind(user_id);
        }
        if let Some(op) = query.operation {
            data_q = data_q.bind(operation_str(op));
        }
        if let Some(from) = query.from {
            data_q = data_q.bind(from);
        }
        if let Some(to) = query.to {
            data_q = data_q.bind(to);
        }
        data_q = data_q.bind(i64::from(limit)).bind(i64::from(offset));

        let rows: Vec<AuditRow> =
            data_q.fetch_all(&self.pool).await.map_err(|e| AuditError::Storage(e.to_string()))?;
        let records = rows.into_iter().map(TryInto::try_into).collect::<Result<Vec<_>, _>>()?;

        #[allow(clippy::cast_sign_loss)]
        let total = total as u64;

        Ok(AuditPage { records, total, limit, offset })
    }
}

fn build_where_clause(query: &AuditQuery) -> (String, u32) {
    let mut conditions = Vec::new();
    let mut idx = 1u32;

    if query.user_id.is_some() {
        conditions.push(format!("user_id = ${idx}"));
        idx += 1;
    }
    if query.operation.is_some() {
        conditions.push(format!("operation = ${idx}"));
        idx += 1;
    }
    if query.from.is_some() {
        conditions.push(format!("created_at >= ${idx}"));
        idx += 1;
    }
    if query.to.is_some() {
        conditions.push(format!("created_at <= ${idx}"));
        idx += 1;
    }

    let where_clause =
        if conditions.is_empty() { String::new() } else { format!("WHERE {}", conditions.join(" AND ")) };
    (where_clause, idx)
}
