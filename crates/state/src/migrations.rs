use sqlx::PgPool;

use crate::config::PostgresConfig;
use crate::error::StateError;

/// Create the ledger tables if they do not already exist.
///
/// Mirrors the teacher's approach of plain `CREATE TABLE IF NOT EXISTS` DDL
/// run at construction time rather than a versioned migration runner: this
/// crate has no schema history to replay, only a fixed, current shape.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), StateError> {
    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount BIGINT NOT NULL,
                expiry_date TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL
            )",
            config.table("quota_lots")
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}quota_lots_user_idx ON {table} (user_id)",
            prefix = config.table_prefix,
            table = config.table("quota_lots")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                strategy_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                expiry_date TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL,
                batch_id TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (strategy_id, user_id, batch_id)
            )",
            config.table("quota_executes")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                voucher_code TEXT PRIMARY KEY,
                receiver_id TEXT NOT NULL,
                redeemed_at TIMESTAMPTZ NOT NULL
            )",
            config.table("voucher_redemptions")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                scope TEXT NOT NULL,
                key TEXT NOT NULL,
                models TEXT NOT NULL,
                PRIMARY KEY (scope, key)
            )",
            config.table("whitelist_entries")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                flavor TEXT NOT NULL,
                scope TEXT NOT NULL,
                key TEXT NOT NULL,
                state TEXT NOT NULL,
                PRIMARY KEY (flavor, scope, key)
            )",
            config.table("check_flags")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                user_id TEXT PRIMARY KEY,
                models TEXT NOT NULL
            )",
            config.table("effective_permissions")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                user_id TEXT NOT NULL,
                flavor TEXT NOT NULL,
                enabled BOOLEAN NOT NULL,
                PRIMARY KEY (user_id, flavor)
            )",
            config.table("effective_check_flags")
        ),
    ];

    for statement in statements {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
    }

    Ok(())
}
