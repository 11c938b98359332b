use sqlx::PgPool;

/// Create the audit table and its indexes if they do not already exist.
pub async fn run_migrations(pool: &PgPool, prefix: &str) -> Result<(), sqlx::Error> {
    let table = format!("{prefix}audit");

    let create_table = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            operation     TEXT NOT NULL,
            amount        BIGINT NOT NULL,
            expiry_date   TIMESTAMPTZ NOT NULL,
            strategy_name TEXT,
            voucher_code  TEXT,
            created_at    TIMESTAMPTZ NOT NULL
        )"
    );
    sqlx::query(&create_table).execute(pool).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_user_time ON {table} (user_id, created_at DESC)"
    );
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}
