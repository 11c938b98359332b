/// Configuration for the Postgres-backed [`crate::postgres::PostgresLedgerStore`].
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Maximum number of connections in the `sqlx` pool.
    pub pool_size: u32,
    /// Schema holding the ledger tables.
    pub schema: String,
    /// Prefix applied to every table name.
    pub table_prefix: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::from("postgres://localhost:5432/quota_manager"),
            pool_size: 10,
            schema: String::from("public"),
            table_prefix: String::from("qm_"),
        }
    }
}

impl PostgresConfig {
    pub(crate) fn table(&self, name: &str) -> String {
        format!("{}.{}{name}", self.schema, self.table_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_schema_and_prefix_qualified() {
        let cfg = PostgresConfig::default();
        assert_eq!(cfg.table("quota_lots"), "public.qm_quota_lots");
    }
}
