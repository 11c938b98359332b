/// Configuration for [`crate::postgres::PostgresAuditStore`].
#[derive(Debug, Clone)]
pub struct PostgresAuditConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Table name prefix.
    pub prefix: String,
}

impl PostgresAuditConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), prefix: "qm_".to_owned() }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub(crate) fn table(&self) -> String {
        format!("{}audit", self.prefix)
    }
}
