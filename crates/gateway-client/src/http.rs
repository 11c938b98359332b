use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::GatewayClient;
use crate::error::GatewayError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP implementation of [`GatewayClient`] against the wire contract in
/// spec §6.
#[derive(Debug, Clone)]
pub struct HttpGatewayClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Builder for [`HttpGatewayClient`].
#[derive(Debug)]
pub struct HttpGatewayClientBuilder {
    base_url: String,
    token: String,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpGatewayClientBuilder {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            client: None,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<HttpGatewayClient, GatewayError> {
        let client = match self.client {
            Some(c) => c,
            None => Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| GatewayError::Terminal(format!("building HTTP client: {e}")))?,
        };
        Ok(HttpGatewayClient { client, base_url: self.base_url, token: self.token })
    }
}

/// Run `attempt` once, and again if the first call fails with a transient
/// error (spec §7: "Gateway calls are retried locally once on transient
/// error, then surfaced as failed").
async fn with_one_retry<T, F, Fut>(mut attempt: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            warn!(error = %e, "gateway call failed, retrying once");
            attempt().await
        }
        Err(e) => Err(e),
    }
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    consumer: &'a str,
    quota: i64,
}

#[derive(Serialize)]
struct DeltaBody<'a> {
    consumer: &'a str,
    value: i64,
}

#[derive(Deserialize)]
struct QuotaResponse {
    quota: i64,
}

#[derive(Deserialize)]
struct UsedResponse {
    used: i64,
}

#[derive(Serialize)]
struct ModelPermissionBody<'a> {
    employee_number: &'a str,
    operation: &'static str,
    models: &'a [String],
}

#[derive(Serialize)]
struct FlagBody<'a> {
    employee_number: &'a str,
    enabled: bool,
}

impl HttpGatewayClient {
    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
    }

    async fn send_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), GatewayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .auth(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(GatewayError::from_status(status, text))
        }
    }

    async fn get_query(&self, path: &str, consumer: &str) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .auth(self.client.get(&url))
            .query(&[("consumer", consumer)])
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(GatewayError::from_status(status, text))
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn refresh_quota(&self, consumer: &str, quota: i64) -> Result<(), GatewayError> {
        with_one_retry(|| async {
            let body = RefreshBody { consumer, quota };
            self.send_json("/quota/refresh", &body).await
        })
        .await
    }

    async fn get_quota(&self, consumer: &str) -> Result<i64, GatewayError> {
        with_one_retry(|| async {
            let response = self.get_query("/quota", consumer).await?;
            response
                .json::<QuotaResponse>()
                .await
                .map(|body| body.quota)
                .map_err(|e| GatewayError::Decode(e.to_string()))
        })
        .await
    }

    async fn delta_quota(&self, consumer: &str, value: i64) -> Result<(), GatewayError> {
        with_one_retry(|| async {
            let body = DeltaBody { consumer, value };
            self.send_json("/quota/delta", &body).await
        })
        .await
    }

    async fn get_used(&self, consumer: &str) -> Result<i64, GatewayError> {
        with_one_retry(|| async {
            let response = self.get_query("/quota/used", consumer).await?;
            response
                .json::<UsedResponse>()
                .await
                .map(|body| body.used)
                .map_err(|e| GatewayError::Decode(e.to_string()))
        })
        .await
    }

    async fn delta_used(&self, consumer: &str, value: i64) -> Result<(), GatewayError> {
        with_one_retry(|| async {
            let body = DeltaBody { consumer, value };
            self.send_json("/quota/used/delta", &body).await
        })
        .await
    }

    async fn push_model_permission(
        &self,
        employee_number: &str,
        models: &[String],
    ) -> Result<(), GatewayError> {
        with_one_retry(|| async {
            let body = ModelPermissionBody { employee_number, operation: "set", models };
            self.send_json("/model-permission", &body).await
        })
        .await
    }

    async fn push_star_check(&self, employee_number: &str, enabled: bool) -> Result<(), GatewayError> {
        with_one_retry(|| async {
            let body = FlagBody { employee_number, enabled };
            self.send_json("/star-check", &body).await
        })
        .await
    }

    async fn push_quota_check(&self, employee_number: &str, enabled: bool) -> Result<(), GatewayError> {
        with_one_retry(|| async {
            let body = FlagBody { employee_number, enabled };
            self.send_json("/quota-check", &body).await
        })
        .await
    }
}
