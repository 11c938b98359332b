use async_trait::async_trait;
use reqwest::Client;

use crate::client::HrClient;
use crate::error::HrError;
use crate::model::{Department, Employee};

/// HTTP implementation of [`HrClient`].
#[derive(Debug, Clone)]
pub struct HttpHrClient {
    client: Client,
    base_url: String,
}

impl HttpHrClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into().trim_end_matches('/').to_owned() }
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_owned() }
    }
}

#[async_trait]
impl HrClient for HttpHrClient {
    async fn list_employees(&self) -> Result<Vec<Employee>, HrError> {
        let url = format!("{}/employees", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| HrError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(HrError::Request(format!("HTTP {}", response.status())));
        }
        response.json().await.map_err(|e| HrError::Decode(e.to_string()))
    }

    async fn list_departments(&self) -> Result<Vec<Department>, HrError> {
        let url = format!("{}/departments", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| HrError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(HrError::Request(format!("HTTP {}", response.status())));
        }
        response.json().await.map_err(|e| HrError::Decode(e.to_string()))
    }
}
