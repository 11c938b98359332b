use async_trait::async_trait;

use crate::error::HrError;
use crate::model::{Department, Employee};

/// The HR source's two polled endpoints (spec §6: "employees, departments").
#[async_trait]
pub trait HrClient: Send + Sync {
    async fn list_employees(&self) -> Result<Vec<Employee>, HrError>;
    async fn list_departments(&self) -> Result<Vec<Department>, HrError>;
}
