use async_trait::async_trait;

use crate::client::HrClient;
use crate::error::HrError;
use crate::model::{Department, Employee};

/// A fixed, in-memory [`HrClient`] for tests and for deployments that load
/// the mapping from a snapshot rather than polling live.
#[derive(Debug, Clone, Default)]
pub struct StaticHrClient {
    employees: Vec<Employee>,
    departments: Vec<Department>,
}

impl StaticHrClient {
    #[must_use]
    pub fn new(employees: Vec<Employee>, departments: Vec<Department>) -> Self {
        Self { employees, departments }
    }
}

#[async_trait]
impl HrClient for StaticHrClient {
    async fn list_employees(&self) -> Result<Vec<Employee>, HrError> {
        Ok(self.employees.clone())
    }

    async fn list_departments(&self) -> Result<Vec<Department>, HrError> {
        Ok(self.departments.clone())
    }
}
