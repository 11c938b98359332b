//! Typed client for the HR source's employee/department mapping (spec §6).

pub mod client;
pub mod error;
pub mod http;
pub mod model;
pub mod static_client;

pub use client::HrClient;
pub use error::HrError;
pub use http::HttpHrClient;
pub use model::{Department, Employee};
pub use static_client::StaticHrClient;
