//! Typed async client over the upstream gateway's quota and permission
//! admin API (spec §6).

pub mod client;
pub mod error;
pub mod http;
pub mod mock;

pub use client::GatewayClient;
pub use error::GatewayError;
pub use http::{HttpGatewayClient, HttpGatewayClientBuilder};
pub use mock::MockGatewayClient;
