//! Azure Resource Manager API client

pub mod auth;
pub mod client;
pub mod error;
pub mod load_balancers;
pub mod lro;
pub mod models;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use auth::{ClientSecretCredential, CloudEnvironment, Credential};
pub use client::{Client, PollConfig, RawResponse, RetryConfig, API_VERSION};
pub use error::ApiError;
pub use lro::Poller;
