//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AzureLbProviderData {
    pub client: Arc<Client>,
    pub subscription_id: String,
}

impl AzureLbProviderData {
    pub fn new(client: Client, subscription_id: &str) -> Self {
        Self {
            client: Arc::new(client),
            subscription_id: subscription_id.to_string(),
        }
    }
}
