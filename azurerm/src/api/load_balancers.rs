//! Load balancer and backend address pool operations

use tfplug::context::Context;

use super::client::Client;
use super::error::ApiError;
use super::lro::Poller;
use super::models::{BackendAddressPool, LoadBalancer};
use crate::ids::{BackendAddressPoolId, LoadBalancerId};

/// Load balancer API
pub struct LoadBalancersApi<'a> {
    client: &'a Client,
}

impl<'a> LoadBalancersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET {loadBalancerId}
    pub async fn get(&self, id: &LoadBalancerId) -> Result<LoadBalancer, ApiError> {
        self.client.get(&id.to_string()).await
    }

    /// PUT {loadBalancerId}, then wait for the operation
    pub async fn create_or_update(
        &self,
        ctx: &Context,
        id: &LoadBalancerId,
        load_balancer: &LoadBalancer,
    ) -> Result<(), ApiError> {
        let path = id.to_string();
        let response = self.client.put_raw(&path, load_balancer).await?;
        Poller::for_put(self.client, &path, &response).wait(ctx).await
    }

    /// DELETE {loadBalancerId}, then wait for the operation
    pub async fn delete(&self, ctx: &Context, id: &LoadBalancerId) -> Result<(), ApiError> {
        let path = id.to_string();
        let response = self.client.delete_raw(&path).await?;
        Poller::for_delete(self.client, &path, &response).wait(ctx).await
    }

    /// GET {loadBalancerId}/backendAddressPools/{name}
    pub async fn get_backend_address_pool(
        &self,
        id: &BackendAddressPoolId,
    ) -> Result<BackendAddressPool, ApiError> {
        self.client.get(&id.to_string()).await
    }

    /// PUT {loadBalancerId}/backendAddressPools/{name}, then wait
    pub async fn create_or_update_backend_address_pool(
        &self,
        ctx: &Context,
        id: &BackendAddressPoolId,
        pool: &BackendAddressPool,
    ) -> Result<(), ApiError> {
        let path = id.to_string();
        let response = self.client.put_raw(&path, pool).await?;
        Poller::for_put(self.client, &path, &response).wait(ctx).await
    }

    /// DELETE {loadBalancerId}/backendAddressPools/{name}, then wait
    pub async fn delete_backend_address_pool(
        &self,
        ctx: &Context,
        id: &BackendAddressPoolId,
    ) -> Result<(), ApiError> {
        let path = id.to_string();
        let response = self.client.delete_raw(&path).await?;
        Poller::for_delete(self.client, &path, &response).wait(ctx).await
    }
}
