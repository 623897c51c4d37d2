//! Backend address pool resource implementation
//!
//! Pools on Basic SKU load balancers can only be written through the parent,
//! every other SKU uses the dedicated `backendAddressPools` endpoint. Updates
//! start from the current pool so addresses managed elsewhere survive.

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use super::common::{self, Mutation};
use crate::api::models::{
    ids_of, BackendAddressPool, GatewayLoadBalancerTunnelInterface, LoadBalancer, SubResource,
};
use crate::api::Client;
use crate::ids::{BackendAddressPoolId, LoadBalancerId};
use crate::locks;
use crate::timeouts::{self, Operation};
use crate::validate;

const LABEL: &str = "Backend Address Pool";

#[derive(Default)]
pub struct LbBackendAddressPoolResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbBackendAddressPoolResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbBackendAddressPoolConfig {
    pub name: String,
    pub load_balancer_id: LoadBalancerId,
    pub virtual_network_id: Option<String>,
    pub tunnel_interfaces: Vec<GatewayLoadBalancerTunnelInterface>,
}

fn pools(lb: &mut LoadBalancer) -> &mut Vec<BackendAddressPool> {
    &mut lb.properties.backend_address_pools
}

#[async_trait]
impl Resource for LbBackendAddressPoolResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_backend_address_pool"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let id_list = || AttributeType::List(Box::new(AttributeType::String));
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a Load Balancer backend address pool")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the Backend Address Pool")
                    .required()
                    .validator(validate::child_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("loadbalancer_id", AttributeType::String)
                    .description("The ID of the Load Balancer in which to create the pool")
                    .required()
                    .validator(validate::load_balancer_id())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_network_id", AttributeType::String)
                    .description("The ID of the Virtual Network backend addresses belong to")
                    .optional()
                    .validator(validate::non_empty())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_ip_configurations", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("load_balancing_rules", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("outbound_rules", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("inbound_nat_rules", id_list())
                    .computed()
                    .build(),
            )
            .block(tunnel_interface_block())
            .block(timeouts::resource_block())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.write(&ctx, &request.planned_state, Mutation::Create).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = async {
            let client = self.client()?;
            let ctx = timeouts::operation_context(&ctx, &request.current_state, Operation::Read)?;
            let id = parse_state_id(&request.current_state)?;
            common::with_deadline(
                &ctx,
                &format!("reading {}", id),
                read_state(client, &id, request.current_state.clone()),
            )
            .await
        }
        .await;

        match result {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
                private: request.private,
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
                private: request.private,
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self.write(&ctx, &request.planned_state, Mutation::Update).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let result = async {
            let client = self.client()?;
            let ctx = timeouts::operation_context(&ctx, &request.prior_state, Operation::Delete)?;
            let id = parse_state_id(&request.prior_state)?;
            common::with_deadline(&ctx, &format!("deleting {}", id), delete_pool(&ctx, client, &id))
                .await
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

fn tunnel_interface_block() -> NestedBlock {
    NestedBlockBuilder::new("tunnel_interface")
        .nesting(NestingMode::List)
        .description("Gateway Load Balancer tunnel interfaces; required on Gateway SKU and not allowed elsewhere")
        .attribute(
            AttributeBuilder::new("identifier", AttributeType::Number)
                .required()
                .validator(validate::between(800, 1000))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("type", AttributeType::String)
                .required()
                .validator(validate::one_of(&validate::TUNNEL_INTERFACE_TYPES))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("protocol", AttributeType::String)
                .required()
                .validator(validate::one_of(&validate::TUNNEL_PROTOCOLS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("port", AttributeType::Number)
                .required()
                .validator(validate::between(1, 65535))
                .build(),
        )
        .build()
}

impl LbBackendAddressPoolResource {
    pub(crate) fn extract_pool_config(
        config: &DynamicValue,
    ) -> Result<LbBackendAddressPoolConfig, Diagnostic> {
        let load_balancer_id = common::required_string(config, "loadbalancer_id")?;
        let load_balancer_id = LoadBalancerId::parse(&load_balancer_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;

        Ok(LbBackendAddressPoolConfig {
            name: common::required_string(config, "name")?,
            load_balancer_id,
            virtual_network_id: common::string(config, "virtual_network_id")
                .filter(|id| !id.is_empty()),
            tunnel_interfaces: expand_tunnel_interfaces(config),
        })
    }

    fn client(&self) -> Result<&Client, Diagnostic> {
        common::client(&self.provider_data)
    }

    async fn write(
        &self,
        ctx: &Context,
        planned_state: &DynamicValue,
        mutation: Mutation,
    ) -> Result<DynamicValue, Diagnostic> {
        let client = self.client()?;
        let (op, action) = match mutation {
            Mutation::Create => (Operation::Create, "creating"),
            Mutation::Update => (Operation::Update, "updating"),
        };
        let ctx = timeouts::operation_context(ctx, planned_state, op)?;
        let config = Self::extract_pool_config(planned_state)?;
        let id = config.load_balancer_id.backend_address_pool(&config.name);

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            let lb = common::require_load_balancer(client, &config.load_balancer_id).await?;
            check_tunnel_interfaces(&lb, &config.tunnel_interfaces)?;

            if lb.is_basic() {
                common::write_child(
                    &ctx,
                    client,
                    &config.load_balancer_id,
                    &config.name,
                    LABEL,
                    mutation,
                    pools,
                    |lb| {
                        let current = common::find_by_name(&lb.properties.backend_address_pools, &config.name);
                        Ok(expand_pool(current.cloned(), &config))
                    },
                )
                .await?;
            } else {
                write_pool(&ctx, client, &id, &config, mutation).await?;
            }

            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Backend Address Pool",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

/// Writes the pool through its own endpoint under the parent lock
async fn write_pool(
    ctx: &Context,
    client: &Client,
    id: &BackendAddressPoolId,
    config: &LbBackendAddressPoolConfig,
    mutation: Mutation,
) -> Result<(), Diagnostic> {
    let _lock = locks::by_name(&id.load_balancer_name, locks::LOAD_BALANCER_KIND).await;
    let api = client.load_balancers();

    let current = match api.get_backend_address_pool(id).await {
        Ok(pool) => Some(pool),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(common::api_error("Failed to retrieve Backend Address Pool", id, e)),
    };
    match (mutation, &current) {
        (Mutation::Create, Some(_)) => {
            return Err(Diagnostic::error(
                "Resource already exists",
                format!(
                    "{} already exists - to be managed via Terraform this resource needs to be imported into the State",
                    id
                ),
            ));
        }
        (Mutation::Update, None) => {
            return Err(Diagnostic::error(
                "Backend Address Pool not found",
                format!("{} was not found", id),
            ));
        }
        _ => {}
    }

    let pool = expand_pool(current, config);
    tracing::info!("Writing {}", id);
    api.create_or_update_backend_address_pool(ctx, id, &pool)
        .await
        .map_err(|e| common::api_error("Failed to write Backend Address Pool", id, e))
}

async fn delete_pool(
    ctx: &Context,
    client: &Client,
    id: &BackendAddressPoolId,
) -> Result<(), Diagnostic> {
    let lb_id = id.load_balancer_id();
    let Some(lb) = common::get_load_balancer(client, &lb_id).await? else {
        tracing::info!("{} is gone, nothing to delete for {}", lb_id, id);
        return Ok(());
    };
    if lb.is_basic() {
        return common::remove_child(ctx, client, &lb_id, &id.name, LABEL, pools).await;
    }

    let _lock = locks::by_name(&id.load_balancer_name, locks::LOAD_BALANCER_KIND).await;
    match client.load_balancers().delete_backend_address_pool(ctx, id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(common::api_error("Failed to delete Backend Address Pool", id, e)),
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<BackendAddressPoolId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    BackendAddressPoolId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

fn check_tunnel_interfaces(
    lb: &LoadBalancer,
    tunnel_interfaces: &[GatewayLoadBalancerTunnelInterface],
) -> Result<(), Diagnostic> {
    let path = AttributePath::new("tunnel_interface");
    match (lb.is_gateway(), tunnel_interfaces.is_empty()) {
        (true, true) => Err(Diagnostic::error(
            "Missing tunnel_interface",
            "Backend Address Pools on Gateway SKU Load Balancers need at least one tunnel_interface",
        )
        .with_attribute(path)),
        (false, false) => Err(Diagnostic::error(
            "Invalid tunnel_interface",
            format!(
                "tunnel_interface is only supported on Gateway SKU Load Balancers, this one is {}",
                lb.sku_name()
            ),
        )
        .with_attribute(path)),
        _ => Ok(()),
    }
}

fn expand_tunnel_interfaces(config: &DynamicValue) -> Vec<GatewayLoadBalancerTunnelInterface> {
    config
        .get_list(&AttributePath::new("tunnel_interface"))
        .unwrap_or_default()
        .iter()
        .filter_map(Dynamic::as_map)
        .map(|entry| GatewayLoadBalancerTunnelInterface {
            identifier: entry.get("identifier").and_then(Dynamic::as_number).map(|n| n as i64),
            interface_type: entry.get("type").and_then(Dynamic::as_string).map(str::to_string),
            protocol: entry.get("protocol").and_then(Dynamic::as_string).map(str::to_string),
            port: entry.get("port").and_then(Dynamic::as_number).map(|n| n as i64),
        })
        .collect()
}

/// Applies the configured fields on top of `current`
fn expand_pool(
    current: Option<BackendAddressPool>,
    config: &LbBackendAddressPoolConfig,
) -> BackendAddressPool {
    let mut pool = current.unwrap_or_default();
    pool.name = Some(config.name.clone());
    pool.properties.virtual_network = config.virtual_network_id.as_deref().map(SubResource::new);
    pool.properties.tunnel_interfaces =
        (!config.tunnel_interfaces.is_empty()).then(|| config.tunnel_interfaces.clone());
    pool
}

pub(crate) fn flatten_tunnel_interfaces(
    tunnel_interfaces: &Option<Vec<GatewayLoadBalancerTunnelInterface>>,
) -> Vec<Dynamic> {
    tunnel_interfaces
        .iter()
        .flatten()
        .map(|ti| {
            let number = |v: Option<i64>| v.map_or(Dynamic::Null, |n| Dynamic::Number(n as f64));
            let string = |v: &Option<String>| {
                v.as_ref().map_or(Dynamic::Null, |s| Dynamic::String(s.clone()))
            };
            let mut entry = HashMap::new();
            entry.insert("identifier".to_string(), number(ti.identifier));
            entry.insert("type".to_string(), string(&ti.interface_type));
            entry.insert("protocol".to_string(), string(&ti.protocol));
            entry.insert("port".to_string(), number(ti.port));
            Dynamic::Map(entry)
        })
        .collect()
}

pub(crate) fn flatten_pool(state: &mut DynamicValue, lb_id: &LoadBalancerId, pool: &BackendAddressPool) {
    let props = &pool.properties;
    common::set_opt_string(state, "name", pool.name.as_deref());
    common::set_string(state, "loadbalancer_id", lb_id.to_string());
    common::set_opt_string(
        state,
        "virtual_network_id",
        props.virtual_network.as_ref().map(|v| v.id.as_str()),
    );
    common::set_string_list(
        state,
        "backend_ip_configurations",
        ids_of(&props.backend_ip_configurations),
    );
    common::set_string_list(state, "load_balancing_rules", ids_of(&props.load_balancing_rules));

    let mut outbound = ids_of(&props.outbound_rules);
    if outbound.is_empty() {
        outbound.extend(props.outbound_rule.iter().map(|r| r.id.clone()));
    }
    common::set_string_list(state, "outbound_rules", outbound);
    common::set_string_list(state, "inbound_nat_rules", ids_of(&props.inbound_nat_rules));
    let _ = state.set_list(
        &AttributePath::new("tunnel_interface"),
        flatten_tunnel_interfaces(&props.tunnel_interfaces),
    );
}

async fn read_state(
    client: &Client,
    id: &BackendAddressPoolId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let pool = match client.load_balancers().get_backend_address_pool(id).await {
        Ok(pool) => pool,
        Err(e) if e.is_not_found() => {
            tracing::info!("{} was not found - removing from state", id);
            return Ok(None);
        }
        Err(e) => return Err(common::api_error("Failed to retrieve Backend Address Pool", id, e)),
    };
    common::set_string(&mut state, "id", id.to_string());
    flatten_pool(&mut state, &id.load_balancer_id(), &pool);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbBackendAddressPoolResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match common::provider_data_from(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for LbBackendAddressPoolResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match BackendAddressPoolId::parse(&request.id) {
            Ok(_) => {
                import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response)
            }
            Err(e) => response
                .diagnostics
                .push(Diagnostic::error("Invalid import ID", e.to_string())),
        }
        response
    }
}

#[cfg(test)]
#[path = "./resource_lb_backend_address_pool_test.rs"]
mod resource_lb_backend_address_pool_test;
