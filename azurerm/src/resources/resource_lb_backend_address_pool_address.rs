//! Backend address pool address resource implementation
//!
//! Addresses live in the pool's `loadBalancerBackendAddresses`. Regional load
//! balancers address backends by virtual network and IP, Global (cross-region)
//! load balancers by the frontend IP configuration of a regional load balancer.

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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use super::common::{self, Mutation};
use crate::api::models::{
    BackendAddressPool, LoadBalancer, LoadBalancerBackendAddress,
    LoadBalancerBackendAddressProperties, NatRulePortMapping, SubResource,
};
use crate::api::Client;
use crate::ids::{BackendAddressPoolAddressId, BackendAddressPoolId};
use crate::locks;
use crate::timeouts::{self, Operation};
use crate::validate;

#[derive(Default)]
pub struct LbBackendAddressPoolAddressResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbBackendAddressPoolAddressResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Where an address points, depending on the parent tier
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AddressTarget {
    Regional {
        virtual_network_id: String,
        ip_address: String,
    },
    Global {
        frontend_ip_configuration_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbBackendAddressConfig {
    pub name: String,
    pub pool_id: BackendAddressPoolId,
    pub virtual_network_id: Option<String>,
    pub ip_address: Option<String>,
    pub frontend_ip_configuration_id: Option<String>,
}

#[async_trait]
impl Resource for LbBackendAddressPoolAddressResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_backend_address_pool_address"
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
        let mapping = HashMap::from([
            ("inbound_nat_rule_name".to_string(), AttributeType::String),
            ("frontend_port".to_string(), AttributeType::Number),
            ("backend_port".to_string(), AttributeType::Number),
        ]);
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a single address in a Load Balancer backend address pool")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(validate::non_empty())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_address_pool_id", AttributeType::String)
                    .required()
                    .validator(validate::backend_address_pool_id())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_network_id", AttributeType::String)
                    .description("Virtual Network of the address; Regional tier only")
                    .optional()
                    .validator(validate::non_empty())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ip_address", AttributeType::String)
                    .description("Static IP address of the backend; Regional tier only")
                    .optional()
                    .validator(validate::ip_address())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_address_ip_configuration_id", AttributeType::String)
                    .description("Frontend IP configuration of a regional Load Balancer; Global tier only")
                    .optional()
                    .validator(validate::frontend_ip_configuration_id())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "inbound_nat_rule_port_mapping",
                    AttributeType::List(Box::new(AttributeType::Object(mapping))),
                )
                .computed()
                .build(),
            )
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let config = &request.config;
        let mut diagnostics = vec![];
        let ip_config = common::string(config, "backend_address_ip_configuration_id");
        let regional = common::string(config, "virtual_network_id")
            .or_else(|| common::string(config, "ip_address"));
        if ip_config.is_some() && regional.is_some() {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting backend address",
                    "backend_address_ip_configuration_id cannot be combined with virtual_network_id or ip_address",
                )
                .with_attribute(AttributePath::new("backend_address_ip_configuration_id")),
            );
        }
        ValidateResourceConfigResponse { diagnostics }
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
            common::with_deadline(
                &ctx,
                &format!("deleting {}", id),
                delete_address(&ctx, client, &id),
            )
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

impl LbBackendAddressPoolAddressResource {
    pub(crate) fn extract_address_config(
        config: &DynamicValue,
    ) -> Result<LbBackendAddressConfig, Diagnostic> {
        let pool_id = common::required_string(config, "backend_address_pool_id")?;
        let pool_id = BackendAddressPoolId::parse(&pool_id).map_err(|e| {
            Diagnostic::error("Invalid backend_address_pool_id", e.to_string())
                .with_attribute(AttributePath::new("backend_address_pool_id"))
        })?;
        let non_empty = |name: &str| common::string(config, name).filter(|v| !v.is_empty());

        Ok(LbBackendAddressConfig {
            name: common::required_string(config, "name")?,
            pool_id,
            virtual_network_id: non_empty("virtual_network_id"),
            ip_address: non_empty("ip_address"),
            frontend_ip_configuration_id: non_empty("backend_address_ip_configuration_id"),
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
        let config = Self::extract_address_config(planned_state)?;
        let id = BackendAddressPoolAddressId::new(&config.pool_id, &config.name);

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            let lb = common::require_load_balancer(client, &config.pool_id.load_balancer_id()).await?;
            let target = address_target(&lb, &config)?;
            write_address(&ctx, client, &id, target, mutation).await?;
            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Backend Address Pool Address",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<BackendAddressPoolAddressId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    BackendAddressPoolAddressId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

/// Checks the configured fields against the tier of the parent
pub(crate) fn address_target(
    lb: &LoadBalancer,
    config: &LbBackendAddressConfig,
) -> Result<AddressTarget, Diagnostic> {
    if lb.is_basic() {
        return Err(Diagnostic::error(
            "Unsupported Load Balancer SKU",
            "Backend Addresses are not supported on Basic SKU Load Balancers",
        ));
    }
    if lb.is_global() {
        if config.virtual_network_id.is_some() || config.ip_address.is_some() {
            return Err(Diagnostic::error(
                "Invalid backend address",
                "virtual_network_id and ip_address cannot be set for a Global tier Load Balancer",
            ));
        }
        let frontend_ip_configuration_id =
            config.frontend_ip_configuration_id.clone().ok_or_else(|| {
                Diagnostic::error(
                    "Missing backend_address_ip_configuration_id",
                    "backend_address_ip_configuration_id is required for a Global tier Load Balancer",
                )
                .with_attribute(AttributePath::new("backend_address_ip_configuration_id"))
            })?;
        return Ok(AddressTarget::Global {
            frontend_ip_configuration_id,
        });
    }

    if config.frontend_ip_configuration_id.is_some() {
        return Err(Diagnostic::error(
            "Invalid backend address",
            "backend_address_ip_configuration_id can only be set for a Global tier Load Balancer",
        )
        .with_attribute(AttributePath::new("backend_address_ip_configuration_id")));
    }
    match (&config.virtual_network_id, &config.ip_address) {
        (Some(virtual_network_id), Some(ip_address)) => Ok(AddressTarget::Regional {
            virtual_network_id: virtual_network_id.clone(),
            ip_address: ip_address.clone(),
        }),
        _ => Err(Diagnostic::error(
            "Missing backend address",
            "virtual_network_id and ip_address are required for a Regional tier Load Balancer",
        )),
    }
}

fn expand_address(name: &str, target: AddressTarget) -> LoadBalancerBackendAddress {
    let mut properties = LoadBalancerBackendAddressProperties::default();
    match target {
        AddressTarget::Regional {
            virtual_network_id,
            ip_address,
        } => {
            properties.virtual_network = Some(SubResource::new(virtual_network_id));
            properties.ip_address = Some(ip_address);
        }
        AddressTarget::Global {
            frontend_ip_configuration_id,
        } => {
            properties.load_balancer_frontend_ip_configuration =
                Some(SubResource::new(frontend_ip_configuration_id));
        }
    }
    LoadBalancerBackendAddress {
        name: Some(name.to_string()),
        properties,
    }
}

fn position(addresses: &[LoadBalancerBackendAddress], name: &str) -> Option<usize> {
    addresses.iter().position(|a| a.name.as_deref() == Some(name))
}

async fn get_pool(
    client: &Client,
    id: &BackendAddressPoolId,
) -> Result<Option<BackendAddressPool>, Diagnostic> {
    match client.load_balancers().get_backend_address_pool(id).await {
        Ok(pool) => Ok(Some(pool)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(common::api_error("Failed to retrieve Backend Address Pool", id, e)),
    }
}

async fn write_address(
    ctx: &Context,
    client: &Client,
    id: &BackendAddressPoolAddressId,
    target: AddressTarget,
    mutation: Mutation,
) -> Result<(), Diagnostic> {
    let pool_id = id.backend_address_pool_id();
    let _lb_lock = locks::by_name(&id.load_balancer_name, locks::LOAD_BALANCER_KIND).await;
    let _pool_lock = locks::by_name(&id.pool_name, locks::BACKEND_ADDRESS_POOL_KIND).await;

    let mut pool = get_pool(client, &pool_id).await?.ok_or_else(|| {
        Diagnostic::error(
            "Backend Address Pool not found",
            format!("{} was not found", pool_id),
        )
    })?;
    let addresses = pool
        .properties
        .load_balancer_backend_addresses
        .get_or_insert_with(Vec::new);
    let address = expand_address(&id.name, target);
    match (mutation, position(addresses, &id.name)) {
        (Mutation::Create, Some(_)) => {
            return Err(Diagnostic::error(
                "Resource already exists",
                format!(
                    "{} already exists - to be managed via Terraform this resource needs to be imported into the State",
                    id
                ),
            ));
        }
        (Mutation::Create, None) => addresses.push(address),
        (Mutation::Update, Some(idx)) => addresses[idx] = address,
        (Mutation::Update, None) => {
            return Err(Diagnostic::error(
                "Backend Address Pool Address not found",
                format!("{} was not found", id),
            ));
        }
    }

    tracing::info!("Writing address {:?} to {}", id.name, pool_id);
    client
        .load_balancers()
        .create_or_update_backend_address_pool(ctx, &pool_id, &pool)
        .await
        .map_err(|e| common::api_error("Failed to update Backend Address Pool", &pool_id, e))
}

async fn delete_address(
    ctx: &Context,
    client: &Client,
    id: &BackendAddressPoolAddressId,
) -> Result<(), Diagnostic> {
    let pool_id = id.backend_address_pool_id();
    let _lb_lock = locks::by_name(&id.load_balancer_name, locks::LOAD_BALANCER_KIND).await;
    let _pool_lock = locks::by_name(&id.pool_name, locks::BACKEND_ADDRESS_POOL_KIND).await;

    let Some(mut pool) = get_pool(client, &pool_id).await? else {
        tracing::info!("{} is gone, nothing to delete for {}", pool_id, id);
        return Ok(());
    };
    let addresses = pool
        .properties
        .load_balancer_backend_addresses
        .get_or_insert_with(Vec::new);
    let Some(idx) = position(addresses, &id.name) else {
        tracing::info!("{} is already gone", id);
        return Ok(());
    };
    addresses.remove(idx);

    client
        .load_balancers()
        .create_or_update_backend_address_pool(ctx, &pool_id, &pool)
        .await
        .map_err(|e| common::api_error("Failed to update Backend Address Pool", &pool_id, e))
}

fn flatten_port_mapping(mapping: &NatRulePortMapping) -> Dynamic {
    let number = |v: Option<i64>| v.map_or(Dynamic::Null, |n| Dynamic::Number(n as f64));
    let mut entry = HashMap::new();
    entry.insert(
        "inbound_nat_rule_name".to_string(),
        mapping
            .inbound_nat_rule_name
            .clone()
            .map_or(Dynamic::Null, Dynamic::String),
    );
    entry.insert("frontend_port".to_string(), number(mapping.frontend_port));
    entry.insert("backend_port".to_string(), number(mapping.backend_port));
    Dynamic::Map(entry)
}

fn flatten_address(
    state: &mut DynamicValue,
    pool_id: &BackendAddressPoolId,
    address: &LoadBalancerBackendAddress,
) {
    let props = &address.properties;
    common::set_opt_string(state, "name", address.name.as_deref());
    common::set_string(state, "backend_address_pool_id", pool_id.to_string());
    common::set_opt_string(
        state,
        "virtual_network_id",
        props.virtual_network.as_ref().map(|v| v.id.as_str()),
    );
    common::set_opt_string(state, "ip_address", props.ip_address.as_deref());
    common::set_opt_string(
        state,
        "backend_address_ip_configuration_id",
        props
            .load_balancer_frontend_ip_configuration
            .as_ref()
            .map(|f| f.id.as_str()),
    );
    let mappings = props
        .inbound_nat_rules_port_mapping
        .iter()
        .flatten()
        .map(flatten_port_mapping)
        .collect();
    let _ = state.set_list(&AttributePath::new("inbound_nat_rule_port_mapping"), mappings);
}

async fn read_state(
    client: &Client,
    id: &BackendAddressPoolAddressId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let pool_id = id.backend_address_pool_id();
    let address = get_pool(client, &pool_id).await?.and_then(|pool| {
        pool.properties
            .load_balancer_backend_addresses
            .into_iter()
            .flatten()
            .find(|a| a.name.as_deref() == Some(id.name.as_str()))
    });
    let Some(address) = address else {
        tracing::info!("{} was not found - removing from state", id);
        return Ok(None);
    };
    common::set_string(&mut state, "id", id.to_string());
    flatten_address(&mut state, &pool_id, &address);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbBackendAddressPoolAddressResource {
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
impl ResourceWithImportState for LbBackendAddressPoolAddressResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match BackendAddressPoolAddressId::parse(&request.id) {
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
mod tests {
    use super::*;
    use crate::resources::test_support::{self, pool_id, LB_ID};
    use mockito::{Matcher, Server};
    use serde_json::json;

    const VNET: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet";

    fn address_id() -> String {
        format!("{}/addresses/web1", pool_id("pool"))
    }

    fn planned(extra: serde_json::Value) -> DynamicValue {
        let mut base = json!({
            "id": null,
            "name": "web1",
            "backend_address_pool_id": pool_id("pool"),
            "virtual_network_id": VNET,
            "ip_address": "10.0.1.4",
            "backend_address_ip_configuration_id": null,
            "inbound_nat_rule_port_mapping": null,
            "timeouts": null
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
            target.extend(extra);
        }
        test_support::value(base)
    }

    fn global_lb() -> LoadBalancer {
        let mut lb: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Standard", json!({}))).unwrap();
        lb.sku = Some(crate::api::models::LoadBalancerSku {
            name: Some("Standard".to_string()),
            tier: Some("Global".to_string()),
        });
        lb
    }

    #[test]
    fn regional_and_global_targets() {
        let regional: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Standard", json!({}))).unwrap();
        let config =
            LbBackendAddressPoolAddressResource::extract_address_config(&planned(json!({})))
                .unwrap();
        assert_eq!(
            address_target(&regional, &config).unwrap(),
            AddressTarget::Regional {
                virtual_network_id: VNET.to_string(),
                ip_address: "10.0.1.4".to_string(),
            }
        );
        assert_eq!(
            address_target(&global_lb(), &config).unwrap_err().summary,
            "Invalid backend address"
        );

        let remote_frontend = "/subscriptions/sub/resourceGroups/rg2/providers/Microsoft.Network/loadBalancers/regional/frontendIPConfigurations/fe";
        let global_config = LbBackendAddressPoolAddressResource::extract_address_config(&planned(
            json!({
                "virtual_network_id": null,
                "ip_address": null,
                "backend_address_ip_configuration_id": remote_frontend
            }),
        ))
        .unwrap();
        assert_eq!(
            address_target(&global_lb(), &global_config).unwrap(),
            AddressTarget::Global {
                frontend_ip_configuration_id: remote_frontend.to_string(),
            }
        );
        assert_eq!(
            address_target(&regional, &global_config).unwrap_err().summary,
            "Invalid backend address"
        );
    }

    #[tokio::test]
    async fn validate_rejects_mixed_forms() {
        let response = LbBackendAddressPoolAddressResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "azurerm_lb_backend_address_pool_address".to_string(),
                    config: planned(json!({"backend_address_ip_configuration_id": "/fe"})),
                    client_capabilities: Default::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Conflicting backend address");
    }

    #[tokio::test]
    async fn create_appends_to_pool_and_keeps_other_addresses() {
        let mut server = Server::new_async().await;
        let pool_path = pool_id("pool");
        let existing = json!({
            "id": pool_path,
            "name": "pool",
            "properties": {
                "loadBalancerBackendAddresses": [
                    {"name": "web0", "properties": {"ipAddress": "10.0.1.3", "virtualNetwork": {"id": VNET}}}
                ]
            }
        });
        let written = json!({
            "id": pool_path,
            "name": "pool",
            "properties": {
                "loadBalancerBackendAddresses": [
                    {"name": "web0", "properties": {"ipAddress": "10.0.1.3", "virtualNetwork": {"id": VNET}}},
                    {"name": "web1", "properties": {
                        "ipAddress": "10.0.1.4",
                        "virtualNetwork": {"id": VNET},
                        "inboundNatRulesPortMapping": [
                            {"inboundNatRuleName": "ssh", "frontendPort": 3001, "backendPort": 22}
                        ]
                    }}
                ]
            }
        });
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .create_async()
            .await;
        let _before = server
            .mock("GET", pool_path.as_str())
            .match_query(Matcher::Any)
            .with_body(existing.to_string())
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", pool_path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex(
                r#""loadBalancerBackendAddresses":\[\{"name":"web0".*\},\{"name":"web1""#.to_string(),
            ))
            .with_body(written.to_string())
            .create_async()
            .await;
        let _after = server
            .mock("GET", pool_path.as_str())
            .match_query(Matcher::Any)
            .with_body(written.to_string())
            .create_async()
            .await;

        let resource = LbBackendAddressPoolAddressResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool_address".to_string(),
                    planned_state: planned(json!({})),
                    config: planned(json!({})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(common::string(&response.new_state, "id"), Some(address_id()));
        let mappings = response
            .new_state
            .get_list(&AttributePath::new("inbound_nat_rule_port_mapping"))
            .unwrap();
        let mapping = mappings[0].as_map().unwrap();
        assert_eq!(mapping["inbound_nat_rule_name"], Dynamic::String("ssh".to_string()));
        assert_eq!(mapping["frontend_port"], Dynamic::Number(3001.0));
        put.assert_async().await;
    }

    #[tokio::test]
    async fn create_on_basic_sku_is_rejected_before_writing() {
        let mut server = Server::new_async().await;
        let pool_path = pool_id("pool");
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Basic", json!({})))
            .create_async()
            .await;
        let put = server
            .mock("PUT", pool_path.as_str())
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resource = LbBackendAddressPoolAddressResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool_address".to_string(),
                    planned_state: planned(json!({})),
                    config: planned(json!({})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Unsupported Load Balancer SKU");
        put.assert_async().await;
    }

    #[tokio::test]
    async fn update_replaces_address_in_place() {
        let mut server = Server::new_async().await;
        let pool_path = pool_id("pool");
        let pool = |ip: &str| {
            json!({
                "id": pool_path,
                "name": "pool",
                "properties": {
                    "loadBalancerBackendAddresses": [
                        {"name": "web0", "properties": {"ipAddress": "10.0.1.3", "virtualNetwork": {"id": VNET}}},
                        {"name": "web1", "properties": {"ipAddress": ip, "virtualNetwork": {"id": VNET}}}
                    ]
                }
            })
            .to_string()
        };
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .create_async()
            .await;
        let _before = server
            .mock("GET", pool_path.as_str())
            .match_query(Matcher::Any)
            .with_body(pool("10.0.1.4"))
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", pool_path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex(
                r#"\{"name":"web0".*\},\{"name":"web1".*"ipAddress":"10\.0\.1\.9""#.to_string(),
            ))
            .with_body(pool("10.0.1.9"))
            .expect(1)
            .create_async()
            .await;
        let _after = server
            .mock("GET", pool_path.as_str())
            .match_query(Matcher::Any)
            .with_body(pool("10.0.1.9"))
            .create_async()
            .await;

        let resource = LbBackendAddressPoolAddressResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool_address".to_string(),
                    prior_state: planned(json!({"id": address_id()})),
                    planned_state: planned(json!({"id": address_id(), "ip_address": "10.0.1.9"})),
                    config: planned(json!({"ip_address": "10.0.1.9"})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            common::string(&response.new_state, "ip_address").as_deref(),
            Some("10.0.1.9")
        );
        put.assert_async().await;
    }

    #[tokio::test]
    async fn read_missing_address_removes_from_state() {
        let mut server = Server::new_async().await;
        let pool_path = pool_id("pool");
        let _pool = server
            .mock("GET", pool_path.as_str())
            .match_query(Matcher::Any)
            .with_body(json!({"name": "pool", "properties": {}}).to_string())
            .create_async()
            .await;

        let resource = LbBackendAddressPoolAddressResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool_address".to_string(),
                    current_state: test_support::value(json!({"id": address_id()})),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn delete_when_pool_is_gone() {
        let mut server = Server::new_async().await;
        let pool_path = pool_id("pool");
        let _pool = server
            .mock("GET", pool_path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let resource = LbBackendAddressPoolAddressResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool_address".to_string(),
                    prior_state: test_support::value(json!({"id": address_id()})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
    }
}
