//! Load balancer resource implementation
//!
//! Owns the load balancer itself: SKU, location, tags and frontend IP
//! configurations. Rules, probes, pools and NAT entries are left to their
//! own resources, so an update starts from the current remote body and only
//! replaces what this resource manages.

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
    ids_of, FrontendIpConfiguration, FrontendIpConfigurationProperties, LoadBalancer,
    LoadBalancerSku, SubResource, SKU_BASIC, SKU_STANDARD, TIER_GLOBAL, TIER_REGIONAL,
};
use crate::api::Client;
use crate::ids::LoadBalancerId;
use crate::locks;
use crate::timeouts::{self, Operation};
use crate::validate;

#[derive(Default)]
pub struct LbResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FrontendConfig {
    pub name: String,
    pub zones: Vec<String>,
    pub subnet_id: Option<String>,
    pub private_ip_address: Option<String>,
    pub private_ip_address_allocation: Option<String>,
    pub private_ip_address_version: Option<String>,
    pub public_ip_address_id: Option<String>,
    pub public_ip_prefix_id: Option<String>,
    pub gateway_load_balancer_frontend_ip_configuration_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbConfig {
    pub id: LoadBalancerId,
    pub location: String,
    pub sku: String,
    pub sku_tier: String,
    pub tags: HashMap<String, String>,
    pub frontends: Vec<FrontendConfig>,
}

fn list_of_strings() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

/// Object shape of one flattened frontend, for read-only schemas
pub(crate) fn frontend_object_type() -> AttributeType {
    let mut fields: HashMap<String, AttributeType> = [
        "name",
        "id",
        "subnet_id",
        "private_ip_address",
        "private_ip_address_allocation",
        "private_ip_address_version",
        "public_ip_address_id",
        "public_ip_prefix_id",
        "gateway_load_balancer_frontend_ip_configuration_id",
    ]
    .into_iter()
    .map(|name| (name.to_string(), AttributeType::String))
    .collect();
    for name in ["zones", "load_balancer_rules", "inbound_nat_rules", "outbound_rules"] {
        fields.insert(name.to_string(), list_of_strings());
    }
    AttributeType::Object(fields)
}

fn frontend_block() -> NestedBlock {
    NestedBlockBuilder::new("frontend_ip_configuration")
        .nesting(NestingMode::List)
        .description("Frontend IP configurations of the Load Balancer")
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .validator(validate::non_empty())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("zones", list_of_strings())
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("subnet_id", AttributeType::String)
                .optional()
                .validator(validate::non_empty())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("private_ip_address", AttributeType::String)
                .optional()
                .computed()
                .validator(validate::ip_address())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("private_ip_address_allocation", AttributeType::String)
                .description("Dynamic or Static; Static when private_ip_address is set")
                .optional()
                .computed()
                .validator(validate::one_of(&validate::ALLOCATION_METHODS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("private_ip_address_version", AttributeType::String)
                .optional()
                .computed()
                .validator(validate::one_of(&validate::IP_VERSIONS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("public_ip_address_id", AttributeType::String)
                .optional()
                .validator(validate::non_empty())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("public_ip_prefix_id", AttributeType::String)
                .optional()
                .validator(validate::non_empty())
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "gateway_load_balancer_frontend_ip_configuration_id",
                AttributeType::String,
            )
            .optional()
            .computed()
            .validator(validate::frontend_ip_configuration_id())
            .build(),
        )
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("load_balancer_rules", list_of_strings())
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("inbound_nat_rules", list_of_strings())
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("outbound_rules", list_of_strings())
                .computed()
                .build(),
        )
        .build()
}

#[async_trait]
impl Resource for LbResource {
    fn type_name(&self) -> &str {
        "azurerm_lb"
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
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an Azure Load Balancer")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(validate::child_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .required()
                    .validator(validate::non_empty())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location", AttributeType::String)
                    .required()
                    .validator(validate::non_empty())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku", AttributeType::String)
                    .description("Basic, Gateway or Standard")
                    .default(StaticDefault::string(SKU_BASIC))
                    .validator(validate::one_of(&validate::SKU_NAMES))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku_tier", AttributeType::String)
                    .description("Regional or Global")
                    .default(StaticDefault::string(TIER_REGIONAL))
                    .validator(validate::one_of(&validate::SKU_TIERS))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip_address", AttributeType::String)
                    .description("First private IP address assigned to a frontend")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip_addresses", list_of_strings())
                    .computed()
                    .build(),
            )
            .block(frontend_block())
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
        if !common::is_unknown(config, "sku") && !common::is_unknown(config, "sku_tier") {
            let sku = common::string(config, "sku").unwrap_or_else(|| SKU_BASIC.to_string());
            let tier = common::string(config, "sku_tier").unwrap_or_else(|| TIER_REGIONAL.to_string());
            if let Err(diag) = check_sku(&sku, &tier) {
                diagnostics.push(diag);
            }
        }
        for frontend in frontend_configs(config) {
            if let Err(diag) = check_frontend(&frontend) {
                diagnostics.push(diag);
            }
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
            common::with_deadline(&ctx, &format!("deleting {}", id), async {
                let _lock = locks::by_name(&id.name, locks::LOAD_BALANCER_KIND).await;
                match client.load_balancers().delete(&ctx, &id).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(common::api_error("Failed to delete Load Balancer", &id, e)),
                }
            })
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

impl LbResource {
    pub(crate) fn extract_lb_config(
        config: &DynamicValue,
        subscription_id: &str,
    ) -> Result<LbConfig, Diagnostic> {
        let name = common::required_string(config, "name")?;
        let resource_group = common::required_string(config, "resource_group_name")?;
        let tags = config
            .get_map(&AttributePath::new("tags"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| v.as_string().map(|v| (k, v.to_string())))
            .collect();

        Ok(LbConfig {
            id: LoadBalancerId::new(subscription_id, &resource_group, &name),
            location: common::required_string(config, "location")?,
            sku: common::string(config, "sku").unwrap_or_else(|| SKU_BASIC.to_string()),
            sku_tier: common::string(config, "sku_tier").unwrap_or_else(|| TIER_REGIONAL.to_string()),
            tags,
            frontends: frontend_configs(config),
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
        let subscription_id = self
            .provider_data
            .as_ref()
            .map(|data| data.subscription_id.clone())
            .unwrap_or_default();
        let (op, action) = match mutation {
            Mutation::Create => (Operation::Create, "creating"),
            Mutation::Update => (Operation::Update, "updating"),
        };
        let ctx = timeouts::operation_context(ctx, planned_state, op)?;
        let config = Self::extract_lb_config(planned_state, &subscription_id)?;
        check_sku(&config.sku, &config.sku_tier)?;
        for frontend in &config.frontends {
            check_frontend(frontend)?;
        }
        let id = config.id.clone();

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            {
                let _lock = locks::by_name(&id.name, locks::LOAD_BALANCER_KIND).await;
                let existing = common::get_load_balancer(client, &id).await?;
                let current = match (mutation, existing) {
                    (Mutation::Create, Some(_)) => {
                        return Err(Diagnostic::error(
                            "Resource already exists",
                            format!(
                                "{} already exists - to be managed via Terraform this resource needs to be imported into the State",
                                id
                            ),
                        ));
                    }
                    (Mutation::Create, None) => None,
                    (Mutation::Update, Some(lb)) => Some(lb),
                    (Mutation::Update, None) => {
                        return Err(Diagnostic::error(
                            "Load Balancer not found",
                            format!("{} was not found", id),
                        ));
                    }
                };
                let lb = expand_load_balancer(current, &config);
                tracing::info!("Writing {} with {} frontends", id, config.frontends.len());
                client
                    .load_balancers()
                    .create_or_update(&ctx, &id, &lb)
                    .await
                    .map_err(|e| common::api_error("Failed to update Load Balancer", &id, e))?;
            }
            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Load Balancer",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<LoadBalancerId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    LoadBalancerId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

fn map_string(map: &HashMap<String, Dynamic>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Dynamic::as_string)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn frontend_configs(config: &DynamicValue) -> Vec<FrontendConfig> {
    config
        .get_list(&AttributePath::new("frontend_ip_configuration"))
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            let map = item.as_map()?;
            Some(FrontendConfig {
                name: map_string(map, "name")?,
                zones: map
                    .get("zones")
                    .and_then(Dynamic::as_list)
                    .map(|zones| {
                        zones
                            .iter()
                            .filter_map(|z| z.as_string().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                subnet_id: map_string(map, "subnet_id"),
                private_ip_address: map_string(map, "private_ip_address"),
                private_ip_address_allocation: map_string(map, "private_ip_address_allocation"),
                private_ip_address_version: map_string(map, "private_ip_address_version"),
                public_ip_address_id: map_string(map, "public_ip_address_id"),
                public_ip_prefix_id: map_string(map, "public_ip_prefix_id"),
                gateway_load_balancer_frontend_ip_configuration_id: map_string(
                    map,
                    "gateway_load_balancer_frontend_ip_configuration_id",
                ),
            })
        })
        .collect()
}

pub(crate) fn check_sku(sku: &str, tier: &str) -> Result<(), Diagnostic> {
    if tier == TIER_GLOBAL && sku != SKU_STANDARD {
        return Err(Diagnostic::error(
            "Unsupported Load Balancer SKU",
            format!("the Global tier requires the Standard SKU, got {}", sku),
        )
        .with_attribute(AttributePath::new("sku_tier")));
    }
    Ok(())
}

pub(crate) fn check_frontend(frontend: &FrontendConfig) -> Result<(), Diagnostic> {
    let conflict = |detail: String| {
        Err(Diagnostic::error("Conflicting frontend_ip_configuration", detail)
            .with_attribute(AttributePath::new("frontend_ip_configuration")))
    };
    if frontend.public_ip_address_id.is_some() && frontend.public_ip_prefix_id.is_some() {
        return conflict(format!(
            "frontend {:?} cannot set both public_ip_address_id and public_ip_prefix_id",
            frontend.name
        ));
    }
    let public = frontend.public_ip_address_id.is_some() || frontend.public_ip_prefix_id.is_some();
    if public && frontend.subnet_id.is_some() {
        return conflict(format!(
            "frontend {:?} cannot combine a public IP with subnet_id",
            frontend.name
        ));
    }
    if frontend.private_ip_address.is_some() && frontend.subnet_id.is_none() {
        return conflict(format!(
            "frontend {:?} sets private_ip_address without subnet_id",
            frontend.name
        ));
    }
    Ok(())
}

fn allocation_method(frontend: &FrontendConfig) -> Option<String> {
    if frontend.subnet_id.is_none() {
        return None;
    }
    frontend.private_ip_address_allocation.clone().or_else(|| {
        Some(if frontend.private_ip_address.is_some() {
            "Static".to_string()
        } else {
            "Dynamic".to_string()
        })
    })
}

fn expand_frontend(
    lb_id: &LoadBalancerId,
    frontend: &FrontendConfig,
    current: Option<FrontendIpConfiguration>,
) -> FrontendIpConfiguration {
    let current = current.unwrap_or_default();
    let static_ip = allocation_method(frontend).as_deref() == Some("Static");
    FrontendIpConfiguration {
        id: Some(lb_id.frontend_ip_configuration(&frontend.name).to_string()),
        name: Some(frontend.name.clone()),
        zones: (!frontend.zones.is_empty()).then(|| frontend.zones.clone()),
        properties: FrontendIpConfigurationProperties {
            private_ip_address: frontend.private_ip_address.clone().filter(|_| static_ip),
            private_ip_allocation_method: allocation_method(frontend),
            private_ip_address_version: frontend.private_ip_address_version.clone(),
            subnet: frontend.subnet_id.clone().map(SubResource::new),
            public_ip_address: frontend.public_ip_address_id.clone().map(SubResource::new),
            public_ip_prefix: frontend.public_ip_prefix_id.clone().map(SubResource::new),
            gateway_load_balancer: frontend
                .gateway_load_balancer_frontend_ip_configuration_id
                .clone()
                .map(SubResource::new),
            extra: current.properties.extra,
            ..Default::default()
        },
        extra: current.extra,
    }
}

/// Applies the configured fields on top of the current body, keeping every
/// child collection managed elsewhere
pub(crate) fn expand_load_balancer(current: Option<LoadBalancer>, config: &LbConfig) -> LoadBalancer {
    let mut lb = current.unwrap_or_default();
    let mut existing = std::mem::take(&mut lb.properties.frontend_ip_configurations);
    lb.name = Some(config.id.name.clone());
    lb.location = Some(config.location.clone());
    lb.tags = Some(config.tags.clone());
    lb.sku = Some(LoadBalancerSku {
        name: Some(config.sku.clone()),
        tier: Some(config.sku_tier.clone()),
    });
    lb.properties.provisioning_state = None;
    lb.properties.frontend_ip_configurations = config
        .frontends
        .iter()
        .map(|frontend| {
            let current = existing
                .iter()
                .position(|f| f.name.as_deref() == Some(frontend.name.as_str()))
                .map(|idx| existing.swap_remove(idx));
            expand_frontend(&config.id, frontend, current)
        })
        .collect();
    lb
}

fn flatten_frontend(frontend: &FrontendIpConfiguration) -> Dynamic {
    let props = &frontend.properties;
    let string = |v: Option<&str>| v.map_or(Dynamic::Null, |s| Dynamic::String(s.to_string()));
    let ids = |v: &Option<Vec<SubResource>>| {
        Dynamic::List(ids_of(v).into_iter().map(Dynamic::String).collect())
    };
    let zones = frontend
        .zones
        .iter()
        .flatten()
        .map(|z| Dynamic::String(z.clone()))
        .collect();

    let mut entry = HashMap::new();
    entry.insert("name".to_string(), string(frontend.name.as_deref()));
    entry.insert("id".to_string(), string(frontend.id.as_deref()));
    entry.insert("zones".to_string(), Dynamic::List(zones));
    entry.insert(
        "subnet_id".to_string(),
        string(props.subnet.as_ref().map(|s| s.id.as_str())),
    );
    entry.insert(
        "private_ip_address".to_string(),
        string(props.private_ip_address.as_deref()),
    );
    entry.insert(
        "private_ip_address_allocation".to_string(),
        string(props.private_ip_allocation_method.as_deref()),
    );
    entry.insert(
        "private_ip_address_version".to_string(),
        string(props.private_ip_address_version.as_deref()),
    );
    entry.insert(
        "public_ip_address_id".to_string(),
        string(props.public_ip_address.as_ref().map(|s| s.id.as_str())),
    );
    entry.insert(
        "public_ip_prefix_id".to_string(),
        string(props.public_ip_prefix.as_ref().map(|s| s.id.as_str())),
    );
    entry.insert(
        "gateway_load_balancer_frontend_ip_configuration_id".to_string(),
        string(props.gateway_load_balancer.as_ref().map(|s| s.id.as_str())),
    );
    entry.insert("load_balancer_rules".to_string(), ids(&props.load_balancing_rules));
    entry.insert("inbound_nat_rules".to_string(), ids(&props.inbound_nat_rules));
    entry.insert("outbound_rules".to_string(), ids(&props.outbound_rules));
    Dynamic::Map(entry)
}

pub(crate) fn flatten_load_balancer(state: &mut DynamicValue, id: &LoadBalancerId, lb: &LoadBalancer) {
    common::set_string(state, "id", id.to_string());
    common::set_string(state, "name", id.name.clone());
    common::set_string(state, "resource_group_name", id.resource_group.clone());
    common::set_opt_string(state, "location", lb.location.as_deref());
    common::set_string(state, "sku", lb.sku_name().to_string());
    common::set_string(state, "sku_tier", lb.sku_tier().to_string());

    let tags = lb
        .tags
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
        .collect::<HashMap<_, _>>();
    if tags.is_empty() {
        let _ = state.set_null(&AttributePath::new("tags"));
    } else {
        let _ = state.set_map(&AttributePath::new("tags"), tags);
    }

    let frontends = &lb.properties.frontend_ip_configurations;
    let _ = state.set_list(
        &AttributePath::new("frontend_ip_configuration"),
        frontends.iter().map(flatten_frontend).collect(),
    );
    let private_ips: Vec<String> = frontends
        .iter()
        .filter_map(|f| f.properties.private_ip_address.clone())
        .filter(|ip| !ip.is_empty())
        .collect();
    common::set_opt_string(
        state,
        "private_ip_address",
        private_ips.first().map(String::as_str),
    );
    common::set_string_list(state, "private_ip_addresses", private_ips);
}

async fn read_state(
    client: &Client,
    id: &LoadBalancerId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let Some(lb) = common::get_load_balancer(client, id).await? else {
        tracing::info!("{} was not found - removing from state", id);
        return Ok(None);
    };
    flatten_load_balancer(&mut state, id, &lb);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbResource {
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
impl ResourceWithImportState for LbResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match LoadBalancerId::parse(&request.id) {
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
#[path = "./resource_lb_test.rs"]
mod resource_lb_test;
