//! Inbound NAT rule resource implementation
//!
//! A NAT rule either maps a single frontend port to one backend IP
//! configuration, or a frontend port range onto a backend address pool.

use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use super::common::{self, Mutation};
use super::resource_lb_rule::frontend_name;
use crate::api::models::{InboundNatRule, InboundNatRuleProperties, LoadBalancer, SubResource};
use crate::api::Client;
use crate::ids::{InboundNatRuleId, LoadBalancerId};
use crate::timeouts::{self, Operation};
use crate::validate;

const LABEL: &str = "Inbound NAT Rule";

#[derive(Default)]
pub struct LbNatRuleResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbNatRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Which frontend shape a NAT rule uses
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrontendPorts {
    Single(i64),
    Range {
        start: i64,
        end: i64,
        backend_address_pool_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbNatRuleConfig {
    pub name: String,
    pub load_balancer_id: LoadBalancerId,
    pub frontend_ip_configuration_name: String,
    pub protocol: String,
    pub backend_port: i64,
    pub ports: FrontendPorts,
    pub idle_timeout_in_minutes: i64,
    pub enable_floating_ip: bool,
    pub enable_tcp_reset: bool,
}

fn nat_rules(lb: &mut LoadBalancer) -> &mut Vec<InboundNatRule> {
    &mut lb.properties.inbound_nat_rules
}

fn nat_rules_ref(lb: &LoadBalancer) -> &Vec<InboundNatRule> {
    &lb.properties.inbound_nat_rules
}

#[async_trait]
impl Resource for LbNatRuleResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_nat_rule"
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
            .description("Manages a Load Balancer inbound NAT rule")
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
                AttributeBuilder::new("loadbalancer_id", AttributeType::String)
                    .required()
                    .validator(validate::load_balancer_id())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_ip_configuration_name", AttributeType::String)
                    .required()
                    .validator(validate::non_empty())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_ip_configuration_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_ip_configuration_id", AttributeType::String)
                    .description("ID of the network interface IP configuration the rule forwards to")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .required()
                    .validator(validate::one_of(&validate::TRANSPORT_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_port", AttributeType::Number)
                    .required()
                    .validator(validate::between(1, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_port", AttributeType::Number)
                    .description("Single external port; conflicts with the port range form")
                    .optional()
                    .validator(validate::between(1, 65534))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_port_start", AttributeType::Number)
                    .optional()
                    .validator(validate::between(1, 65534))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_port_end", AttributeType::Number)
                    .optional()
                    .validator(validate::between(1, 65534))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_address_pool_id", AttributeType::String)
                    .description("Backend pool the port range maps onto")
                    .optional()
                    .validator(validate::backend_address_pool_id())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("idle_timeout_in_minutes", AttributeType::Number)
                    .default(StaticDefault::number(4.0))
                    .validator(validate::between(4, 30))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_floating_ip", AttributeType::Bool)
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_tcp_reset", AttributeType::Bool)
                    .default(StaticDefault::bool(false))
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
        let port_fields = [
            "frontend_port",
            "frontend_port_start",
            "frontend_port_end",
            "backend_address_pool_id",
        ];
        let mut diagnostics = vec![];
        if !port_fields.iter().any(|f| common::is_unknown(config, f)) {
            if let Err(diag) = frontend_ports(config) {
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
            common::with_deadline(
                &ctx,
                &format!("deleting {}", id),
                common::remove_child(
                    &ctx,
                    client,
                    &id.load_balancer_id(),
                    &id.name,
                    LABEL,
                    nat_rules,
                ),
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

impl LbNatRuleResource {
    pub(crate) fn extract_nat_rule_config(
        config: &DynamicValue,
    ) -> Result<LbNatRuleConfig, Diagnostic> {
        let load_balancer_id = common::required_string(config, "loadbalancer_id")?;
        let load_balancer_id = LoadBalancerId::parse(&load_balancer_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;

        Ok(LbNatRuleConfig {
            name: common::required_string(config, "name")?,
            load_balancer_id,
            frontend_ip_configuration_name: common::required_string(
                config,
                "frontend_ip_configuration_name",
            )?,
            protocol: common::required_string(config, "protocol")?,
            backend_port: common::required_int(config, "backend_port")?,
            ports: frontend_ports(config)?,
            idle_timeout_in_minutes: common::int(config, "idle_timeout_in_minutes").unwrap_or(4),
            enable_floating_ip: common::boolean(config, "enable_floating_ip").unwrap_or(false),
            enable_tcp_reset: common::boolean(config, "enable_tcp_reset").unwrap_or(false),
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
        let config = Self::extract_nat_rule_config(planned_state)?;
        let id = InboundNatRuleId::new(&config.load_balancer_id, &config.name);

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            common::write_child(
                &ctx,
                client,
                &config.load_balancer_id,
                &config.name,
                LABEL,
                mutation,
                nat_rules,
                |lb| expand_nat_rule(lb, &config),
            )
            .await?;
            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Inbound NAT Rule",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<InboundNatRuleId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    InboundNatRuleId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

/// Works out the frontend form from the port attributes; exactly one of
/// `frontend_port` or the full range triple must be given
pub(crate) fn frontend_ports(config: &DynamicValue) -> Result<FrontendPorts, Diagnostic> {
    let single = common::int(config, "frontend_port");
    let start = common::int(config, "frontend_port_start");
    let end = common::int(config, "frontend_port_end");
    let pool = common::string(config, "backend_address_pool_id").filter(|id| !id.is_empty());

    match (single, start, end, pool) {
        (Some(port), None, None, None) => Ok(FrontendPorts::Single(port)),
        (None, Some(start), Some(end), Some(backend_address_pool_id)) => {
            if start > end {
                return Err(Diagnostic::error(
                    "Invalid frontend port range",
                    format!(
                        "frontend_port_start ({}) must be less than or equal to frontend_port_end ({})",
                        start, end
                    ),
                )
                .with_attribute(AttributePath::new("frontend_port_start")));
            }
            Ok(FrontendPorts::Range {
                start,
                end,
                backend_address_pool_id,
            })
        }
        (Some(_), _, _, _) => Err(Diagnostic::error(
            "Conflicting frontend ports",
            "frontend_port cannot be combined with frontend_port_start, frontend_port_end or backend_address_pool_id",
        )
        .with_attribute(AttributePath::new("frontend_port"))),
        _ => Err(Diagnostic::error(
            "Missing frontend ports",
            "either frontend_port, or frontend_port_start, frontend_port_end and backend_address_pool_id together, must be set",
        )),
    }
}

fn expand_nat_rule(
    lb: &LoadBalancer,
    config: &LbNatRuleConfig,
) -> Result<InboundNatRule, Diagnostic> {
    let frontend_id = common::frontend_ip_configuration_id(
        lb,
        &config.load_balancer_id,
        &config.frontend_ip_configuration_name,
    )?;

    let mut properties = InboundNatRuleProperties {
        frontend_ip_configuration: Some(SubResource::new(frontend_id)),
        protocol: config.protocol.clone(),
        backend_port: Some(config.backend_port),
        idle_timeout_in_minutes: Some(config.idle_timeout_in_minutes),
        enable_floating_ip: Some(config.enable_floating_ip),
        enable_tcp_reset: Some(config.enable_tcp_reset),
        ..Default::default()
    };
    match &config.ports {
        FrontendPorts::Single(port) => properties.frontend_port = Some(*port),
        FrontendPorts::Range {
            start,
            end,
            backend_address_pool_id,
        } => {
            properties.frontend_port_range_start = Some(*start);
            properties.frontend_port_range_end = Some(*end);
            properties.backend_address_pool = Some(SubResource::new(backend_address_pool_id.as_str()));
        }
    }

    Ok(InboundNatRule {
        id: None,
        name: Some(config.name.clone()),
        properties,
    })
}

fn flatten_nat_rule(state: &mut DynamicValue, lb_id: &LoadBalancerId, rule: &InboundNatRule) {
    let props = &rule.properties;
    common::set_opt_string(state, "name", rule.name.as_deref());
    common::set_string(state, "loadbalancer_id", lb_id.to_string());
    common::set_opt_string(
        state,
        "frontend_ip_configuration_name",
        frontend_name(&props.frontend_ip_configuration).as_deref(),
    );
    common::set_opt_string(
        state,
        "frontend_ip_configuration_id",
        props.frontend_ip_configuration.as_ref().map(|f| f.id.as_str()),
    );
    common::set_opt_string(
        state,
        "backend_ip_configuration_id",
        props.backend_ip_configuration.as_ref().map(|c| c.id.as_str()),
    );
    common::set_string(state, "protocol", props.protocol.clone());
    common::set_opt_int(state, "backend_port", props.backend_port);

    // ARM reports frontendPort 0 for range rules
    let is_range = props.frontend_port_range_start.is_some();
    common::set_opt_int(
        state,
        "frontend_port",
        props.frontend_port.filter(|_| !is_range),
    );
    common::set_opt_int(state, "frontend_port_start", props.frontend_port_range_start);
    common::set_opt_int(state, "frontend_port_end", props.frontend_port_range_end);
    common::set_opt_string(
        state,
        "backend_address_pool_id",
        props.backend_address_pool.as_ref().map(|p| p.id.as_str()),
    );
    common::set_opt_int(
        state,
        "idle_timeout_in_minutes",
        Some(props.idle_timeout_in_minutes.unwrap_or(4)),
    );
    common::set_opt_bool(
        state,
        "enable_floating_ip",
        Some(props.enable_floating_ip.unwrap_or(false)),
    );
    common::set_opt_bool(
        state,
        "enable_tcp_reset",
        Some(props.enable_tcp_reset.unwrap_or(false)),
    );
}

async fn read_state(
    client: &Client,
    id: &InboundNatRuleId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let lb_id = id.load_balancer_id();
    let Some((_, rule)) = common::read_child(client, &lb_id, &id.name, nat_rules_ref).await?
    else {
        tracing::info!("{} was not found - removing from state", id);
        return Ok(None);
    };
    common::set_string(&mut state, "id", id.to_string());
    flatten_nat_rule(&mut state, &lb_id, &rule);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbNatRuleResource {
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
impl ResourceWithImportState for LbNatRuleResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match InboundNatRuleId::parse(&request.id) {
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
#[path = "./resource_lb_nat_rule_test.rs"]
mod resource_lb_nat_rule_test;
