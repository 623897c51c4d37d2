//! Load balancing rule resource implementation

use async_trait::async_trait;
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
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::defaults::StaticDefault;
use tfplug::validator::ListLengthValidator;

use super::common::{self, Mutation};
use crate::api::models::{
    LoadBalancer, LoadBalancingRule, LoadBalancingRuleProperties, SubResource,
};
use crate::api::Client;
use crate::ids::{FrontendIpConfigurationId, LoadBalancerId, LoadBalancingRuleId};
use crate::timeouts::{self, Operation};
use crate::validate;

const LABEL: &str = "Load Balancing Rule";

#[derive(Default)]
pub struct LbRuleResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rule settings taken from the planned state
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbRuleConfig {
    pub name: String,
    pub load_balancer_id: LoadBalancerId,
    pub frontend_ip_configuration_name: String,
    pub protocol: String,
    pub frontend_port: i64,
    pub backend_port: i64,
    pub backend_address_pool_ids: Vec<String>,
    pub probe_id: Option<String>,
    pub enable_floating_ip: bool,
    pub idle_timeout_in_minutes: i64,
    pub load_distribution: String,
    pub disable_outbound_snat: bool,
    pub enable_tcp_reset: Option<bool>,
}

fn rules(lb: &mut LoadBalancer) -> &mut Vec<LoadBalancingRule> {
    &mut lb.properties.load_balancing_rules
}

pub(crate) fn rules_ref(lb: &LoadBalancer) -> &Vec<LoadBalancingRule> {
    &lb.properties.load_balancing_rules
}

#[async_trait]
impl Resource for LbRuleResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_rule"
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
            .description("Manages a Load Balancer Rule")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The ID of the Load Balancer Rule")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the Load Balancer Rule")
                    .required()
                    .validator(validate::child_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("loadbalancer_id", AttributeType::String)
                    .description("The ID of the Load Balancer in which to create the Rule")
                    .required()
                    .validator(validate::load_balancer_id())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_ip_configuration_name", AttributeType::String)
                    .description("The name of the frontend IP configuration to which the rule is associated")
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
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("The transport protocol for the external endpoint: All, Tcp or Udp")
                    .required()
                    .validator(validate::one_of(&validate::TRANSPORT_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_port", AttributeType::Number)
                    .description("The port for the external endpoint, 0-65534; 0 with protocol All")
                    .required()
                    .validator(validate::between(0, 65534))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_port", AttributeType::Number)
                    .description("The port used for internal connections on the endpoint, 0-65535")
                    .required()
                    .validator(validate::between(0, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "backend_address_pool_ids",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Backend address pools the rule load balances to; two only on Gateway SKU")
                .optional()
                .validator(ListLengthValidator::between(1, 2))
                .build(),
            )
            .attribute(
                AttributeBuilder::new("probe_id", AttributeType::String)
                    .description("A reference to a Probe used by this rule")
                    .optional()
                    .validator(validate::probe_id())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_floating_ip", AttributeType::Bool)
                    .description("Whether Floating IPs are enabled for this rule")
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("idle_timeout_in_minutes", AttributeType::Number)
                    .description("TCP idle timeout in minutes, 4-100")
                    .default(StaticDefault::number(4.0))
                    .validator(validate::between(4, 100))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("load_distribution", AttributeType::String)
                    .description("Load distribution: Default, SourceIP or SourceIPProtocol")
                    .default(StaticDefault::string("Default"))
                    .validator(validate::one_of(&validate::LOAD_DISTRIBUTIONS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("disable_outbound_snat", AttributeType::Bool)
                    .description("Whether SNAT for outbound connections is disabled")
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_tcp_reset", AttributeType::Bool)
                    .description("Whether TCP reset is sent on idle timeout; not supported on Basic SKU")
                    .optional()
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
        ValidateResourceConfigResponse {
            diagnostics: check_ports(
                common::string(&request.config, "protocol").as_deref(),
                common::int(&request.config, "frontend_port"),
                common::int(&request.config, "backend_port"),
            ),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_rule(&ctx, &request).await {
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
        match self.read_rule(&ctx, &request.current_state).await {
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
        match self.update_rule(&ctx, &request).await {
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
        let diagnostics = match self.delete_rule(&ctx, &request.prior_state).await {
            Ok(()) => vec![],
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

impl LbRuleResource {
    /// Extract rule configuration from the planned state
    pub(crate) fn extract_rule_config(config: &DynamicValue) -> Result<LbRuleConfig, Diagnostic> {
        let load_balancer_id = common::required_string(config, "loadbalancer_id")?;
        let load_balancer_id = LoadBalancerId::parse(&load_balancer_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;

        Ok(LbRuleConfig {
            name: common::required_string(config, "name")?,
            load_balancer_id,
            frontend_ip_configuration_name: common::required_string(
                config,
                "frontend_ip_configuration_name",
            )?,
            protocol: common::required_string(config, "protocol")?,
            frontend_port: common::required_int(config, "frontend_port")?,
            backend_port: common::required_int(config, "backend_port")?,
            backend_address_pool_ids: common::string_list(config, "backend_address_pool_ids"),
            probe_id: common::string(config, "probe_id").filter(|id| !id.is_empty()),
            enable_floating_ip: common::boolean(config, "enable_floating_ip").unwrap_or(false),
            idle_timeout_in_minutes: common::int(config, "idle_timeout_in_minutes").unwrap_or(4),
            load_distribution: common::string(config, "load_distribution")
                .unwrap_or_else(|| "Default".to_string()),
            disable_outbound_snat: common::boolean(config, "disable_outbound_snat")
                .unwrap_or(false),
            enable_tcp_reset: common::boolean(config, "enable_tcp_reset"),
        })
    }

    fn client(&self) -> Result<&Client, Diagnostic> {
        common::client(&self.provider_data)
    }

    async fn create_rule(
        &self,
        ctx: &Context,
        request: &CreateResourceRequest,
    ) -> Result<DynamicValue, Diagnostic> {
        let client = self.client()?;
        let ctx = timeouts::operation_context(ctx, &request.planned_state, Operation::Create)?;
        let config = Self::extract_rule_config(&request.planned_state)?;
        check_config(&config)?;
        let id = LoadBalancingRuleId::new(&config.load_balancer_id, &config.name);

        common::with_deadline(&ctx, &format!("creating {}", id), async {
            common::write_child(
                &ctx,
                client,
                &config.load_balancer_id,
                &config.name,
                LABEL,
                Mutation::Create,
                rules,
                |lb| expand_rule(lb, &config),
            )
            .await?;
            read_state(client, &id, request.planned_state.clone())
                .await?
                .ok_or_else(|| gone_after_write(&id))
        })
        .await
    }

    async fn read_rule(
        &self,
        ctx: &Context,
        current_state: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = self.client()?;
        let ctx = timeouts::operation_context(ctx, current_state, Operation::Read)?;
        let id = parse_state_id(current_state)?;

        common::with_deadline(
            &ctx,
            &format!("reading {}", id),
            read_state(client, &id, current_state.clone()),
        )
        .await
    }

    async fn update_rule(
        &self,
        ctx: &Context,
        request: &UpdateResourceRequest,
    ) -> Result<DynamicValue, Diagnostic> {
        let client = self.client()?;
        let ctx = timeouts::operation_context(ctx, &request.planned_state, Operation::Update)?;
        let config = Self::extract_rule_config(&request.planned_state)?;
        check_config(&config)?;
        let id = LoadBalancingRuleId::new(&config.load_balancer_id, &config.name);

        common::with_deadline(&ctx, &format!("updating {}", id), async {
            common::write_child(
                &ctx,
                client,
                &config.load_balancer_id,
                &config.name,
                LABEL,
                Mutation::Update,
                rules,
                |lb| expand_rule(lb, &config),
            )
            .await?;
            read_state(client, &id, request.planned_state.clone())
                .await?
                .ok_or_else(|| gone_after_write(&id))
        })
        .await
    }

    async fn delete_rule(&self, ctx: &Context, prior_state: &DynamicValue) -> Result<(), Diagnostic> {
        let client = self.client()?;
        let ctx = timeouts::operation_context(ctx, prior_state, Operation::Delete)?;
        let id = parse_state_id(prior_state)?;

        common::with_deadline(
            &ctx,
            &format!("deleting {}", id),
            common::remove_child(
                &ctx,
                client,
                &id.load_balancer_id(),
                &id.name,
                LABEL,
                rules,
            ),
        )
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<LoadBalancingRuleId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    LoadBalancingRuleId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

fn gone_after_write(id: &LoadBalancingRuleId) -> Diagnostic {
    Diagnostic::error(
        "Failed to read Load Balancing Rule",
        format!("{} was not found after it was written", id),
    )
}

fn check_config(config: &LbRuleConfig) -> Result<(), Diagnostic> {
    match check_ports(
        Some(config.protocol.as_str()),
        Some(config.frontend_port),
        Some(config.backend_port),
    )
    .into_iter()
    .next()
    {
        Some(diag) => Err(diag),
        None => Ok(()),
    }
}

/// HA ports (protocol All) need both ports to be 0; other protocols need
/// real ports
fn check_ports(
    protocol: Option<&str>,
    frontend_port: Option<i64>,
    backend_port: Option<i64>,
) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Some(protocol) = protocol else {
        return diagnostics;
    };
    for (name, port) in [("frontend_port", frontend_port), ("backend_port", backend_port)] {
        let Some(port) = port else { continue };
        if protocol == "All" && port != 0 {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid {}", name),
                    format!("{} must be 0 when protocol is All (HA ports), got {}", name, port),
                )
                .with_attribute(AttributePath::new(name)),
            );
        } else if protocol != "All" && port == 0 {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid {}", name),
                    format!("{} can only be 0 when protocol is All", name),
                )
                .with_attribute(AttributePath::new(name)),
            );
        }
    }
    diagnostics
}

/// Builds the ARM rule, checking it against the parent's SKU and frontends
pub(crate) fn expand_rule(
    lb: &LoadBalancer,
    config: &LbRuleConfig,
) -> Result<LoadBalancingRule, Diagnostic> {
    let frontend_id = common::frontend_ip_configuration_id(
        lb,
        &config.load_balancer_id,
        &config.frontend_ip_configuration_name,
    )?;

    if config.enable_tcp_reset.is_some() && lb.is_basic() {
        return Err(Diagnostic::error(
            "Invalid enable_tcp_reset",
            "enable_tcp_reset is not supported on Basic SKU Load Balancers",
        )
        .with_attribute(AttributePath::new("enable_tcp_reset")));
    }
    if config.backend_address_pool_ids.len() > 1 && !lb.is_gateway() {
        return Err(Diagnostic::error(
            "Invalid backend_address_pool_ids",
            "only Gateway SKU Load Balancers support two backend address pools on a rule",
        )
        .with_attribute(AttributePath::new("backend_address_pool_ids")));
    }

    let (backend_address_pool, backend_address_pools) = match config.backend_address_pool_ids.as_slice() {
        [] => (None, None),
        [single] => (Some(SubResource::new(single.as_str())), None),
        many => (
            None,
            Some(many.iter().map(|id| SubResource::new(id.as_str())).collect()),
        ),
    };

    Ok(LoadBalancingRule {
        id: None,
        name: Some(config.name.clone()),
        properties: LoadBalancingRuleProperties {
            frontend_ip_configuration: Some(SubResource::new(frontend_id)),
            backend_address_pool,
            backend_address_pools,
            probe: config.probe_id.as_deref().map(SubResource::new),
            protocol: config.protocol.clone(),
            load_distribution: Some(config.load_distribution.clone()),
            frontend_port: Some(config.frontend_port),
            backend_port: Some(config.backend_port),
            idle_timeout_in_minutes: Some(config.idle_timeout_in_minutes),
            enable_floating_ip: Some(config.enable_floating_ip),
            enable_tcp_reset: config.enable_tcp_reset,
            disable_outbound_snat: Some(config.disable_outbound_snat),
            provisioning_state: None,
        },
    })
}

/// Name of the frontend a child references, taken from its ID
pub(crate) fn frontend_name(frontend: &Option<SubResource>) -> Option<String> {
    frontend.as_ref().map(|f| {
        FrontendIpConfigurationId::parse(&f.id)
            .map(|id| id.name)
            .unwrap_or_else(|_| f.id.rsplit('/').next().unwrap_or_default().to_string())
    })
}

/// Writes every rule attribute into `state`
pub(crate) fn flatten_rule(state: &mut DynamicValue, lb_id: &LoadBalancerId, rule: &LoadBalancingRule) {
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
    common::set_string(state, "protocol", props.protocol.clone());
    common::set_opt_int(state, "frontend_port", props.frontend_port);
    common::set_opt_int(state, "backend_port", props.backend_port);

    let mut pool_ids: Vec<String> = props
        .backend_address_pools
        .iter()
        .flatten()
        .map(|p| p.id.clone())
        .collect();
    if pool_ids.is_empty() {
        pool_ids.extend(props.backend_address_pool.iter().map(|p| p.id.clone()));
    }
    if pool_ids.is_empty() {
        let _ = state.set_null(&AttributePath::new("backend_address_pool_ids"));
    } else {
        common::set_string_list(state, "backend_address_pool_ids", pool_ids);
    }

    common::set_opt_string(state, "probe_id", props.probe.as_ref().map(|p| p.id.as_str()));
    common::set_opt_bool(
        state,
        "enable_floating_ip",
        Some(props.enable_floating_ip.unwrap_or(false)),
    );
    common::set_opt_int(
        state,
        "idle_timeout_in_minutes",
        Some(props.idle_timeout_in_minutes.unwrap_or(4)),
    );
    common::set_string(
        state,
        "load_distribution",
        props
            .load_distribution
            .clone()
            .unwrap_or_else(|| "Default".to_string()),
    );
    common::set_opt_bool(
        state,
        "disable_outbound_snat",
        Some(props.disable_outbound_snat.unwrap_or(false)),
    );
    common::set_opt_bool(state, "enable_tcp_reset", props.enable_tcp_reset);
}

async fn read_state(
    client: &Client,
    id: &LoadBalancingRuleId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let lb_id = id.load_balancer_id();
    match common::read_child(client, &lb_id, &id.name, rules_ref).await? {
        Some((_, rule)) => {
            common::set_string(&mut state, "id", id.to_string());
            flatten_rule(&mut state, &lb_id, &rule);
            Ok(Some(state))
        }
        None => {
            tracing::info!("{} was not found - removing from state", id);
            Ok(None)
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for LbRuleResource {
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
impl ResourceWithImportState for LbRuleResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        if let Err(e) = LoadBalancingRuleId::parse(&request.id) {
            response
                .diagnostics
                .push(Diagnostic::error("Invalid import ID", e.to_string()));
            return response;
        }
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./resource_lb_rule_test.rs"]
mod resource_lb_rule_test;
