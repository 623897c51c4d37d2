//! Inbound NAT pool resource implementation

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
use crate::api::models::{InboundNatPool, InboundNatPoolProperties, LoadBalancer, SubResource};
use crate::api::Client;
use crate::ids::{InboundNatPoolId, LoadBalancerId};
use crate::timeouts::{self, Operation};
use crate::validate;

const LABEL: &str = "Inbound NAT Pool";

#[derive(Default)]
pub struct LbNatPoolResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbNatPoolResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbNatPoolConfig {
    pub name: String,
    pub load_balancer_id: LoadBalancerId,
    pub frontend_ip_configuration_name: String,
    pub protocol: String,
    pub frontend_port_start: i64,
    pub frontend_port_end: i64,
    pub backend_port: i64,
    pub idle_timeout_in_minutes: i64,
    pub floating_ip_enabled: bool,
    pub tcp_reset_enabled: bool,
}

fn nat_pools(lb: &mut LoadBalancer) -> &mut Vec<InboundNatPool> {
    &mut lb.properties.inbound_nat_pools
}

fn nat_pools_ref(lb: &LoadBalancer) -> &Vec<InboundNatPool> {
    &lb.properties.inbound_nat_pools
}

#[async_trait]
impl Resource for LbNatPoolResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_nat_pool"
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
            .description("Manages a Load Balancer inbound NAT pool")
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
                AttributeBuilder::new("protocol", AttributeType::String)
                    .required()
                    .validator(validate::one_of(&validate::TRANSPORT_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_port_start", AttributeType::Number)
                    .description("First port of the external port range, 1-65534")
                    .required()
                    .validator(validate::between(1, 65534))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("frontend_port_end", AttributeType::Number)
                    .description("Last port of the external port range, 1-65534")
                    .required()
                    .validator(validate::between(1, 65534))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_port", AttributeType::Number)
                    .required()
                    .validator(validate::between(1, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("idle_timeout_in_minutes", AttributeType::Number)
                    .default(StaticDefault::number(4.0))
                    .validator(validate::between(4, 30))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("floating_ip_enabled", AttributeType::Bool)
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tcp_reset_enabled", AttributeType::Bool)
                    .description("Not supported on Basic SKU Load Balancers")
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
        let start = common::int(&request.config, "frontend_port_start");
        let end = common::int(&request.config, "frontend_port_end");
        let diagnostics = match (start, end) {
            (Some(start), Some(end)) => check_port_range(start, end).err().into_iter().collect(),
            _ => vec![],
        };
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
                    nat_pools,
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

impl LbNatPoolResource {
    pub(crate) fn extract_nat_pool_config(
        config: &DynamicValue,
    ) -> Result<LbNatPoolConfig, Diagnostic> {
        let load_balancer_id = common::required_string(config, "loadbalancer_id")?;
        let load_balancer_id = LoadBalancerId::parse(&load_balancer_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;

        Ok(LbNatPoolConfig {
            name: common::required_string(config, "name")?,
            load_balancer_id,
            frontend_ip_configuration_name: common::required_string(
                config,
                "frontend_ip_configuration_name",
            )?,
            protocol: common::required_string(config, "protocol")?,
            frontend_port_start: common::required_int(config, "frontend_port_start")?,
            frontend_port_end: common::required_int(config, "frontend_port_end")?,
            backend_port: common::required_int(config, "backend_port")?,
            idle_timeout_in_minutes: common::int(config, "idle_timeout_in_minutes").unwrap_or(4),
            floating_ip_enabled: common::boolean(config, "floating_ip_enabled").unwrap_or(false),
            tcp_reset_enabled: common::boolean(config, "tcp_reset_enabled").unwrap_or(false),
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
        let config = Self::extract_nat_pool_config(planned_state)?;
        check_port_range(config.frontend_port_start, config.frontend_port_end)?;
        let id = InboundNatPoolId::new(&config.load_balancer_id, &config.name);

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            common::write_child(
                &ctx,
                client,
                &config.load_balancer_id,
                &config.name,
                LABEL,
                mutation,
                nat_pools,
                |lb| expand_nat_pool(lb, &config),
            )
            .await?;
            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Inbound NAT Pool",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<InboundNatPoolId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    InboundNatPoolId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

fn check_port_range(start: i64, end: i64) -> Result<(), Diagnostic> {
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
    Ok(())
}

fn expand_nat_pool(
    lb: &LoadBalancer,
    config: &LbNatPoolConfig,
) -> Result<InboundNatPool, Diagnostic> {
    let frontend_id = common::frontend_ip_configuration_id(
        lb,
        &config.load_balancer_id,
        &config.frontend_ip_configuration_name,
    )?;
    if config.tcp_reset_enabled && lb.is_basic() {
        return Err(Diagnostic::error(
            "Invalid tcp_reset_enabled",
            "tcp_reset_enabled is not supported on Basic SKU Load Balancers",
        )
        .with_attribute(AttributePath::new("tcp_reset_enabled")));
    }

    Ok(InboundNatPool {
        id: None,
        name: Some(config.name.clone()),
        properties: InboundNatPoolProperties {
            frontend_ip_configuration: Some(SubResource::new(frontend_id)),
            protocol: config.protocol.clone(),
            frontend_port_range_start: config.frontend_port_start,
            frontend_port_range_end: config.frontend_port_end,
            backend_port: config.backend_port,
            idle_timeout_in_minutes: Some(config.idle_timeout_in_minutes),
            enable_floating_ip: Some(config.floating_ip_enabled),
            enable_tcp_reset: (!lb.is_basic()).then_some(config.tcp_reset_enabled),
            provisioning_state: None,
        },
    })
}

fn flatten_nat_pool(state: &mut DynamicValue, lb_id: &LoadBalancerId, pool: &InboundNatPool) {
    let props = &pool.properties;
    common::set_opt_string(state, "name", pool.name.as_deref());
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
    common::set_opt_int(state, "frontend_port_start", Some(props.frontend_port_range_start));
    common::set_opt_int(state, "frontend_port_end", Some(props.frontend_port_range_end));
    common::set_opt_int(state, "backend_port", Some(props.backend_port));
    common::set_opt_int(
        state,
        "idle_timeout_in_minutes",
        Some(props.idle_timeout_in_minutes.unwrap_or(4)),
    );
    common::set_opt_bool(
        state,
        "floating_ip_enabled",
        Some(props.enable_floating_ip.unwrap_or(false)),
    );
    common::set_opt_bool(
        state,
        "tcp_reset_enabled",
        Some(props.enable_tcp_reset.unwrap_or(false)),
    );
}

async fn read_state(
    client: &Client,
    id: &InboundNatPoolId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let lb_id = id.load_balancer_id();
    let Some((_, pool)) = common::read_child(client, &lb_id, &id.name, nat_pools_ref).await?
    else {
        tracing::info!("{} was not found - removing from state", id);
        return Ok(None);
    };
    common::set_string(&mut state, "id", id.to_string());
    flatten_nat_pool(&mut state, &lb_id, &pool);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbNatPoolResource {
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
impl ResourceWithImportState for LbNatPoolResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match InboundNatPoolId::parse(&request.id) {
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
