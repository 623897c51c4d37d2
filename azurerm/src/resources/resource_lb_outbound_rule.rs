//! Outbound rule resource implementation

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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use super::common::{self, Mutation};
use crate::api::models::{LoadBalancer, OutboundRule, OutboundRuleProperties, SubResource};
use crate::api::Client;
use crate::ids::{FrontendIpConfigurationId, LoadBalancerId, OutboundRuleId};
use crate::timeouts::{self, Operation};
use crate::validate;

const LABEL: &str = "Outbound Rule";

#[derive(Default)]
pub struct LbOutboundRuleResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbOutboundRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbOutboundRuleConfig {
    pub name: String,
    pub load_balancer_id: LoadBalancerId,
    pub frontend_names: Vec<String>,
    pub backend_address_pool_id: String,
    pub protocol: String,
    pub enable_tcp_reset: bool,
    pub allocated_outbound_ports: i64,
    pub idle_timeout_in_minutes: i64,
}

fn outbound_rules(lb: &mut LoadBalancer) -> &mut Vec<OutboundRule> {
    &mut lb.properties.outbound_rules
}

pub(crate) fn outbound_rules_ref(lb: &LoadBalancer) -> &Vec<OutboundRule> {
    &lb.properties.outbound_rules
}

#[async_trait]
impl Resource for LbOutboundRuleResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_outbound_rule"
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
            .description("Manages a Load Balancer outbound rule; not available on Basic SKU")
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
                AttributeBuilder::new("backend_address_pool_id", AttributeType::String)
                    .required()
                    .validator(validate::backend_address_pool_id())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .required()
                    .validator(validate::one_of(&validate::TRANSPORT_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_tcp_reset", AttributeType::Bool)
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("allocated_outbound_ports", AttributeType::Number)
                    .description("SNAT ports allocated per backend instance, 0-64000")
                    .default(StaticDefault::number(1024.0))
                    .validator(validate::between(0, 64000))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("idle_timeout_in_minutes", AttributeType::Number)
                    .default(StaticDefault::number(4.0))
                    .validator(validate::between(4, 120))
                    .build(),
            )
            .block(frontend_ip_configuration_block())
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
            common::with_deadline(
                &ctx,
                &format!("deleting {}", id),
                common::remove_child(
                    &ctx,
                    client,
                    &id.load_balancer_id(),
                    &id.name,
                    LABEL,
                    outbound_rules,
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

pub(crate) fn frontend_ip_configuration_block() -> tfplug::schema::NestedBlock {
    NestedBlockBuilder::new("frontend_ip_configuration")
        .nesting(NestingMode::List)
        .min_items(1)
        .description("Frontend IP configurations used for outbound traffic")
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .validator(validate::non_empty())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .build(),
        )
        .build()
}

impl LbOutboundRuleResource {
    pub(crate) fn extract_outbound_rule_config(
        config: &DynamicValue,
    ) -> Result<LbOutboundRuleConfig, Diagnostic> {
        let load_balancer_id = common::required_string(config, "loadbalancer_id")?;
        let load_balancer_id = LoadBalancerId::parse(&load_balancer_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;

        let frontend_names: Vec<String> = config
            .get_list(&AttributePath::new("frontend_ip_configuration"))
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.as_map()?.get("name")?.as_string().map(str::to_string))
            .collect();
        if frontend_names.is_empty() {
            return Err(Diagnostic::error(
                "Missing frontend_ip_configuration",
                "at least one frontend_ip_configuration block is required",
            )
            .with_attribute(AttributePath::new("frontend_ip_configuration")));
        }

        Ok(LbOutboundRuleConfig {
            name: common::required_string(config, "name")?,
            load_balancer_id,
            frontend_names,
            backend_address_pool_id: common::required_string(config, "backend_address_pool_id")?,
            protocol: common::required_string(config, "protocol")?,
            enable_tcp_reset: common::boolean(config, "enable_tcp_reset").unwrap_or(false),
            allocated_outbound_ports: common::int(config, "allocated_outbound_ports")
                .unwrap_or(1024),
            idle_timeout_in_minutes: common::int(config, "idle_timeout_in_minutes").unwrap_or(4),
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
        let config = Self::extract_outbound_rule_config(planned_state)?;
        let id = OutboundRuleId::new(&config.load_balancer_id, &config.name);

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            common::write_child(
                &ctx,
                client,
                &config.load_balancer_id,
                &config.name,
                LABEL,
                mutation,
                outbound_rules,
                |lb| expand_outbound_rule(lb, &config),
            )
            .await?;
            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Outbound Rule",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<OutboundRuleId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    OutboundRuleId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

fn expand_outbound_rule(
    lb: &LoadBalancer,
    config: &LbOutboundRuleConfig,
) -> Result<OutboundRule, Diagnostic> {
    if lb.is_basic() {
        return Err(Diagnostic::error(
            "Unsupported Load Balancer SKU",
            format!(
                "Outbound Rules are not supported on Basic SKU Load Balancers ({})",
                config.load_balancer_id
            ),
        ));
    }

    let frontend_ip_configurations = config
        .frontend_names
        .iter()
        .map(|name| {
            common::frontend_ip_configuration_id(lb, &config.load_balancer_id, name)
                .map(SubResource::new)
                .map_err(|diag| diag.with_attribute(AttributePath::new("frontend_ip_configuration")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OutboundRule {
        id: None,
        name: Some(config.name.clone()),
        properties: OutboundRuleProperties {
            allocated_outbound_ports: Some(config.allocated_outbound_ports),
            frontend_ip_configurations,
            backend_address_pool: SubResource::new(config.backend_address_pool_id.as_str()),
            protocol: config.protocol.clone(),
            enable_tcp_reset: Some(config.enable_tcp_reset),
            idle_timeout_in_minutes: Some(config.idle_timeout_in_minutes),
            provisioning_state: None,
        },
    })
}

pub(crate) fn flatten_outbound_rule(
    state: &mut DynamicValue,
    lb_id: &LoadBalancerId,
    rule: &OutboundRule,
) {
    let props = &rule.properties;
    common::set_opt_string(state, "name", rule.name.as_deref());
    common::set_string(state, "loadbalancer_id", lb_id.to_string());
    common::set_string(state, "backend_address_pool_id", props.backend_address_pool.id.clone());
    common::set_string(state, "protocol", props.protocol.clone());
    common::set_opt_bool(
        state,
        "enable_tcp_reset",
        Some(props.enable_tcp_reset.unwrap_or(false)),
    );
    common::set_opt_int(
        state,
        "allocated_outbound_ports",
        Some(props.allocated_outbound_ports.unwrap_or(1024)),
    );
    common::set_opt_int(
        state,
        "idle_timeout_in_minutes",
        Some(props.idle_timeout_in_minutes.unwrap_or(4)),
    );

    let frontends = props
        .frontend_ip_configurations
        .iter()
        .map(|frontend| {
            let name = FrontendIpConfigurationId::parse(&frontend.id)
                .map(|id| id.name)
                .unwrap_or_default();
            let mut entry = HashMap::new();
            entry.insert("name".to_string(), Dynamic::String(name));
            entry.insert("id".to_string(), Dynamic::String(frontend.id.clone()));
            Dynamic::Map(entry)
        })
        .collect();
    let _ = state.set_list(&AttributePath::new("frontend_ip_configuration"), frontends);
}

async fn read_state(
    client: &Client,
    id: &OutboundRuleId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let lb_id = id.load_balancer_id();
    let Some((_, rule)) = common::read_child(client, &lb_id, &id.name, outbound_rules_ref).await?
    else {
        tracing::info!("{} was not found - removing from state", id);
        return Ok(None);
    };
    common::set_string(&mut state, "id", id.to_string());
    flatten_outbound_rule(&mut state, &lb_id, &rule);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbOutboundRuleResource {
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
impl ResourceWithImportState for LbOutboundRuleResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match OutboundRuleId::parse(&request.id) {
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
    use crate::resources::test_support::{self, frontend_id, pool_id, LB_ID};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn planned(frontends: &[&str]) -> DynamicValue {
        test_support::value(planned_json(frontends))
    }

    fn planned_json(frontends: &[&str]) -> serde_json::Value {
        json!({
            "id": null,
            "name": "egress",
            "loadbalancer_id": LB_ID,
            "backend_address_pool_id": pool_id("pool"),
            "protocol": "All",
            "enable_tcp_reset": false,
            "allocated_outbound_ports": 1024,
            "idle_timeout_in_minutes": 4,
            "frontend_ip_configuration": frontends
                .iter()
                .map(|name| json!({"name": name, "id": null}))
                .collect::<Vec<_>>(),
            "timeouts": null
        })
    }

    fn rule_id(name: &str) -> String {
        format!("{}/outboundRules/{}", LB_ID, name)
    }

    fn stored_rule(name: &str, ports: i64) -> serde_json::Value {
        json!({
            "id": rule_id(name),
            "name": name,
            "properties": {
                "allocatedOutboundPorts": ports,
                "frontendIPConfigurations": [{"id": frontend_id("fe")}],
                "backendAddressPool": {"id": pool_id("pool")},
                "protocol": "All",
                "enableTcpReset": false,
                "idleTimeoutInMinutes": 4
            }
        })
    }

    fn configured(url: &str) -> LbOutboundRuleResource {
        LbOutboundRuleResource {
            provider_data: Some(test_support::provider_data(url)),
        }
    }

    #[test]
    fn schema_requires_a_frontend_block() {
        let block = frontend_ip_configuration_block();
        assert_eq!(block.nesting, NestingMode::List);
        assert_eq!(block.min_items, 1);
        assert!(block.block.attribute("id").is_some_and(|a| a.computed));
    }

    #[test]
    fn expand_checks_sku_and_frontends() {
        let config = LbOutboundRuleResource::extract_outbound_rule_config(&planned(&["fe"])).unwrap();
        let basic: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Basic", json!({}))).unwrap();
        assert_eq!(
            expand_outbound_rule(&basic, &config).unwrap_err().summary,
            "Unsupported Load Balancer SKU"
        );

        let standard: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Standard", json!({}))).unwrap();
        let rule = expand_outbound_rule(&standard, &config).unwrap();
        assert_eq!(
            rule.properties.frontend_ip_configurations,
            vec![SubResource::new(frontend_id("fe"))]
        );

        let missing =
            LbOutboundRuleResource::extract_outbound_rule_config(&planned(&["fe", "nope"])).unwrap();
        assert_eq!(
            expand_outbound_rule(&standard, &missing).unwrap_err().summary,
            "Frontend IP Configuration not found"
        );
    }

    #[test]
    fn extract_requires_frontends() {
        let err = LbOutboundRuleResource::extract_outbound_rule_config(&planned(&[])).unwrap_err();
        assert_eq!(err.summary, "Missing frontend_ip_configuration");
    }

    #[tokio::test]
    async fn create_fills_frontend_ids() {
        let mut server = Server::new_async().await;
        let stored = test_support::load_balancer(
            "Standard",
            json!({"outboundRules": [{
                "id": format!("{}/outboundRules/egress", LB_ID),
                "name": "egress",
                "properties": {
                    "allocatedOutboundPorts": 1024,
                    "frontendIPConfigurations": [{"id": frontend_id("fe")}],
                    "backendAddressPool": {"id": pool_id("pool")},
                    "protocol": "All",
                    "enableTcpReset": false,
                    "idleTimeoutInMinutes": 4
                }
            }]}),
        );
        let _get_before = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .expect(1)
            .create_async()
            .await;
        let _put = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .with_body(&stored)
            .create_async()
            .await;
        let _get_after = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(&stored)
            .create_async()
            .await;

        let resource = LbOutboundRuleResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "azurerm_lb_outbound_rule".to_string(),
                    planned_state: planned(&["fe"]),
                    config: planned(&["fe"]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let frontends = response
            .new_state
            .get_list(&AttributePath::new("frontend_ip_configuration"))
            .unwrap();
        let entry = frontends[0].as_map().unwrap();
        assert_eq!(entry["name"], Dynamic::String("fe".to_string()));
        assert_eq!(entry["id"], Dynamic::String(frontend_id("fe")));
    }

    #[tokio::test]
    async fn read_flattens_rule_and_drops_missing_one() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer(
                "Standard",
                json!({"outboundRules": [stored_rule("egress", 2048)]}),
            ))
            .create_async()
            .await;
        let read = |name: &str| ReadResourceRequest {
            type_name: "azurerm_lb_outbound_rule".to_string(),
            current_state: test_support::value(json!({"id": rule_id(name)})),
            private: vec![],
            provider_meta: None,
            client_capabilities: Default::default(),
        };
        let resource = configured(&server.url());

        let response = resource.read(Context::new(), read("egress")).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.unwrap();
        assert_eq!(common::int(&state, "allocated_outbound_ports"), Some(2048));
        assert_eq!(
            common::string(&state, "backend_address_pool_id"),
            Some(pool_id("pool"))
        );

        let response = resource.read(Context::new(), read("other")).await;
        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn update_replaces_rule_in_place() {
        let mut server = Server::new_async().await;
        let before = test_support::load_balancer(
            "Standard",
            json!({"outboundRules": [stored_rule("egress", 1024), stored_rule("backup", 512)]}),
        );
        let after = test_support::load_balancer(
            "Standard",
            json!({"outboundRules": [stored_rule("egress", 2048), stored_rule("backup", 512)]}),
        );
        let _get_before = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(&before)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex(
                r#""outboundRules":\[\{"name":"egress","properties":\{"allocatedOutboundPorts":2048.*\},\{"id":"[^"]*/outboundRules/backup""#
                    .to_string(),
            ))
            .with_body(&after)
            .expect(1)
            .create_async()
            .await;
        let _get_after = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(&after)
            .create_async()
            .await;

        let mut state = planned_json(&["fe"]);
        state["id"] = json!(rule_id("egress"));
        let mut planned_state = state.clone();
        planned_state["allocated_outbound_ports"] = json!(2048);
        let response = configured(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "azurerm_lb_outbound_rule".to_string(),
                    prior_state: test_support::value(state),
                    planned_state: test_support::value(planned_state.clone()),
                    config: test_support::value(planned_state),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            common::int(&response.new_state, "allocated_outbound_ports"),
            Some(2048)
        );
        put.assert_async().await;
    }

    #[tokio::test]
    async fn delete_removes_rule_and_skips_missing_one() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer(
                "Standard",
                json!({"outboundRules": [stored_rule("egress", 1024), stored_rule("backup", 512)]}),
            ))
            .create_async()
            .await;
        let put = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex(
                r#""outboundRules":\[\{"id":"[^"]*/outboundRules/backup","name":"backup","properties":\{([^{}\[\]]|\{[^{}]*\}|\[[^\[\]]*\])*\}\}\]"#
                    .to_string(),
            ))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let delete = |name: &str| DeleteResourceRequest {
            type_name: "azurerm_lb_outbound_rule".to_string(),
            prior_state: test_support::value(json!({"id": rule_id(name)})),
            planned_private: vec![],
            provider_meta: None,
        };
        let resource = configured(&server.url());

        let response = resource.delete(Context::new(), delete("egress")).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

        let response = resource.delete(Context::new(), delete("gone")).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

        put.assert_async().await;
    }
}
