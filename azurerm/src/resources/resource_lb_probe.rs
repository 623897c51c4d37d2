//! Load balancer health probe resource implementation

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
use crate::api::models::{ids_of, LoadBalancer, Probe, ProbeProperties};
use crate::api::Client;
use crate::ids::{LoadBalancerId, ProbeId};
use crate::timeouts::{self, Operation};
use crate::validate;

const LABEL: &str = "Probe";

#[derive(Default)]
pub struct LbProbeResource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbProbeResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LbProbeConfig {
    pub name: String,
    pub load_balancer_id: LoadBalancerId,
    pub protocol: String,
    pub port: i64,
    pub request_path: Option<String>,
    pub interval_in_seconds: i64,
    pub number_of_probes: i64,
    pub probe_threshold: i64,
}

fn probes(lb: &mut LoadBalancer) -> &mut Vec<Probe> {
    &mut lb.properties.probes
}

fn probes_ref(lb: &LoadBalancer) -> &Vec<Probe> {
    &lb.properties.probes
}

#[async_trait]
impl Resource for LbProbeResource {
    fn type_name(&self) -> &str {
        "azurerm_lb_probe"
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
            .description("Manages a Load Balancer health probe")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the Probe")
                    .required()
                    .validator(validate::child_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("loadbalancer_id", AttributeType::String)
                    .description("The ID of the Load Balancer in which to create the Probe")
                    .required()
                    .validator(validate::load_balancer_id())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("Protocol of the probe: Http, Https or Tcp")
                    .default(StaticDefault::string("Tcp"))
                    .validator(validate::one_of(&validate::PROBE_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port", AttributeType::Number)
                    .description("Port on which the probe queries the backend endpoint")
                    .required()
                    .validator(validate::between(1, 65535))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("request_path", AttributeType::String)
                    .description("URI used for requesting health status; required for Http and Https")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("interval_in_seconds", AttributeType::Number)
                    .description("Interval between probes in seconds, at least 5")
                    .default(StaticDefault::number(15.0))
                    .validator(validate::at_least(5))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("number_of_probes", AttributeType::Number)
                    .description("Failed probes before the endpoint is removed from rotation")
                    .default(StaticDefault::number(2.0))
                    .validator(validate::at_least(1))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("probe_threshold", AttributeType::Number)
                    .description("Consecutive successful or failed probes needed to change status, 1-100")
                    .default(StaticDefault::number(1.0))
                    .validator(validate::between(1, 100))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "load_balancer_rules",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("IDs of the Load Balancing Rules using this probe")
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
        if !common::is_unknown(config, "protocol") && !common::is_unknown(config, "request_path") {
            let protocol = common::string(config, "protocol").unwrap_or_else(|| "Tcp".to_string());
            let request_path = common::string(config, "request_path");
            if let Err(diag) = check_request_path(&protocol, request_path.as_deref()) {
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
                common::remove_child(&ctx, client, &id.load_balancer_id(), &id.name, LABEL, probes),
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

impl LbProbeResource {
    pub(crate) fn extract_probe_config(config: &DynamicValue) -> Result<LbProbeConfig, Diagnostic> {
        let load_balancer_id = common::required_string(config, "loadbalancer_id")?;
        let load_balancer_id = LoadBalancerId::parse(&load_balancer_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;

        Ok(LbProbeConfig {
            name: common::required_string(config, "name")?,
            load_balancer_id,
            protocol: common::string(config, "protocol").unwrap_or_else(|| "Tcp".to_string()),
            port: common::required_int(config, "port")?,
            request_path: common::string(config, "request_path").filter(|p| !p.is_empty()),
            interval_in_seconds: common::int(config, "interval_in_seconds").unwrap_or(15),
            number_of_probes: common::int(config, "number_of_probes").unwrap_or(2),
            probe_threshold: common::int(config, "probe_threshold").unwrap_or(1),
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
        let config = Self::extract_probe_config(planned_state)?;
        check_request_path(&config.protocol, config.request_path.as_deref())?;
        let id = ProbeId::new(&config.load_balancer_id, &config.name);

        common::with_deadline(&ctx, &format!("{} {}", action, id), async {
            common::write_child(
                &ctx,
                client,
                &config.load_balancer_id,
                &config.name,
                LABEL,
                mutation,
                probes,
                |_| Ok(expand_probe(&config)),
            )
            .await?;
            read_state(client, &id, planned_state.clone())
                .await?
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Failed to read Probe",
                        format!("{} was not found after it was written", id),
                    )
                })
        })
        .await
    }
}

fn parse_state_id(state: &DynamicValue) -> Result<ProbeId, Diagnostic> {
    let raw = common::required_string(state, "id")?;
    ProbeId::parse(&raw).map_err(|e| {
        Diagnostic::error("Invalid resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })
}

fn check_request_path(protocol: &str, request_path: Option<&str>) -> Result<(), Diagnostic> {
    let needs_path = protocol.eq_ignore_ascii_case("Http") || protocol.eq_ignore_ascii_case("Https");
    match (needs_path, request_path) {
        (true, None) => Err(Diagnostic::error(
            "Missing request_path",
            format!("request_path is required when protocol is {}", protocol),
        )
        .with_attribute(AttributePath::new("request_path"))),
        (false, Some(_)) => Err(Diagnostic::error(
            "Invalid request_path",
            "request_path cannot be set when protocol is Tcp",
        )
        .with_attribute(AttributePath::new("request_path"))),
        _ => Ok(()),
    }
}

fn expand_probe(config: &LbProbeConfig) -> Probe {
    Probe {
        id: None,
        name: Some(config.name.clone()),
        properties: ProbeProperties {
            protocol: config.protocol.clone(),
            port: config.port,
            interval_in_seconds: Some(config.interval_in_seconds),
            number_of_probes: Some(config.number_of_probes),
            probe_threshold: Some(config.probe_threshold),
            request_path: config.request_path.clone(),
            load_balancing_rules: None,
            provisioning_state: None,
        },
    }
}

fn flatten_probe(state: &mut DynamicValue, lb_id: &LoadBalancerId, probe: &Probe) {
    let props = &probe.properties;
    common::set_opt_string(state, "name", probe.name.as_deref());
    common::set_string(state, "loadbalancer_id", lb_id.to_string());
    common::set_string(state, "protocol", props.protocol.clone());
    common::set_opt_int(state, "port", Some(props.port));
    common::set_opt_string(state, "request_path", props.request_path.as_deref());
    common::set_opt_int(state, "interval_in_seconds", props.interval_in_seconds);
    common::set_opt_int(state, "number_of_probes", props.number_of_probes);
    common::set_opt_int(state, "probe_threshold", Some(props.probe_threshold.unwrap_or(1)));
    common::set_string_list(state, "load_balancer_rules", ids_of(&props.load_balancing_rules));
}

async fn read_state(
    client: &Client,
    id: &ProbeId,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let lb_id = id.load_balancer_id();
    let Some((_, probe)) = common::read_child(client, &lb_id, &id.name, probes_ref).await? else {
        tracing::info!("{} was not found - removing from state", id);
        return Ok(None);
    };
    common::set_string(&mut state, "id", id.to_string());
    flatten_probe(&mut state, &lb_id, &probe);
    Ok(Some(state))
}

#[async_trait]
impl ResourceWithConfigure for LbProbeResource {
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
impl ResourceWithImportState for LbProbeResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        match ProbeId::parse(&request.id) {
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
    use crate::resources::test_support::{self, LB_ID};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn probe_id() -> String {
        format!("{}/probes/health", LB_ID)
    }

    fn planned(extra: serde_json::Value) -> DynamicValue {
        let mut base = json!({
            "id": null,
            "name": "health",
            "loadbalancer_id": LB_ID,
            "protocol": "Http",
            "port": 80,
            "request_path": "/healthz",
            "interval_in_seconds": 15,
            "number_of_probes": 2,
            "probe_threshold": 1,
            "load_balancer_rules": null,
            "timeouts": null
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
            target.extend(extra);
        }
        test_support::value(base)
    }

    fn stored_probe(interval: i64) -> serde_json::Value {
        json!({
            "id": probe_id(),
            "name": "health",
            "properties": {
                "protocol": "Http",
                "port": 80,
                "requestPath": "/healthz",
                "intervalInSeconds": interval,
                "numberOfProbes": 2,
                "probeThreshold": 1,
                "loadBalancingRules": [{"id": format!("{}/loadBalancingRules/http", LB_ID)}]
            }
        })
    }

    fn configured(url: &str) -> LbProbeResource {
        LbProbeResource {
            provider_data: Some(test_support::provider_data(url)),
        }
    }

    #[test]
    fn request_path_depends_on_protocol() {
        assert!(check_request_path("Http", Some("/")).is_ok());
        assert!(check_request_path("Tcp", None).is_ok());
        assert_eq!(
            check_request_path("Https", None).unwrap_err().summary,
            "Missing request_path"
        );
        assert_eq!(
            check_request_path("Tcp", Some("/")).unwrap_err().summary,
            "Invalid request_path"
        );
    }

    #[tokio::test]
    async fn validate_defaults_protocol_to_tcp() {
        let response = LbProbeResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "azurerm_lb_probe".to_string(),
                    config: planned(json!({"protocol": null})),
                    client_capabilities: Default::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid request_path");
    }

    #[tokio::test]
    async fn update_replaces_probe_in_place() {
        let mut server = Server::new_async().await;
        let before = test_support::load_balancer("Standard", json!({"probes": [stored_probe(15)]}));
        let after = test_support::load_balancer("Standard", json!({"probes": [stored_probe(30)]}));
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
            .match_body(Matcher::PartialJson(json!({
                "properties": {"probes": [{"name": "health", "properties": {"intervalInSeconds": 30}}]}
            })))
            .with_body(&after)
            .create_async()
            .await;
        let _get_after = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(&after)
            .create_async()
            .await;

        let response = configured(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "azurerm_lb_probe".to_string(),
                    prior_state: planned(json!({"id": probe_id()})),
                    planned_state: planned(json!({"id": probe_id(), "interval_in_seconds": 30})),
                    config: planned(json!({})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response
                .new_state
                .get_number(&AttributePath::new("interval_in_seconds"))
                .unwrap(),
            30.0
        );
        assert_eq!(
            common::string_list(&response.new_state, "load_balancer_rules"),
            vec![format!("{}/loadBalancingRules/http", LB_ID)]
        );
        put.assert_async().await;
    }

    #[tokio::test]
    async fn update_of_vanished_probe_fails() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .create_async()
            .await;

        let prior = planned(json!({"id": probe_id()}));
        let response = configured(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "azurerm_lb_probe".to_string(),
                    prior_state: prior.clone(),
                    planned_state: planned(json!({"id": probe_id()})),
                    config: planned(json!({})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Probe not found");
        assert_eq!(response.new_state, prior);
    }

    #[tokio::test]
    async fn read_honours_timeouts_block() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({"probes": [stored_probe(15)]})))
            .create_async()
            .await;

        let response = configured(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "azurerm_lb_probe".to_string(),
                    current_state: test_support::value(json!({
                        "id": probe_id(),
                        "timeouts": {"read": "10m"}
                    })),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&AttributePath::new("protocol")).unwrap(), "Http");
        assert_eq!(
            state.get_string(&AttributePath::new("request_path")).unwrap(),
            "/healthz"
        );
    }
}
