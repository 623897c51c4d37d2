//! Load balancing rule data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::ids::{LoadBalancerId, LoadBalancingRuleId};
use crate::resources::common;
use crate::resources::resource_lb_rule::{flatten_rule, rules_ref};
use crate::timeouts::{self, Operation};
use crate::validate;

#[derive(Default)]
pub struct LbRuleDataSource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbRuleDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_rule(&self, ctx: &Context, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let client = common::client(&self.provider_data)?;
        let ctx = timeouts::operation_context(ctx, config, Operation::Read)?;
        let name = common::required_string(config, "name")?;
        let lb_id = common::required_string(config, "loadbalancer_id")?;
        let lb_id = LoadBalancerId::parse(&lb_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;
        let id = LoadBalancingRuleId::new(&lb_id, &name);

        common::with_deadline(&ctx, &format!("reading {}", id), async {
            let Some((_, rule)) = common::read_child(client, &lb_id, &name, rules_ref).await? else {
                return Err(Diagnostic::error(
                    "Load Balancing Rule not found",
                    format!("{} was not found", id),
                ));
            };
            let mut state = config.clone();
            common::set_string(&mut state, "id", id.to_string());
            flatten_rule(&mut state, &lb_id, &rule);
            Ok(state)
        })
        .await
    }
}

fn computed(name: &str, attr_type: AttributeType) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, attr_type).computed().build()
}

#[async_trait]
impl DataSource for LbRuleDataSource {
    fn type_name(&self) -> &str {
        "azurerm_lb_rule"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets a Load Balancing Rule of an existing Load Balancer")
            .attribute(computed("id", AttributeType::String))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(validate::child_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("loadbalancer_id", AttributeType::String)
                    .required()
                    .validator(validate::load_balancer_id())
                    .build(),
            )
            .attribute(computed("frontend_ip_configuration_name", AttributeType::String))
            .attribute(computed("frontend_ip_configuration_id", AttributeType::String))
            .attribute(computed("protocol", AttributeType::String))
            .attribute(computed("frontend_port", AttributeType::Number))
            .attribute(computed("backend_port", AttributeType::Number))
            .attribute(computed(
                "backend_address_pool_ids",
                AttributeType::List(Box::new(AttributeType::String)),
            ))
            .attribute(computed("probe_id", AttributeType::String))
            .attribute(computed("enable_floating_ip", AttributeType::Bool))
            .attribute(computed("idle_timeout_in_minutes", AttributeType::Number))
            .attribute(computed("load_distribution", AttributeType::String))
            .attribute(computed("disable_outbound_snat", AttributeType::Bool))
            .attribute(computed("enable_tcp_reset", AttributeType::Bool))
            .block(timeouts::data_source_block())
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match self.read_rule(&ctx, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(diag) => ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for LbRuleDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        match common::provider_data_from(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureDataSourceResponse { diagnostics }
    }
}
