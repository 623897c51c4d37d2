//! Outbound rule data source implementation

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::ids::{LoadBalancerId, OutboundRuleId};
use crate::resources::common;
use crate::resources::resource_lb_outbound_rule::{flatten_outbound_rule, outbound_rules_ref};
use crate::timeouts::{self, Operation};
use crate::validate;

#[derive(Default)]
pub struct LbOutboundRuleDataSource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbOutboundRuleDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for LbOutboundRuleDataSource {
    fn type_name(&self) -> &str {
        "azurerm_lb_outbound_rule"
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
        let frontend = HashMap::from([
            ("name".to_string(), AttributeType::String),
            ("id".to_string(), AttributeType::String),
        ]);
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets an Outbound Rule of an existing Load Balancer")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
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
            .attribute(
                AttributeBuilder::new(
                    "frontend_ip_configuration",
                    AttributeType::List(Box::new(AttributeType::Object(frontend))),
                )
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_address_pool_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_tcp_reset", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("allocated_outbound_ports", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("idle_timeout_in_minutes", AttributeType::Number)
                    .computed()
                    .build(),
            )
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
        let config = &request.config;
        let result: Result<DynamicValue, Diagnostic> = async {
            let client = common::client(&self.provider_data)?;
            let ctx = timeouts::operation_context(&ctx, config, Operation::Read)?;
            let name = common::required_string(config, "name")?;
            let lb_id = common::required_string(config, "loadbalancer_id")?;
            let lb_id = LoadBalancerId::parse(&lb_id).map_err(|e| {
                Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                    .with_attribute(AttributePath::new("loadbalancer_id"))
            })?;
            let id = OutboundRuleId::new(&lb_id, &name);

            let found = common::with_deadline(
                &ctx,
                &format!("reading {}", id),
                common::read_child(client, &lb_id, &name, outbound_rules_ref),
            )
            .await?;
            let Some((_, rule)) = found else {
                return Err(Diagnostic::error(
                    "Outbound Rule not found",
                    format!("{} was not found", id),
                ));
            };
            let mut state = config.clone();
            common::set_string(&mut state, "id", id.to_string());
            flatten_outbound_rule(&mut state, &lb_id, &rule);
            Ok(state)
        }
        .await;

        match result {
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
impl DataSourceWithConfigure for LbOutboundRuleDataSource {
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
