//! Load balancer data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::ids::LoadBalancerId;
use crate::resources::common;
use crate::resources::resource_lb::{flatten_load_balancer, frontend_object_type};
use crate::timeouts::{self, Operation};
use crate::validate;

#[derive(Default)]
pub struct LbDataSource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_load_balancer(
        &self,
        ctx: &Context,
        config: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref();
        let client = common::client(&self.provider_data)?;
        let subscription_id = data.map(|d| d.subscription_id.as_str()).unwrap_or_default();
        let ctx = timeouts::operation_context(ctx, config, Operation::Read)?;
        let id = LoadBalancerId::new(
            subscription_id,
            &common::required_string(config, "resource_group_name")?,
            &common::required_string(config, "name")?,
        );

        let lb = common::with_deadline(
            &ctx,
            &format!("reading {}", id),
            common::get_load_balancer(client, &id),
        )
        .await?
        .ok_or_else(|| {
            Diagnostic::error("Load Balancer not found", format!("{} was not found", id))
        })?;

        let mut state = config.clone();
        flatten_load_balancer(&mut state, &id, &lb);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for LbDataSource {
    fn type_name(&self) -> &str {
        "azurerm_lb"
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
            .description("Gets information about an existing Load Balancer")
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
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .required()
                    .validator(validate::non_empty())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku_tier", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip_address", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "private_ip_addresses",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "frontend_ip_configuration",
                    AttributeType::List(Box::new(frontend_object_type())),
                )
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
        tracing::debug!(
            "Reading azurerm_lb data source, configured: {}",
            self.provider_data.is_some()
        );
        match self.read_load_balancer(&ctx, &request.config).await {
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
impl DataSourceWithConfigure for LbDataSource {
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
