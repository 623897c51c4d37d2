//! Backend address pool data source implementation

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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::models::LoadBalancerBackendAddress;
use crate::ids::{BackendAddressPoolId, LoadBalancerId};
use crate::resources::common;
use crate::resources::resource_lb_backend_address_pool::flatten_pool;
use crate::timeouts::{self, Operation};
use crate::validate;

#[derive(Default)]
pub struct LbBackendAddressPoolDataSource {
    provider_data: Option<crate::AzureLbProviderData>,
}

impl LbBackendAddressPoolDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_pool(&self, ctx: &Context, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let client = common::client(&self.provider_data)?;
        let ctx = timeouts::operation_context(ctx, config, Operation::Read)?;
        let name = common::required_string(config, "name")?;
        let lb_id = common::required_string(config, "loadbalancer_id")?;
        let lb_id = LoadBalancerId::parse(&lb_id).map_err(|e| {
            Diagnostic::error("Invalid loadbalancer_id", e.to_string())
                .with_attribute(AttributePath::new("loadbalancer_id"))
        })?;
        let id = BackendAddressPoolId::new(&lb_id, &name);

        let pool = common::with_deadline(&ctx, &format!("reading {}", id), async {
            match client.load_balancers().get_backend_address_pool(&id).await {
                Ok(pool) => Ok(pool),
                Err(e) if e.is_not_found() => Err(Diagnostic::error(
                    "Backend Address Pool not found",
                    format!("{} was not found", id),
                )),
                Err(e) => Err(common::api_error("Failed to retrieve Backend Address Pool", &id, e)),
            }
        })
        .await?;

        let mut state = config.clone();
        common::set_string(&mut state, "id", id.to_string());
        flatten_pool(&mut state, &lb_id, &pool);
        let addresses = pool
            .properties
            .load_balancer_backend_addresses
            .iter()
            .flatten()
            .map(flatten_backend_address)
            .collect();
        let _ = state.set_list(&AttributePath::new("backend_address"), addresses);
        Ok(state)
    }
}

fn flatten_backend_address(address: &LoadBalancerBackendAddress) -> Dynamic {
    let string = |v: Option<&str>| v.map_or(Dynamic::Null, |s| Dynamic::String(s.to_string()));
    let props = &address.properties;
    let mut entry = HashMap::new();
    entry.insert("name".to_string(), string(address.name.as_deref()));
    entry.insert(
        "virtual_network_id".to_string(),
        string(props.virtual_network.as_ref().map(|v| v.id.as_str())),
    );
    entry.insert("ip_address".to_string(), string(props.ip_address.as_deref()));
    entry.insert(
        "backend_address_ip_configuration_id".to_string(),
        string(
            props
                .load_balancer_frontend_ip_configuration
                .as_ref()
                .map(|f| f.id.as_str()),
        ),
    );
    Dynamic::Map(entry)
}

fn id_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

#[async_trait]
impl DataSource for LbBackendAddressPoolDataSource {
    fn type_name(&self) -> &str {
        "azurerm_lb_backend_address_pool"
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
        let tunnel = HashMap::from([
            ("identifier".to_string(), AttributeType::Number),
            ("type".to_string(), AttributeType::String),
            ("protocol".to_string(), AttributeType::String),
            ("port".to_string(), AttributeType::Number),
        ]);
        let address = HashMap::from([
            ("name".to_string(), AttributeType::String),
            ("virtual_network_id".to_string(), AttributeType::String),
            ("ip_address".to_string(), AttributeType::String),
            (
                "backend_address_ip_configuration_id".to_string(),
                AttributeType::String,
            ),
        ]);
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets a Backend Address Pool of an existing Load Balancer")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(validate::non_empty())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("loadbalancer_id", AttributeType::String)
                    .required()
                    .validator(validate::load_balancer_id())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_network_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("backend_ip_configurations", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("load_balancing_rules", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("outbound_rules", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("inbound_nat_rules", id_list())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "tunnel_interface",
                    AttributeType::List(Box::new(AttributeType::Object(tunnel))),
                )
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "backend_address",
                    AttributeType::List(Box::new(AttributeType::Object(address))),
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
        match self.read_pool(&ctx, &request.config).await {
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
impl DataSourceWithConfigure for LbBackendAddressPoolDataSource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{self, pool_id, LB_ID};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn request() -> ReadDataSourceRequest {
        ReadDataSourceRequest {
            type_name: "azurerm_lb_backend_address_pool".to_string(),
            config: test_support::value(json!({"name": "pool", "loadbalancer_id": LB_ID})),
            provider_meta: None,
            client_capabilities: Default::default(),
        }
    }

    #[tokio::test]
    async fn reads_pool_with_addresses() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(
                json!({
                    "id": path,
                    "name": "pool",
                    "properties": {
                        "loadBalancerBackendAddresses": [
                            {"name": "web1", "properties": {"ipAddress": "10.0.1.4"}}
                        ],
                        "loadBalancingRules": [{"id": format!("{}/loadBalancingRules/http", LB_ID)}]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let data_source = LbBackendAddressPoolDataSource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = data_source.read(Context::new(), request()).await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.state;
        assert_eq!(common::string(state, "id"), Some(path.clone()));
        assert_eq!(common::string_list(state, "load_balancing_rules").len(), 1);
        let addresses = state.get_list(&AttributePath::new("backend_address")).unwrap();
        let address = addresses[0].as_map().unwrap();
        assert_eq!(address["ip_address"], Dynamic::String("10.0.1.4".to_string()));
        assert!(address["virtual_network_id"].is_null());
    }

    #[tokio::test]
    async fn missing_pool_is_an_error() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", pool_id("pool").as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let data_source = LbBackendAddressPoolDataSource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = data_source.read(Context::new(), request()).await;

        assert_eq!(response.diagnostics[0].summary, "Backend Address Pool not found");
    }
}
