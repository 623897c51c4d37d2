pub mod api;
pub mod data_sources;
pub mod ids;
pub mod locks;
pub mod provider_data;
pub mod resources;
pub mod timeouts;
pub mod validate;

pub use provider_data::AzureLbProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue, ServerCapabilities};

use crate::api::{ClientSecretCredential, CloudEnvironment, Credential};
use crate::resources::common;

pub struct AzureLbProvider {
    provider_data: Option<AzureLbProviderData>,
}

impl Default for AzureLbProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureLbProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }
}

/// Provider settings after applying the `ARM_*` environment fallbacks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSettings {
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub environment: String,
    pub metadata_host: Option<String>,
}

fn config_or_env(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    common::string(config, name)
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty()))
}

impl ProviderSettings {
    pub fn from_config(config: &DynamicValue) -> Self {
        Self {
            subscription_id: config_or_env(config, "subscription_id", "ARM_SUBSCRIPTION_ID"),
            tenant_id: config_or_env(config, "tenant_id", "ARM_TENANT_ID"),
            client_id: config_or_env(config, "client_id", "ARM_CLIENT_ID"),
            client_secret: config_or_env(config, "client_secret", "ARM_CLIENT_SECRET"),
            access_token: config_or_env(config, "access_token", "ARM_ACCESS_TOKEN"),
            environment: config_or_env(config, "environment", "ARM_ENVIRONMENT")
                .unwrap_or_else(|| "public".to_string()),
            metadata_host: config_or_env(config, "metadata_host", "ARM_METADATA_HOSTNAME"),
        }
    }

    /// Builds the ARM client, or the diagnostics explaining what is missing
    pub fn build(&self) -> Result<AzureLbProviderData, Vec<Diagnostic>> {
        let mut diagnostics = vec![];

        let subscription_id = self.subscription_id.clone();
        if subscription_id.is_none() {
            diagnostics.push(Diagnostic::error(
                "subscription_id is required",
                "Set subscription_id in the provider block or the ARM_SUBSCRIPTION_ID environment variable",
            ));
        }

        let cloud = match CloudEnvironment::from_name(&self.environment) {
            Some(env) => Some(match &self.metadata_host {
                Some(host) => env.with_resource_manager(host),
                None => env,
            }),
            None => {
                diagnostics.push(Diagnostic::error(
                    "Invalid environment",
                    format!(
                        "unknown environment {:?}; expected public, usgovernment or china",
                        self.environment
                    ),
                ));
                None
            }
        };

        let credential = match (&self.access_token, cloud.as_ref()) {
            (Some(token), _) => Some(Credential::Static(token.clone())),
            (None, Some(env)) => match (&self.tenant_id, &self.client_id, &self.client_secret) {
                (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                    match reqwest::Client::builder().build() {
                        Ok(http) => Some(Credential::ClientSecret(ClientSecretCredential::new(
                            http,
                            &env.authority,
                            tenant_id,
                            client_id,
                            client_secret,
                            &env.scope(),
                        ))),
                        Err(e) => {
                            diagnostics.push(Diagnostic::error(
                                "Failed to create HTTP client",
                                e.to_string(),
                            ));
                            None
                        }
                    }
                }
                _ => {
                    diagnostics.push(Diagnostic::error(
                        "Missing credentials",
                        "Either access_token (ARM_ACCESS_TOKEN) or tenant_id, client_id and client_secret (ARM_TENANT_ID, ARM_CLIENT_ID, ARM_CLIENT_SECRET) must be set",
                    ));
                    None
                }
            },
            (None, None) => None,
        };

        let (Some(subscription_id), Some(cloud), Some(credential)) =
            (subscription_id, cloud, credential)
        else {
            return Err(diagnostics);
        };
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        tracing::info!(
            "Using resource manager endpoint {} ({})",
            cloud.resource_manager,
            cloud.name
        );
        api::Client::new(&cloud.resource_manager, credential)
            .map(|client| AzureLbProviderData::new(client, &subscription_id))
            .map_err(|e| vec![Diagnostic::error("Failed to create API client", e.to_string())])
    }
}

#[async_trait]
impl Provider for AzureLbProvider {
    fn type_name(&self) -> &str {
        "azurerm"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            server_capabilities: ServerCapabilities {
                plan_destroy: false,
                get_provider_schema_optional: false,
                move_resource_state: false,
            },
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let optional = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .build()
        };
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Azure Load Balancer provider")
            .attribute(optional(
                "subscription_id",
                "Subscription to manage; defaults to ARM_SUBSCRIPTION_ID",
            ))
            .attribute(optional(
                "tenant_id",
                "AAD tenant of the service principal; defaults to ARM_TENANT_ID",
            ))
            .attribute(optional(
                "client_id",
                "Service principal client ID; defaults to ARM_CLIENT_ID",
            ))
            .attribute(
                AttributeBuilder::new("client_secret", AttributeType::String)
                    .description("Service principal secret; defaults to ARM_CLIENT_SECRET")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_token", AttributeType::String)
                    .description("Pre-acquired bearer token; defaults to ARM_ACCESS_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(optional(
                "environment",
                "Cloud environment: public, usgovernment or china",
            ))
            .attribute(optional(
                "metadata_host",
                "Resource manager endpoint override; defaults to ARM_METADATA_HOSTNAME",
            ))
            .attribute(
                AttributeBuilder::new("skip_provider_registration", AttributeType::Bool)
                    .description("Accepted for compatibility; resource providers are never registered")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        tracing::info!(
            "Configuring provider for Terraform {}",
            request.terraform_version
        );
        match ProviderSettings::from_config(&request.config).build() {
            Ok(data) => {
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(Arc::new(data)),
                }
            }
            Err(diagnostics) => ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            },
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "azurerm_lb".to_string(),
            Box::new(|| Box::new(resources::LbResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        resources.insert(
            "azurerm_lb_backend_address_pool".to_string(),
            Box::new(|| {
                Box::new(resources::LbBackendAddressPoolResource::new())
                    as Box<dyn ResourceWithConfigure>
            }),
        );
        resources.insert(
            "azurerm_lb_backend_address_pool_address".to_string(),
            Box::new(|| {
                Box::new(resources::LbBackendAddressPoolAddressResource::new())
                    as Box<dyn ResourceWithConfigure>
            }),
        );
        resources.insert(
            "azurerm_lb_rule".to_string(),
            Box::new(|| Box::new(resources::LbRuleResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        resources.insert(
            "azurerm_lb_probe".to_string(),
            Box::new(|| Box::new(resources::LbProbeResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        resources.insert(
            "azurerm_lb_nat_pool".to_string(),
            Box::new(|| {
                Box::new(resources::LbNatPoolResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        resources.insert(
            "azurerm_lb_nat_rule".to_string(),
            Box::new(|| {
                Box::new(resources::LbNatRuleResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        resources.insert(
            "azurerm_lb_outbound_rule".to_string(),
            Box::new(|| {
                Box::new(resources::LbOutboundRuleResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        data_sources.insert(
            "azurerm_lb".to_string(),
            Box::new(|| {
                Box::new(data_sources::LbDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "azurerm_lb_backend_address_pool".to_string(),
            Box::new(|| {
                Box::new(data_sources::LbBackendAddressPoolDataSource::new())
                    as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "azurerm_lb_rule".to_string(),
            Box::new(|| {
                Box::new(data_sources::LbRuleDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "azurerm_lb_outbound_rule".to_string(),
            Box::new(|| {
                Box::new(data_sources::LbOutboundRuleDataSource::new())
                    as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources
    }
}
