//! gRPC service implementation of the tfplugin6 Provider service
//!
//! Translates protocol messages into calls on the `Provider`, `Resource` and
//! `DataSource` traits. Resources and data sources are created per request
//! from the provider's factories and configured with the provider data
//! returned by ConfigureProvider.
//!
//! Planning is done here rather than in resources: defaults are applied,
//! computed attributes become unknown when the object changes, and schema
//! plan modifiers run last.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::proto;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderMetadataRequest,
    ProviderSchemaRequest, ResourceFactory, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    AttributeType, Block, DefaultRequest, NestingMode, PlanModifierRequest, Schema, StringKind,
    ValidatorRequest,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, Dynamic, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    resources: Arc<HashMap<String, ResourceFactory>>,
    data_sources: Arc<HashMap<String, DataSourceFactory>>,
    provider_data: Arc<RwLock<ProviderData>>,
    stop: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider: Arc::new(RwLock::new(provider)),
            resources: Arc::new(resources),
            data_sources: Arc::new(data_sources),
            provider_data: Arc::new(RwLock::new(None)),
            stop: Context::new(),
        }
    }

    /// Cancelled by StopProvider; every request context derives from it
    pub fn stop_context(&self) -> Context {
        self.stop.clone()
    }

    fn new_resource(&self, type_name: &str) -> Result<Box<dyn ResourceWithConfigure>, Status> {
        self.resources
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()).into())
    }

    fn new_data_source(&self, type_name: &str) -> Result<Box<dyn DataSourceWithConfigure>, Status> {
        self.data_sources
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| TfplugError::DataSourceNotFound(type_name.to_string()).into())
    }

    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<(Box<dyn ResourceWithConfigure>, Vec<Diagnostic>), Status> {
        let mut resource = self.new_resource(type_name)?;
        let provider_data = self.provider_data.read().await.clone();
        let mut diagnostics = vec![];
        if provider_data.is_some() {
            diagnostics = resource
                .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
                .await
                .diagnostics;
        }
        Ok((resource, diagnostics))
    }

    async fn configured_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<(Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>), Status> {
        let mut data_source = self.new_data_source(type_name)?;
        let provider_data = self.provider_data.read().await.clone();
        let mut diagnostics = vec![];
        if provider_data.is_some() {
            diagnostics = data_source
                .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
                .await
                .diagnostics;
        }
        Ok((data_source, diagnostics))
    }

    async fn resource_schema(&self, type_name: &str) -> Result<Schema, Status> {
        let resource = self.new_resource(type_name)?;
        Ok(resource
            .schema(self.stop.child(), ResourceSchemaRequest)
            .await
            .schema)
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        let metadata = self
            .provider
            .read()
            .await
            .metadata(self.stop.child(), ProviderMetadataRequest)
            .await;

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
            diagnostics: vec![],
            data_sources: sorted_keys(&self.data_sources)
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: sorted_keys(&self.resources)
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        let ctx = self.stop.child();
        let provider = self.provider.read().await;
        let provider_schema = provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await;
        let metadata = provider
            .metadata(ctx.clone(), ProviderMetadataRequest)
            .await;
        drop(provider);

        let mut diagnostics = provider_schema.diagnostics;

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in self.resources.iter() {
            let response = factory().schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in self.data_sources.iter() {
            let response = factory().schema(ctx.clone(), DataSourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            data_source_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        debug!(
            resources = resource_schemas.len(),
            data_sources = data_source_schemas.len(),
            "GetProviderSchema"
        );

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: diagnostics_to_proto(diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;
        let ctx = self.stop.child();

        let provider = self.provider.read().await;
        let schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await.schema;
        let mut diagnostics = vec![];
        validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);
        if !has_errors(&diagnostics) {
            diagnostics.extend(
                provider
                    .validate(ctx, ValidateProviderConfigRequest { config })
                    .await
                    .diagnostics,
            );
        }

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ValidateResourceConfig");
        let config = decode_value(req.config.as_ref())?;
        let ctx = self.stop.child();

        let resource = self.new_resource(&req.type_name)?;
        let schema = resource
            .schema(ctx.clone(), ResourceSchemaRequest)
            .await
            .schema;
        let mut diagnostics = vec![];
        validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);
        if !has_errors(&diagnostics) {
            diagnostics.extend(
                resource
                    .validate(
                        ctx,
                        ValidateResourceConfigRequest {
                            type_name: req.type_name,
                            config,
                            client_capabilities: client_capabilities_from_proto(
                                req.client_capabilities,
                            ),
                        },
                    )
                    .await
                    .diagnostics,
            );
        }

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ValidateDataResourceConfig");
        let config = decode_value(req.config.as_ref())?;
        let ctx = self.stop.child();

        let data_source = self.new_data_source(&req.type_name)?;
        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;
        let mut diagnostics = vec![];
        validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);
        if !has_errors(&diagnostics) {
            diagnostics.extend(
                data_source
                    .validate(
                        ctx,
                        ValidateDataSourceConfigRequest {
                            type_name: req.type_name,
                            config,
                        },
                    )
                    .await
                    .diagnostics,
            );
        }

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, version = req.version, "UpgradeResourceState");
        let schema = self.resource_schema(&req.type_name).await?;

        let json = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        if json.is_empty() {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(vec![Diagnostic::error(
                    "Unsupported state format",
                    "Only JSON state can be upgraded; flatmap state is not supported",
                )]),
            }));
        }

        let mut state = DynamicValue::decode_json(&json)?;
        retain_schema_attributes(&schema.block, &mut state.value);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_value(&state)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;
        info!(terraform_version = %req.terraform_version, "ConfigureProvider");

        let response = self
            .provider
            .write()
            .await
            .configure(
                self.stop.child(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ReadResource");
        let current_state = decode_value(req.current_state.as_ref())?;
        let ctx = self.stop.child();

        let (resource, diagnostics) = self.configured_resource(&ctx, &req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_value(&current_state)?),
                diagnostics: diagnostics_to_proto(diagnostics),
                private: req.private,
            }));
        }

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: req.type_name,
                    current_state,
                    private: req.private,
                    provider_meta: optional_value(req.provider_meta.as_ref())?,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;

        let new_state = match response.new_state {
            Some(mut state) => {
                null_unknowns(&mut state.value);
                state
            }
            None => DynamicValue::null(),
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_value(&new_state)?),
            diagnostics: diagnostics_to_proto(diagnostics.into_iter().chain(response.diagnostics)),
            private: response.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "PlanResourceChange");
        let prior_state = decode_value(req.prior_state.as_ref())?;
        let proposed = decode_value(req.proposed_new_state.as_ref())?;
        let config = decode_value(req.config.as_ref())?;

        if proposed.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_value(&proposed)?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
            }));
        }

        let schema = self.resource_schema(&req.type_name).await?;
        let mut planner = Planner {
            mark_computed: prior_state.is_null() || prior_state != proposed,
            requires_replace: vec![],
            diagnostics: vec![],
        };
        let mut planned = proposed;
        planner.plan_block(
            &schema.block,
            &config.value,
            &prior_state.value,
            &mut planned.value,
            &AttributePath::root(),
        );

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_value(&planned)?),
            requires_replace: planner.requires_replace.iter().map(path_to_proto).collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(planner.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let prior_state = decode_value(req.prior_state.as_ref())?;
        let planned_state = decode_value(req.planned_state.as_ref())?;
        let config = decode_value(req.config.as_ref())?;
        let provider_meta = optional_value(req.provider_meta.as_ref())?;
        let ctx = self.stop.child();

        let (resource, mut diagnostics) = self.configured_resource(&ctx, &req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::apply_resource_change::Response {
                new_state: Some(encode_value(&prior_state)?),
                private: req.planned_private,
                diagnostics: diagnostics_to_proto(diagnostics),
                legacy_type_system: false,
            }));
        }

        let (new_state, private) = if planned_state.is_null() {
            info!(type_name = %req.type_name, "Deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name,
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            let failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            if failed {
                (prior_state, vec![])
            } else {
                (DynamicValue::null(), vec![])
            }
        } else if prior_state.is_null() {
            info!(type_name = %req.type_name, "Creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            let failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            let mut new_state = response.new_state;
            if failed && new_state.value.contains_unknown() {
                // nothing was created that Terraform could track
                new_state = DynamicValue::null();
            }
            null_unknowns(&mut new_state.value);
            (new_state, response.private)
        } else {
            info!(type_name = %req.type_name, "Updating resource");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name,
                        prior_state: prior_state.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            let failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            if failed {
                (prior_state, response.private)
            } else {
                let mut new_state = response.new_state;
                null_unknowns(&mut new_state.value);
                (new_state, response.private)
            }
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, id = %req.id, "ImportResourceState");
        let ctx = self.stop.child();

        let (resource, mut diagnostics) = self.configured_resource(&ctx, &req.type_name).await?;
        let Some(importer) = resource.as_import_state() else {
            diagnostics.push(Diagnostic::error(
                "Resource Import Not Implemented",
                format!("{} does not support import", req.type_name),
            ));
            return Ok(Response::new(proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
            }));
        };

        let response = importer
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_value(&imported.state)?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ReadDataSource");
        let config = decode_value(req.config.as_ref())?;
        let ctx = self.stop.child();

        let (data_source, mut diagnostics) =
            self.configured_data_source(&ctx, &req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
            }));
        }

        let response = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                    provider_meta: optional_value(req.provider_meta.as_ref())?,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let mut state = response.state;
        null_unknowns(&mut state.value);

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_value(&state)?),
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        info!("StopProvider");
        self.stop.cancel();
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

struct Planner {
    /// Computed attributes without configuration become unknown
    mark_computed: bool,
    requires_replace: Vec<AttributePath>,
    diagnostics: Vec<Diagnostic>,
}

impl Planner {
    fn plan_block(
        &mut self,
        block: &Block,
        config: &Dynamic,
        prior: &Dynamic,
        planned: &mut Dynamic,
        path: &AttributePath,
    ) {
        let Dynamic::Map(planned_map) = planned else {
            return;
        };

        for attr in &block.attributes {
            let attr_path = path.clone().attribute(&attr.name);
            let config_value = field(config, &attr.name);
            let prior_value = field(prior, &attr.name);
            let mut plan_value = planned_map
                .get(&attr.name)
                .cloned()
                .unwrap_or(Dynamic::Null);

            if config_value.is_null() {
                if let Some(default) = &attr.default {
                    plan_value = default
                        .default_value(DefaultRequest {
                            path: attr_path.clone(),
                        })
                        .value
                        .value;
                } else if attr.computed && self.mark_computed {
                    plan_value = Dynamic::Unknown;
                }
            }

            for modifier in &attr.plan_modifiers {
                let response = modifier.modify(PlanModifierRequest {
                    config_value: DynamicValue::new(config_value.clone()),
                    state_value: DynamicValue::new(prior_value.clone()),
                    plan_value: DynamicValue::new(plan_value),
                    path: attr_path.clone(),
                });
                plan_value = response.plan_value.value;
                if response.requires_replace && !self.requires_replace.contains(&attr_path) {
                    self.requires_replace.push(attr_path.clone());
                }
                self.diagnostics.extend(response.diagnostics);
            }

            planned_map.insert(attr.name.clone(), plan_value);
        }

        for nested in &block.block_types {
            let block_path = path.clone().attribute(&nested.type_name);
            let config_value = field(config, &nested.type_name);
            let prior_value = field(prior, &nested.type_name);
            let Some(planned_value) = planned_map.get_mut(&nested.type_name) else {
                continue;
            };

            match nested.nesting {
                NestingMode::List | NestingMode::Set => {
                    if let Dynamic::List(items) = planned_value {
                        for (idx, item) in items.iter_mut().enumerate() {
                            let item_config = element(&config_value, idx);
                            let item_prior = element(&prior_value, idx);
                            self.plan_block(
                                &nested.block,
                                &item_config,
                                &item_prior,
                                item,
                                &block_path.clone().index(idx as i64),
                            );
                        }
                    }
                }
                NestingMode::Single | NestingMode::Group => {
                    self.plan_block(
                        &nested.block,
                        &config_value,
                        &prior_value,
                        planned_value,
                        &block_path,
                    );
                }
                NestingMode::Map | NestingMode::Invalid => {}
            }
        }
    }
}

fn field(value: &Dynamic, name: &str) -> Dynamic {
    value
        .as_map()
        .and_then(|m| m.get(name))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

fn element(value: &Dynamic, idx: usize) -> Dynamic {
    value
        .as_list()
        .and_then(|l| l.get(idx))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

/// Checks a configuration object against its schema block and runs attribute
/// validators on known values
pub fn validate_block(
    block: &Block,
    value: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let map = match value {
        Dynamic::Null | Dynamic::Unknown => return,
        Dynamic::Map(map) => map,
        other => {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid block",
                    format!("Expected an object, got {}", other.type_name()),
                )
                .with_attribute(path.clone()),
            );
            return;
        }
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        if block.attribute(key).is_none() && block.nested_block(key).is_none() {
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here", key),
                )
                .with_attribute(path.clone().attribute(key)),
            );
        }
    }

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let attr_value = map.get(&attr.name).unwrap_or(&Dynamic::Null);

        match attr_value {
            Dynamic::Unknown => continue,
            Dynamic::Null => {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument \"{}\" is required", attr.name),
                        )
                        .with_attribute(attr_path),
                    );
                }
                continue;
            }
            _ => {}
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Value for unconfigurable attribute",
                    format!("\"{}\" is read-only and cannot be set", attr.name),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        if !type_matches(&attr.r#type, attr_value) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!(
                        "Inappropriate value for attribute \"{}\": got {}",
                        attr.name,
                        attr_value.type_name()
                    ),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        if attr_value.contains_unknown() {
            continue;
        }
        for validator in &attr.validators {
            diagnostics.extend(
                validator
                    .validate(ValidatorRequest {
                        config_value: DynamicValue::new(attr_value.clone()),
                        path: attr_path.clone(),
                    })
                    .diagnostics,
            );
        }
    }

    for nested in &block.block_types {
        let block_path = path.clone().attribute(&nested.type_name);
        let nested_value = map.get(&nested.type_name).unwrap_or(&Dynamic::Null);

        match nested.nesting {
            NestingMode::List | NestingMode::Set => {
                let items: &[Dynamic] = match nested_value {
                    Dynamic::List(items) => items,
                    _ => &[],
                };
                if nested_value.is_unknown() {
                    continue;
                }
                let count = items.len() as i64;
                if count < nested.min_items {
                    diagnostics.push(
                        Diagnostic::error(
                            "Insufficient blocks",
                            format!(
                                "At least {} \"{}\" blocks are required",
                                nested.min_items, nested.type_name
                            ),
                        )
                        .with_attribute(block_path.clone()),
                    );
                }
                if nested.max_items > 0 && count > nested.max_items {
                    diagnostics.push(
                        Diagnostic::error(
                            "Too many blocks",
                            format!(
                                "No more than {} \"{}\" blocks are allowed",
                                nested.max_items, nested.type_name
                            ),
                        )
                        .with_attribute(block_path.clone()),
                    );
                }
                for (idx, item) in items.iter().enumerate() {
                    validate_block(
                        &nested.block,
                        item,
                        &block_path.clone().index(idx as i64),
                        diagnostics,
                    );
                }
            }
            NestingMode::Single | NestingMode::Group => {
                if nested_value.is_null() && nested.min_items > 0 {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required block",
                            format!("A \"{}\" block is required", nested.type_name),
                        )
                        .with_attribute(block_path.clone()),
                    );
                }
                validate_block(&nested.block, nested_value, &block_path, diagnostics);
            }
            NestingMode::Map | NestingMode::Invalid => {}
        }
    }
}

fn type_matches(ty: &AttributeType, value: &Dynamic) -> bool {
    match (ty, value) {
        (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
        (AttributeType::String, Dynamic::String(_)) => true,
        (AttributeType::Number, Dynamic::Number(_)) => true,
        (AttributeType::Bool, Dynamic::Bool(_)) => true,
        (AttributeType::List(elem), Dynamic::List(items))
        | (AttributeType::Set(elem), Dynamic::List(items)) => {
            items.iter().all(|item| type_matches(elem, item))
        }
        (AttributeType::Map(elem), Dynamic::Map(entries)) => {
            entries.values().all(|entry| type_matches(elem, entry))
        }
        (AttributeType::Object(fields), Dynamic::Map(entries)) => fields.iter().all(|(name, ty)| {
            entries
                .get(name)
                .map_or(true, |entry| type_matches(ty, entry))
        }),
        _ => false,
    }
}

/// Drops attributes that are no longer part of the schema from stored state
fn retain_schema_attributes(block: &Block, value: &mut Dynamic) {
    let Dynamic::Map(map) = value else {
        return;
    };
    map.retain(|key, _| block.attribute(key).is_some() || block.nested_block(key).is_some());

    for nested in &block.block_types {
        match map.get_mut(&nested.type_name) {
            Some(Dynamic::List(items)) => {
                for item in items {
                    retain_schema_attributes(&nested.block, item);
                }
            }
            Some(item @ Dynamic::Map(_)) => retain_schema_attributes(&nested.block, item),
            _ => {}
        }
    }
}

/// Replaces unknown values with null; applied state must be wholly known
fn null_unknowns(value: &mut Dynamic) {
    match value {
        Dynamic::Unknown => *value = Dynamic::Null,
        Dynamic::List(items) => items.iter_mut().for_each(null_unknowns),
        Dynamic::Map(entries) => entries.values_mut().for_each(null_unknowns),
        _ => {}
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

fn decode_value(value: Option<&proto::DynamicValue>) -> Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };
    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)?
    } else if !value.json.is_empty() {
        DynamicValue::decode_json(&value.json)?
    } else {
        DynamicValue::null()
    };
    Ok(decoded)
}

fn optional_value(value: Option<&proto::DynamicValue>) -> Result<Option<DynamicValue>, Status> {
    value.map(|v| decode_value(Some(v))).transpose()
}

fn encode_value(value: &DynamicValue) -> Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack()?,
        json: vec![],
    })
}

pub(crate) fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block
            .attributes
            .iter()
            .map(|attr| proto::schema::Attribute {
                name: attr.name.clone(),
                r#type: attr.r#type.to_json().to_string().into_bytes(),
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: proto::StringKind::Plain as i32,
                deprecated: attr.deprecated,
                write_only: false,
            })
            .collect(),
        block_types: block
            .block_types
            .iter()
            .map(|nested| proto::schema::NestedBlock {
                type_name: nested.type_name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting: nesting_to_proto(nested.nesting) as i32,
                min_items: nested.min_items,
                max_items: nested.max_items,
            })
            .collect(),
        description: block.description.clone(),
        description_kind: match block.description_kind {
            StringKind::Plain => proto::StringKind::Plain as i32,
            StringKind::Markdown => proto::StringKind::Markdown as i32,
        },
        deprecated: block.deprecated,
    }
}

fn nesting_to_proto(nesting: NestingMode) -> proto::schema::nested_block::NestingMode {
    use proto::schema::nested_block::NestingMode as Proto;
    match nesting {
        NestingMode::Invalid => Proto::Invalid,
        NestingMode::Single => Proto::Single,
        NestingMode::List => Proto::List,
        NestingMode::Set => Proto::Set,
        NestingMode::Map => Proto::Map,
        NestingMode::Group => Proto::Group,
    }
}

fn server_capabilities_to_proto(
    capabilities: &crate::types::ServerCapabilities,
) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: capabilities.plan_destroy,
        get_provider_schema_optional: capabilities.get_provider_schema_optional,
        move_resource_state: capabilities.move_resource_state,
    }
}

fn client_capabilities_from_proto(
    capabilities: Option<proto::ClientCapabilities>,
) -> ClientCapabilities {
    capabilities
        .map(|c| ClientCapabilities {
            deferral_allowed: c.deferral_allowed,
            write_only_attributes_allowed: c.write_only_attributes_allowed,
        })
        .unwrap_or_default()
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::{step::Selector, Step};
    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diagnostics: impl IntoIterator<Item = Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid as i32,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}
