//! Drives the gRPC provider service the way Terraform does, with concurrent
//! applies and StopProvider cancellation

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::sleep;
use tonic::Request;

use tfplug::context::Context;
use tfplug::grpc::GrpcProviderServer;
use tfplug::proto::{self, ProviderService};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, ServerCapabilities};

#[derive(Default)]
struct OperationStats {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    total_operations: AtomicUsize,
}

impl OperationStats {
    fn start_operation(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.total_operations.fetch_add(1, Ordering::SeqCst);
    }

    fn end_operation(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct TrackingProvider {
    stats: Arc<OperationStats>,
}

#[async_trait]
impl Provider for TrackingProvider {
    fn type_name(&self) -> &str {
        "tracking"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "tracking".to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new().build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.stats.clone() as Arc<dyn Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "tracking_slow".to_string(),
            Box::new(|| Box::new(SlowResource { stats: None }) as Box<dyn ResourceWithConfigure>),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        HashMap::new()
    }
}

struct SlowResource {
    stats: Option<Arc<OperationStats>>,
}

#[async_trait]
impl Resource for SlowResource {
    fn type_name(&self) -> &str {
        "tracking_slow"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: "tracking_slow".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("id", AttributeType::String)
                        .computed()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("delay_ms", AttributeType::Number)
                        .required()
                        .build(),
                )
                .build(),
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
        let Some(stats) = &self.stats else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Provider not configured",
                    "The provider must be configured before creating resources",
                )],
            };
        };

        let delay = request
            .planned_state
            .get_number(&AttributePath::new("delay_ms"))
            .unwrap_or(0.0);

        stats.start_operation();
        let cancelled = tokio::select! {
            _ = sleep(Duration::from_millis(delay as u64)) => false,
            _ = ctx.cancelled() => true,
        };
        stats.end_operation();

        let mut new_state = request.planned_state;
        if cancelled {
            return CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![Diagnostic::error("Operation cancelled", "provider stopped")],
            };
        }

        let _ = new_state.set_string(
            &AttributePath::new("id"),
            format!("slow-{}", stats.total_operations.load(Ordering::SeqCst)),
        );
        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        ReadResourceResponse {
            new_state: Some(request.current_state),
            diagnostics: vec![],
            private: request.private,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for SlowResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match request
            .provider_data
            .and_then(|data| data.downcast::<OperationStats>().ok())
        {
            Some(stats) => self.stats = Some(stats),
            None => diagnostics.push(Diagnostic::error("No provider data", "unexpected type")),
        }
        ConfigureResourceResponse { diagnostics }
    }
}

fn planned(delay_ms: f64) -> Option<proto::DynamicValue> {
    let mut state = DynamicValue::object();
    state
        .set_number(&AttributePath::new("delay_ms"), delay_ms)
        .unwrap();
    state.mark_unknown(&AttributePath::new("id")).unwrap();
    Some(proto::DynamicValue {
        msgpack: state.encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn null_value() -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: DynamicValue::null().encode_msgpack().unwrap(),
        json: vec![],
    })
}

async fn configured(stats: Arc<OperationStats>) -> Arc<GrpcProviderServer<TrackingProvider>> {
    let server = GrpcProviderServer::new(TrackingProvider { stats });
    server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: Some(proto::DynamicValue {
                msgpack: DynamicValue::object().encode_msgpack().unwrap(),
                json: vec![],
            }),
            client_capabilities: None,
        }))
        .await
        .unwrap();
    Arc::new(server)
}

fn create_request(delay_ms: f64) -> Request<proto::apply_resource_change::Request> {
    Request::new(proto::apply_resource_change::Request {
        type_name: "tracking_slow".to_string(),
        prior_state: null_value(),
        planned_state: planned(delay_ms),
        config: planned(delay_ms),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_applies_run_concurrently() {
    let stats = Arc::new(OperationStats::default());
    let server = configured(stats.clone()).await;

    let mut handles = vec![];
    for _ in 0..8 {
        let server = server.clone();
        handles.push(task::spawn(async move {
            server
                .apply_resource_change(create_request(50.0))
                .await
                .unwrap()
                .into_inner()
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.diagnostics.is_empty());
        let state = DynamicValue::decode_msgpack(&response.new_state.unwrap().msgpack).unwrap();
        assert!(state
            .get_string(&AttributePath::new("id"))
            .unwrap()
            .starts_with("slow-"));
    }

    assert_eq!(stats.total_operations.load(Ordering::SeqCst), 8);
    assert!(stats.max_in_flight.load(Ordering::SeqCst) > 1);
    assert_eq!(stats.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_provider_cancels_in_flight_apply() {
    let stats = Arc::new(OperationStats::default());
    let server = configured(stats.clone()).await;

    let apply = {
        let server = server.clone();
        task::spawn(async move {
            server
                .apply_resource_change(create_request(60_000.0))
                .await
                .unwrap()
                .into_inner()
        })
    };

    sleep(Duration::from_millis(50)).await;
    server
        .stop_provider(Request::new(proto::stop_provider::Request {}))
        .await
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(5), apply)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Operation cancelled");
    // the planned id was unknown, so nothing is recorded in state
    let state = DynamicValue::decode_msgpack(&response.new_state.unwrap().msgpack).unwrap();
    assert!(state.is_null());
}

#[tokio::test]
async fn test_apply_before_configure_reports_error() {
    let server = GrpcProviderServer::new(TrackingProvider {
        stats: Arc::new(OperationStats::default()),
    });

    let response = server
        .apply_resource_change(create_request(0.0))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn test_read_keeps_state_known() {
    let server = configured(Arc::new(OperationStats::default())).await;
    let mut state = DynamicValue::object();
    state
        .set_string(&AttributePath::new("id"), "slow-1".to_string())
        .unwrap();
    state
        .set_number(&AttributePath::new("delay_ms"), 1.0)
        .unwrap();

    let response = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "tracking_slow".to_string(),
            current_state: Some(proto::DynamicValue {
                msgpack: state.encode_msgpack().unwrap(),
                json: vec![],
            }),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();

    let new_state = DynamicValue::decode_msgpack(&response.new_state.unwrap().msgpack).unwrap();
    assert_eq!(new_state, state);
    assert!(!matches!(new_state.value, Dynamic::Null));
}
