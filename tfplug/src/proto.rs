//! Generated types for Terraform Plugin Protocol v6
//!
//! Produced at build time by tonic-build from `proto/tfplugin6.proto`.
//! Several messages share names with framework types (`DynamicValue`,
//! `Diagnostic`, `Schema`); refer to these through the `proto::` prefix.
//!
//! - RPC request/response pairs live in snake_case modules,
//!   e.g. `read_resource::Request`
//! - Nested messages live in sub-modules, e.g. `diagnostic::Severity`
//! - The service trait is re-exported as `ProviderService`

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_types_are_accessible() {
        let _ = diagnostic::Severity::Warning;
        let _ = attribute_path::step::Selector::AttributeName("name".to_string());
        let _ = schema::nested_block::NestingMode::List;
    }

    #[test]
    fn request_response_types_default() {
        let request = plan_resource_change::Request::default();
        assert!(request.prior_state.is_none());
        let response = read_resource::Response::default();
        assert!(response.new_state.is_none());
        let _ = import_resource_state::ImportedResource::default();
    }
}
