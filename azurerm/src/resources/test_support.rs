//! Fixtures for resource and data source tests

use serde_json::{json, Value};
use tfplug::types::DynamicValue;

use crate::api::test_helpers::create_test_client;
use crate::AzureLbProviderData;

pub const SUBSCRIPTION: &str = "sub";
pub const LB_ID: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/loadBalancers/lb1";

pub fn provider_data(server_url: &str) -> AzureLbProviderData {
    AzureLbProviderData::new(create_test_client(server_url), SUBSCRIPTION)
}

pub fn value(json: Value) -> DynamicValue {
    DynamicValue::decode_json(&serde_json::to_vec(&json).unwrap()).unwrap()
}

pub fn frontend_id(name: &str) -> String {
    format!("{}/frontendIPConfigurations/{}", LB_ID, name)
}

pub fn pool_id(name: &str) -> String {
    format!("{}/backendAddressPools/{}", LB_ID, name)
}

pub fn probe_id(name: &str) -> String {
    format!("{}/probes/{}", LB_ID, name)
}

/// A load balancer body with one frontend named `fe` plus `properties`
/// merged in
pub fn load_balancer(sku: &str, properties: Value) -> String {
    let mut props = json!({
        "provisioningState": "Succeeded",
        "frontendIPConfigurations": [{
            "id": frontend_id("fe"),
            "name": "fe",
            "properties": {"privateIPAddress": "10.0.0.4", "privateIPAllocationMethod": "Dynamic"}
        }]
    });
    if let (Some(target), Value::Object(extra)) = (props.as_object_mut(), properties) {
        target.extend(extra);
    }
    json!({
        "id": LB_ID,
        "name": "lb1",
        "location": "westeurope",
        "sku": {"name": sku, "tier": "Regional"},
        "properties": props
    })
    .to_string()
}
