#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::test_support::{self, pool_id, LB_ID};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn planned(extra: serde_json::Value) -> DynamicValue {
        let mut base = json!({
            "id": null,
            "name": "pool",
            "loadbalancer_id": LB_ID,
            "virtual_network_id": null,
            "backend_ip_configurations": null,
            "load_balancing_rules": null,
            "outbound_rules": null,
            "inbound_nat_rules": null,
            "tunnel_interface": [],
            "timeouts": null
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
            target.extend(extra);
        }
        test_support::value(base)
    }

    fn tunnel() -> serde_json::Value {
        json!([{"identifier": 900, "type": "Internal", "protocol": "VXLAN", "port": 15000}])
    }

    fn configured(url: &str) -> LbBackendAddressPoolResource {
        LbBackendAddressPoolResource {
            provider_data: Some(test_support::provider_data(url)),
        }
    }

    fn create_request(planned_state: DynamicValue) -> CreateResourceRequest {
        CreateResourceRequest {
            type_name: "azurerm_lb_backend_address_pool".to_string(),
            config: planned_state.clone(),
            planned_state,
            planned_private: vec![],
            provider_meta: None,
        }
    }

    #[test]
    fn test_tunnel_interfaces_follow_sku() {
        let gateway: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Gateway", json!({}))).unwrap();
        let standard: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Standard", json!({}))).unwrap();
        let tunnels = expand_tunnel_interfaces(&planned(json!({"tunnel_interface": tunnel()})));

        assert_eq!(tunnels.len(), 1);
        assert_eq!(tunnels[0].identifier, Some(900));
        assert_eq!(tunnels[0].interface_type.as_deref(), Some("Internal"));
        assert!(check_tunnel_interfaces(&gateway, &tunnels).is_ok());
        assert_eq!(
            check_tunnel_interfaces(&gateway, &[]).unwrap_err().summary,
            "Missing tunnel_interface"
        );
        assert_eq!(
            check_tunnel_interfaces(&standard, &tunnels).unwrap_err().summary,
            "Invalid tunnel_interface"
        );
        assert!(check_tunnel_interfaces(&standard, &[]).is_ok());
    }

    #[test]
    fn test_expand_keeps_existing_addresses() {
        let current: BackendAddressPool = serde_json::from_value(json!({
            "name": "pool",
            "properties": {
                "loadBalancerBackendAddresses": [{"name": "a1", "properties": {"ipAddress": "10.0.0.5"}}]
            }
        }))
        .unwrap();
        let config = LbBackendAddressPoolResource::extract_pool_config(&planned(
            json!({"virtual_network_id": "/vnet"}),
        ))
        .unwrap();

        let pool = expand_pool(Some(current), &config);
        assert_eq!(pool.properties.virtual_network, Some(SubResource::new("/vnet")));
        assert_eq!(
            pool.properties
                .load_balancer_backend_addresses
                .as_ref()
                .map(Vec::len),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_create_uses_child_endpoint() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .create_async()
            .await;
        let _missing = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"NotFound","message":"missing"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"name": "pool"})))
            .with_status(200)
            .with_body(r#"{"name":"pool","properties":{"provisioningState":"Succeeded"}}"#)
            .create_async()
            .await;
        let _read = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(json!({
                "id": path,
                "name": "pool",
                "properties": {
                    "loadBalancingRules": [{"id": format!("{}/loadBalancingRules/http", LB_ID)}],
                    "outboundRule": {"id": format!("{}/outboundRules/egress", LB_ID)}
                }
            }).to_string())
            .create_async()
            .await;

        let response = configured(&server.url())
            .create(Context::new(), create_request(planned(json!({}))))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.new_state;
        assert_eq!(common::string(state, "id"), Some(path.clone()));
        assert_eq!(
            common::string_list(state, "outbound_rules"),
            vec![format!("{}/outboundRules/egress", LB_ID)]
        );
        assert!(common::string_list(state, "backend_ip_configurations").is_empty());
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_on_basic_goes_through_parent() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Basic", json!({})))
            .create_async()
            .await;
        let put_lb = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "properties": {"backendAddressPools": [{"name": "pool"}]}
            })))
            .with_body("{}")
            .create_async()
            .await;
        let put_child = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let _read = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(json!({"id": path, "name": "pool", "properties": {}}).to_string())
            .create_async()
            .await;

        let response = configured(&server.url())
            .create(Context::new(), create_request(planned(json!({}))))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        put_lb.assert_async().await;
        put_child.assert_async().await;
    }

    #[tokio::test]
    async fn test_gateway_pool_requires_tunnel_interface() {
        let mut server = Server::new_async().await;
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Gateway", json!({})))
            .create_async()
            .await;

        let response = configured(&server.url())
            .create(Context::new(), create_request(planned(json!({}))))
            .await;

        assert_eq!(response.diagnostics[0].summary, "Missing tunnel_interface");
    }

    #[tokio::test]
    async fn test_read_flattens_tunnel_interfaces() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _read = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(json!({
                "id": path,
                "name": "pool",
                "properties": {
                    "tunnelInterfaces": [
                        {"identifier": 900, "type": "Internal", "protocol": "VXLAN", "port": 15000}
                    ]
                }
            }).to_string())
            .create_async()
            .await;

        let response = configured(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool".to_string(),
                    current_state: test_support::value(json!({"id": path})),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        let tunnels = state.get_list(&AttributePath::new("tunnel_interface")).unwrap();
        assert_eq!(tunnels.len(), 1);
        let entry = tunnels[0].as_map().unwrap();
        assert_eq!(entry["port"], Dynamic::Number(15000.0));
        assert_eq!(entry["type"], Dynamic::String("Internal".to_string()));
    }

    #[tokio::test]
    async fn test_update_keeps_addresses_managed_elsewhere() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .create_async()
            .await;
        let _pool = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(json!({
                "id": path,
                "name": "pool",
                "properties": {
                    "loadBalancerBackendAddresses": [
                        {"name": "web0", "properties": {"ipAddress": "10.0.0.5"}}
                    ]
                }
            }).to_string())
            .create_async()
            .await;
        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "name": "pool",
                "properties": {
                    "loadBalancerBackendAddresses": [
                        {"name": "web0", "properties": {"ipAddress": "10.0.0.5"}}
                    ],
                    "virtualNetwork": {"id": "/vnet"}
                }
            })))
            .with_body(r#"{"name":"pool","properties":{"provisioningState":"Succeeded"}}"#)
            .expect(1)
            .create_async()
            .await;

        let planned_state = planned(json!({"id": path, "virtual_network_id": "/vnet"}));
        let response = configured(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool".to_string(),
                    prior_state: planned(json!({"id": path})),
                    planned_state: planned_state.clone(),
                    config: planned_state,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(common::string(&response.new_state, "id"), Some(path.clone()));
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_missing_pool_removes_from_state() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _read = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let response = configured(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool".to_string(),
                    current_state: test_support::value(json!({"id": path})),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_delete_uses_child_endpoint() {
        let mut server = Server::new_async().await;
        let path = pool_id("pool");
        let _lb = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", path.as_str())
            .match_query(Matcher::Any)
            .with_status(202)
            .with_header("Location", &format!("{}/operations/pool-delete", server.url()))
            .create_async()
            .await;
        let operation = server
            .mock("GET", "/operations/pool-delete")
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;

        let response = configured(&server.url())
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "azurerm_lb_backend_address_pool".to_string(),
                    prior_state: test_support::value(json!({"id": path})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
        operation.assert_async().await;
    }
}
