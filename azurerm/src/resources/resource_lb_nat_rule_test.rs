#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::test_support::{self, frontend_id, pool_id, LB_ID};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn nat_rule_id() -> String {
        format!("{}/inboundNatRules/ssh", LB_ID)
    }

    fn planned(extra: serde_json::Value) -> DynamicValue {
        let mut base = json!({
            "id": null,
            "name": "ssh",
            "loadbalancer_id": LB_ID,
            "frontend_ip_configuration_name": "fe",
            "frontend_ip_configuration_id": null,
            "backend_ip_configuration_id": null,
            "protocol": "Tcp",
            "backend_port": 22,
            "frontend_port": 2222,
            "frontend_port_start": null,
            "frontend_port_end": null,
            "backend_address_pool_id": null,
            "idle_timeout_in_minutes": 4,
            "enable_floating_ip": false,
            "enable_tcp_reset": false,
            "timeouts": null
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
            target.extend(extra);
        }
        test_support::value(base)
    }

    fn range() -> serde_json::Value {
        json!({
            "frontend_port": null,
            "frontend_port_start": 3000,
            "frontend_port_end": 3010,
            "backend_address_pool_id": pool_id("pool")
        })
    }

    #[test]
    fn test_frontend_port_forms() {
        assert_eq!(
            frontend_ports(&planned(json!({}))).unwrap(),
            FrontendPorts::Single(2222)
        );
        assert_eq!(
            frontend_ports(&planned(range())).unwrap(),
            FrontendPorts::Range {
                start: 3000,
                end: 3010,
                backend_address_pool_id: pool_id("pool"),
            }
        );

        let both = planned(json!({"frontend_port_start": 3000}));
        assert_eq!(
            frontend_ports(&both).unwrap_err().summary,
            "Conflicting frontend ports"
        );

        let partial = planned(json!({"frontend_port": null, "frontend_port_start": 3000}));
        assert_eq!(
            frontend_ports(&partial).unwrap_err().summary,
            "Missing frontend ports"
        );

        let inverted = planned(json!({
            "frontend_port": null,
            "frontend_port_start": 3010,
            "frontend_port_end": 3000,
            "backend_address_pool_id": pool_id("pool")
        }));
        assert_eq!(
            frontend_ports(&inverted).unwrap_err().summary,
            "Invalid frontend port range"
        );
    }

    #[tokio::test]
    async fn test_validate_skips_unknown_ports() {
        let mut config = planned(json!({"frontend_port": null}));
        config
            .mark_unknown(&AttributePath::new("frontend_port"))
            .unwrap();

        let response = LbNatRuleResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "azurerm_lb_nat_rule".to_string(),
                    config,
                    client_capabilities: Default::default(),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn test_expand_range_form_targets_pool() {
        let lb: LoadBalancer =
            serde_json::from_str(&test_support::load_balancer("Standard", json!({}))).unwrap();
        let config = LbNatRuleResource::extract_nat_rule_config(&planned(range())).unwrap();
        let rule = expand_nat_rule(&lb, &config).unwrap();

        assert_eq!(rule.properties.frontend_port, None);
        assert_eq!(rule.properties.frontend_port_range_start, Some(3000));
        assert_eq!(
            rule.properties.backend_address_pool,
            Some(SubResource::new(pool_id("pool")))
        );
        assert_eq!(
            rule.properties.frontend_ip_configuration,
            Some(SubResource::new(frontend_id("fe")))
        );
    }

    #[test]
    fn test_flatten_range_rule_drops_zero_frontend_port() {
        let rule: InboundNatRule = serde_json::from_value(json!({
            "id": nat_rule_id(),
            "name": "ssh",
            "properties": {
                "frontendIPConfiguration": {"id": frontend_id("fe")},
                "backendAddressPool": {"id": pool_id("pool")},
                "protocol": "Tcp",
                "frontendPort": 0,
                "frontendPortRangeStart": 3000,
                "frontendPortRangeEnd": 3010,
                "backendPort": 22
            }
        }))
        .unwrap();
        let lb_id = LoadBalancerId::parse(LB_ID).unwrap();
        let mut state = DynamicValue::object();
        flatten_nat_rule(&mut state, &lb_id, &rule);

        assert!(state.get(&AttributePath::new("frontend_port")).unwrap().is_null());
        assert_eq!(common::int(&state, "frontend_port_start"), Some(3000));
        assert_eq!(
            common::string(&state, "backend_address_pool_id"),
            Some(pool_id("pool"))
        );
        assert_eq!(common::boolean(&state, "enable_tcp_reset"), Some(false));
    }

    #[tokio::test]
    async fn test_read_reports_backend_ip_configuration() {
        let mut server = Server::new_async().await;
        let nic_ip = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/nic/ipConfigurations/ipconfig1";
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer(
                "Standard",
                json!({"inboundNatRules": [{
                    "id": nat_rule_id(),
                    "name": "ssh",
                    "properties": {
                        "frontendIPConfiguration": {"id": frontend_id("fe")},
                        "backendIPConfiguration": {"id": nic_ip},
                        "protocol": "Tcp",
                        "frontendPort": 2222,
                        "backendPort": 22
                    }
                }]}),
            ))
            .create_async()
            .await;

        let resource = LbNatRuleResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "azurerm_lb_nat_rule".to_string(),
                    current_state: test_support::value(json!({"id": nat_rule_id()})),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(
            common::string(&state, "backend_ip_configuration_id").as_deref(),
            Some(nic_ip)
        );
        assert_eq!(common::int(&state, "frontend_port"), Some(2222));
    }

    fn stored_rule(name: &str, frontend_port: i64) -> serde_json::Value {
        json!({
            "id": format!("{}/inboundNatRules/{}", LB_ID, name),
            "name": name,
            "properties": {
                "frontendIPConfiguration": {"id": frontend_id("fe")},
                "protocol": "Tcp",
                "frontendPort": frontend_port,
                "backendPort": 22
            }
        })
    }

    #[tokio::test]
    async fn test_create_adds_rule_to_parent() {
        let mut server = Server::new_async().await;
        let _before = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer("Standard", json!({})))
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "properties": {"inboundNatRules": [{
                    "name": "ssh",
                    "properties": {
                        "frontendIPConfiguration": {"id": frontend_id("fe")},
                        "frontendPort": 2222,
                        "backendPort": 22
                    }
                }]}
            })))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let _after = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer(
                "Standard",
                json!({"inboundNatRules": [stored_rule("ssh", 2222)]}),
            ))
            .create_async()
            .await;

        let resource = LbNatRuleResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let planned_state = planned(json!({}));
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "azurerm_lb_nat_rule".to_string(),
                    config: planned_state.clone(),
                    planned_state,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.new_state;
        assert_eq!(common::string(state, "id"), Some(nat_rule_id()));
        assert_eq!(
            common::string(state, "frontend_ip_configuration_id"),
            Some(frontend_id("fe"))
        );
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_replaces_rule_and_keeps_siblings() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer(
                "Standard",
                json!({"inboundNatRules": [stored_rule("ssh", 2222), stored_rule("rdp", 3389)]}),
            ))
            .create_async()
            .await;
        let put = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex(
                r#""inboundNatRules":\[\{"name":"ssh".*"frontendPort":2200.*\},\{"id":"[^"]*/inboundNatRules/rdp""#.to_string(),
            ))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let resource = LbNatRuleResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let planned_state = planned(json!({"id": nat_rule_id(), "frontend_port": 2200}));
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "azurerm_lb_nat_rule".to_string(),
                    prior_state: planned(json!({"id": nat_rule_id()})),
                    planned_state: planned_state.clone(),
                    config: planned_state,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_surfaces_api_errors() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LB_ID)
            .match_query(Matcher::Any)
            .with_body(test_support::load_balancer(
                "Standard",
                json!({"inboundNatRules": [{"name": "ssh", "properties": {"protocol": "Tcp"}}]}),
            ))
            .create_async()
            .await;
        let _put = server
            .mock("PUT", LB_ID)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":"InvalidResourceReference","message":"in use"}}"#)
            .create_async()
            .await;

        let resource = LbNatRuleResource {
            provider_data: Some(test_support::provider_data(&server.url())),
        };
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "azurerm_lb_nat_rule".to_string(),
                    prior_state: test_support::value(json!({"id": nat_rule_id()})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to update Load Balancer");
        assert!(response.diagnostics[0].detail.contains("InvalidResourceReference"));
    }
}
