//! Typed ARM resource IDs for load balancers and their children
//!
//! IDs are parsed segment by segment as `key/value` pairs. Key names are
//! matched exactly, apart from `resourceGroups` which ARM sometimes returns
//! as `resourcegroups`. `Display` always produces the canonical casing.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const NETWORK_NAMESPACE: &str = "Microsoft.Network";

#[derive(Debug, Clone, Error, PartialEq)]
#[error("parsing {kind} ID {id:?}: {reason}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub id: String,
    pub reason: String,
}

impl IdParseError {
    fn new(kind: &'static str, id: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Splits `id` into values for the expected keys, in order.
fn parse_segments(
    kind: &'static str,
    id: &str,
    keys: &[&str],
) -> Result<Vec<String>, IdParseError> {
    let Some(rest) = id.strip_prefix('/') else {
        return Err(IdParseError::new(kind, id, "expected a leading '/'"));
    };
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() % 2 != 0 {
        return Err(IdParseError::new(
            kind,
            id,
            "expected key/value pairs but found an odd number of segments",
        ));
    }

    let pairs: Vec<(&str, &str)> = parts.chunks(2).map(|c| (c[0], c[1])).collect();
    if pairs.len() < keys.len() {
        let missing = keys[pairs.len()];
        return Err(IdParseError::new(
            kind,
            id,
            format!("the segment {:?} is missing", missing),
        ));
    }
    if pairs.len() > keys.len() {
        return Err(IdParseError::new(
            kind,
            id,
            format!(
                "unexpected trailing segments after {:?}",
                keys[keys.len() - 1]
            ),
        ));
    }

    let mut values = Vec::with_capacity(keys.len());
    for ((key, value), expected) in pairs.iter().zip(keys) {
        let key_matches = if *expected == "resourceGroups" {
            key.eq_ignore_ascii_case(expected)
        } else {
            key == expected
        };
        if !key_matches {
            return Err(IdParseError::new(
                kind,
                id,
                format!("expected the segment {:?} but got {:?}", expected, key),
            ));
        }
        if value.is_empty() {
            return Err(IdParseError::new(
                kind,
                id,
                format!("the value for {:?} is empty", expected),
            ));
        }
        if *expected == "providers" && !value.eq_ignore_ascii_case(NETWORK_NAMESPACE) {
            return Err(IdParseError::new(
                kind,
                id,
                format!("expected the provider {:?} but got {:?}", NETWORK_NAMESPACE, value),
            ));
        }
        values.push(value.to_string());
    }
    Ok(values)
}

const LB_KEYS: [&str; 4] = ["subscriptions", "resourceGroups", "providers", "loadBalancers"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadBalancerId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl LoadBalancerId {
    pub fn new(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(id: &str) -> Result<Self, IdParseError> {
        let values = parse_segments("Load Balancer", id, &LB_KEYS)?;
        Ok(Self {
            subscription_id: values[0].clone(),
            resource_group: values[1].clone(),
            name: values[3].clone(),
        })
    }

    pub fn frontend_ip_configuration(&self, name: &str) -> FrontendIpConfigurationId {
        FrontendIpConfigurationId::new(self, name)
    }

    pub fn backend_address_pool(&self, name: &str) -> BackendAddressPoolId {
        BackendAddressPoolId::new(self, name)
    }
}

impl fmt::Display for LoadBalancerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/loadBalancers/{}",
            self.subscription_id, self.resource_group, NETWORK_NAMESPACE, self.name
        )
    }
}

impl FromStr for LoadBalancerId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Children addressed as `{load balancer id}/{segment}/{name}`
macro_rules! lb_child_id {
    ($(#[$meta:meta])* $name:ident, $segment:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            pub subscription_id: String,
            pub resource_group: String,
            pub load_balancer_name: String,
            pub name: String,
        }

        impl $name {
            pub fn new(load_balancer: &LoadBalancerId, name: &str) -> Self {
                Self {
                    subscription_id: load_balancer.subscription_id.clone(),
                    resource_group: load_balancer.resource_group.clone(),
                    load_balancer_name: load_balancer.name.clone(),
                    name: name.to_string(),
                }
            }

            pub fn parse(id: &str) -> Result<Self, IdParseError> {
                let values = parse_segments(
                    $kind,
                    id,
                    &[LB_KEYS[0], LB_KEYS[1], LB_KEYS[2], LB_KEYS[3], $segment],
                )?;
                Ok(Self {
                    subscription_id: values[0].clone(),
                    resource_group: values[1].clone(),
                    load_balancer_name: values[3].clone(),
                    name: values[4].clone(),
                })
            }

            pub fn load_balancer_id(&self) -> LoadBalancerId {
                LoadBalancerId::new(
                    &self.subscription_id,
                    &self.resource_group,
                    &self.load_balancer_name,
                )
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}/{}/{}", self.load_balancer_id(), $segment, self.name)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

lb_child_id!(
    FrontendIpConfigurationId,
    "frontendIPConfigurations",
    "Frontend IP Configuration"
);
lb_child_id!(
    BackendAddressPoolId,
    "backendAddressPools",
    "Backend Address Pool"
);
lb_child_id!(
    LoadBalancingRuleId,
    "loadBalancingRules",
    "Load Balancing Rule"
);
lb_child_id!(ProbeId, "probes", "Probe");
lb_child_id!(InboundNatPoolId, "inboundNatPools", "Inbound NAT Pool");
lb_child_id!(InboundNatRuleId, "inboundNatRules", "Inbound NAT Rule");
lb_child_id!(OutboundRuleId, "outboundRules", "Outbound Rule");

/// `{backend address pool id}/addresses/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddressPoolAddressId {
    pub subscription_id: String,
    pub resource_group: String,
    pub load_balancer_name: String,
    pub pool_name: String,
    pub name: String,
}

impl BackendAddressPoolAddressId {
    pub fn new(pool: &BackendAddressPoolId, name: &str) -> Self {
        Self {
            subscription_id: pool.subscription_id.clone(),
            resource_group: pool.resource_group.clone(),
            load_balancer_name: pool.load_balancer_name.clone(),
            pool_name: pool.name.clone(),
            name: name.to_string(),
        }
    }

    pub fn parse(id: &str) -> Result<Self, IdParseError> {
        let values = parse_segments(
            "Backend Address Pool Address",
            id,
            &[
                LB_KEYS[0],
                LB_KEYS[1],
                LB_KEYS[2],
                LB_KEYS[3],
                "backendAddressPools",
                "addresses",
            ],
        )?;
        Ok(Self {
            subscription_id: values[0].clone(),
            resource_group: values[1].clone(),
            load_balancer_name: values[3].clone(),
            pool_name: values[4].clone(),
            name: values[5].clone(),
        })
    }

    pub fn load_balancer_id(&self) -> LoadBalancerId {
        LoadBalancerId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.load_balancer_name,
        )
    }

    pub fn backend_address_pool_id(&self) -> BackendAddressPoolId {
        BackendAddressPoolId::new(&self.load_balancer_id(), &self.pool_name)
    }
}

impl fmt::Display for BackendAddressPoolAddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/addresses/{}", self.backend_address_pool_id(), self.name)
    }
}

impl FromStr for BackendAddressPoolAddressId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
