//! Schema validators and allowed values shared by the load balancer resources

use tfplug::schema::{Validator, ValidatorRequest, ValidatorResponse};
use tfplug::types::Diagnostic;
use tfplug::validator::{NumberRangeValidator, StringLengthValidator, StringOneOfValidator};

use crate::ids::{
    BackendAddressPoolId, FrontendIpConfigurationId, IdParseError, LoadBalancerId, ProbeId,
};

pub const TRANSPORT_PROTOCOLS: [&str; 3] = ["All", "Tcp", "Udp"];
pub const PROBE_PROTOCOLS: [&str; 3] = ["Http", "Https", "Tcp"];
pub const LOAD_DISTRIBUTIONS: [&str; 3] = ["Default", "SourceIP", "SourceIPProtocol"];
pub const TUNNEL_INTERFACE_TYPES: [&str; 3] = ["None", "Internal", "External"];
pub const TUNNEL_PROTOCOLS: [&str; 3] = ["None", "Native", "VXLAN"];
pub const SKU_NAMES: [&str; 3] = ["Basic", "Gateway", "Standard"];
pub const SKU_TIERS: [&str; 2] = ["Regional", "Global"];
pub const ALLOCATION_METHODS: [&str; 2] = ["Dynamic", "Static"];
pub const IP_VERSIONS: [&str; 2] = ["IPv4", "IPv6"];

/// Names of load balancer children: 1-80 characters, alphanumerics plus
/// `.`, `-` and `_`, starting with an alphanumeric and not ending in `.`
/// or `-`
pub fn is_valid_child_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    bytes.len() <= 80
        && first.is_ascii_alphanumeric()
        && (last.is_ascii_alphanumeric() || *last == b'_')
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
}

pub struct ChildNameValidator;

impl Validator for ChildNameValidator {
    fn description(&self) -> String {
        "value must be 1-80 characters of letters, digits, '.', '-' or '_', start with a letter or digit and end with a letter, digit or '_'".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(name) = request.config_value.value.as_string() {
            if !is_valid_child_name(name) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("{}, got '{}'", self.description(), name),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub fn child_name() -> Box<dyn Validator> {
    Box::new(ChildNameValidator)
}

/// Accepts strings that parse as a given kind of resource ID
pub struct ResourceIdValidator {
    kind: &'static str,
    check: fn(&str) -> Result<(), IdParseError>,
}

impl Validator for ResourceIdValidator {
    fn description(&self) -> String {
        format!("value must be a {} ID", self.kind)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(id) = request.config_value.value.as_string() {
            if let Err(e) = (self.check)(id) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for {}", request.path), e.to_string())
                        .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub fn load_balancer_id() -> Box<dyn Validator> {
    Box::new(ResourceIdValidator {
        kind: "Load Balancer",
        check: |id| LoadBalancerId::parse(id).map(|_| ()),
    })
}

pub fn backend_address_pool_id() -> Box<dyn Validator> {
    Box::new(ResourceIdValidator {
        kind: "Backend Address Pool",
        check: |id| BackendAddressPoolId::parse(id).map(|_| ()),
    })
}

pub fn frontend_ip_configuration_id() -> Box<dyn Validator> {
    Box::new(ResourceIdValidator {
        kind: "Frontend IP Configuration",
        check: |id| FrontendIpConfigurationId::parse(id).map(|_| ()),
    })
}

pub fn probe_id() -> Box<dyn Validator> {
    Box::new(ResourceIdValidator {
        kind: "Probe",
        check: |id| ProbeId::parse(id).map(|_| ()),
    })
}

/// Any non-empty ID; used for references into other services such as
/// virtual networks and subnets
pub fn non_empty() -> Box<dyn Validator> {
    StringLengthValidator::between(1, usize::MAX)
}

pub fn one_of(values: &[&str]) -> Box<dyn Validator> {
    StringOneOfValidator::create(values)
}

/// Whole numbers only, then the wrapped range check
pub struct IntegerValidator {
    range: Box<dyn Validator>,
}

impl Validator for IntegerValidator {
    fn description(&self) -> String {
        format!("whole number, {}", self.range.description())
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        if let Some(n) = request.config_value.value.as_number() {
            if n.fract() != 0.0 {
                return ValidatorResponse {
                    diagnostics: vec![Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("value must be a whole number, got {}", n),
                    )
                    .with_attribute(request.path)],
                };
            }
        }
        self.range.validate(request)
    }
}

pub fn between(min: i64, max: i64) -> Box<dyn Validator> {
    Box::new(IntegerValidator {
        range: NumberRangeValidator::between(min as f64, max as f64),
    })
}

pub fn at_least(min: i64) -> Box<dyn Validator> {
    Box::new(IntegerValidator {
        range: NumberRangeValidator::at_least(min as f64),
    })
}

/// Loose IPv4/IPv6 literal check
pub fn is_ip_address(value: &str) -> bool {
    value.parse::<std::net::IpAddr>().is_ok()
}

pub struct IpAddressValidator;

impl Validator for IpAddressValidator {
    fn description(&self) -> String {
        "value must be an IPv4 or IPv6 address".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(value) = request.config_value.value.as_string() {
            if !is_ip_address(value) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("{}, got '{}'", self.description(), value),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub fn ip_address() -> Box<dyn Validator> {
    Box::new(IpAddressValidator)
}
