//! Resource implementations

pub(crate) mod common;
pub mod resource_lb;
pub mod resource_lb_backend_address_pool;
pub mod resource_lb_backend_address_pool_address;
pub mod resource_lb_nat_pool;
pub mod resource_lb_nat_rule;
pub mod resource_lb_outbound_rule;
pub mod resource_lb_probe;
pub mod resource_lb_rule;

#[cfg(test)]
pub(crate) mod test_support;

pub use resource_lb::LbResource;
pub use resource_lb_backend_address_pool::LbBackendAddressPoolResource;
pub use resource_lb_backend_address_pool_address::LbBackendAddressPoolAddressResource;
pub use resource_lb_nat_pool::LbNatPoolResource;
pub use resource_lb_nat_rule::LbNatRuleResource;
pub use resource_lb_outbound_rule::LbOutboundRuleResource;
pub use resource_lb_probe::LbProbeResource;
pub use resource_lb_rule::LbRuleResource;
