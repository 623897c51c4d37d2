//! Data source implementations

pub mod data_source_lb;
pub mod data_source_lb_backend_address_pool;
pub mod data_source_lb_outbound_rule;
pub mod data_source_lb_rule;

pub use data_source_lb::LbDataSource;
pub use data_source_lb_backend_address_pool::LbBackendAddressPoolDataSource;
pub use data_source_lb_outbound_rule::LbOutboundRuleDataSource;
pub use data_source_lb_rule::LbRuleDataSource;
