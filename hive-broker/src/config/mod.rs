// Configuration Module
//
// This module provides configuration options for the broker: its node id,
// the optional cacher, logging and provider selection.
//
// ## Examples
//
// ```rust
// use hive_broker::config::{BrokerConfig, LogLevel, LoggingConfig};
// use hive_broker::cachers::MemoryCacher;
// use std::sync::Arc;
//
// let config = BrokerConfig::new("node-1")
//     .with_cacher(Arc::new(MemoryCacher::new()))
//     .with_logging_config(LoggingConfig::new().with_default_level(LogLevel::Debug));
// ```

use hive_common::logging::Logger;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::cachers::Cacher;
use crate::services::load_balancing::{LoadBalancingStrategy, RoundRobinLoadBalancer};

// Re-export configuration types from hive_common::logging
pub use hive_common::logging::{ComponentKey, LogLevel, LoggingConfig};

/// Configuration for a [`crate::ServiceBroker`]
#[derive(Clone)]
pub struct BrokerConfig {
    /// Node ID; generated when built with `Default`
    pub node_id: String,

    /// Cacher used by cache-enabled actions (None = no caching at all)
    pub cacher: Option<Arc<dyn Cacher>>,

    /// Logging configuration options
    pub logging_config: Option<LoggingConfig>,

    /// Root logger to use instead of building one from `node_id`
    pub logger: Option<Arc<Logger>>,

    /// Provider selection for actions with several providers
    pub load_balancer: Option<Arc<dyn LoadBalancingStrategy>>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

impl BrokerConfig {
    /// Create a configuration with the given node ID
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            cacher: None,
            logging_config: Some(LoggingConfig::default_info()), // Default to Info logging
            logger: None,
            load_balancer: None,
        }
    }

    /// Attach a cacher
    pub fn with_cacher(mut self, cacher: Arc<dyn Cacher>) -> Self {
        self.cacher = Some(cacher);
        self
    }

    /// Add logging configuration
    pub fn with_logging_config(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self
    }

    /// Inject a root logger
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Replace the default round-robin provider selection
    pub fn with_load_balancer(mut self, load_balancer: Arc<dyn LoadBalancingStrategy>) -> Self {
        self.load_balancer = Some(load_balancer);
        self
    }

    /// Configured strategy, or round-robin
    pub(crate) fn load_balancer(&self) -> Arc<dyn LoadBalancingStrategy> {
        self.load_balancer
            .clone()
            .unwrap_or_else(|| Arc::new(RoundRobinLoadBalancer::new()))
    }
}

// Implement Display for BrokerConfig to enable logging it directly
impl fmt::Display for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BrokerConfig: node_id:{} cacher:{} custom_load_balancer:{}",
            self.node_id,
            if self.cacher.is_some() { "yes" } else { "no" },
            self.load_balancer.is_some()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cachers::MemoryCacher;

    #[test]
    fn defaults() {
        let config = BrokerConfig::default();
        assert!(Uuid::parse_str(&config.node_id).is_ok());
        assert!(config.cacher.is_none());
        assert_eq!(
            config.logging_config.as_ref().map(|c| c.default_level),
            Some(LogLevel::Info)
        );
        assert!(config.load_balancer.is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let config = BrokerConfig::new("node-1")
            .with_cacher(Arc::new(MemoryCacher::new()))
            .with_logging_config(LoggingConfig::new().with_default_level(LogLevel::Warn));
        assert_eq!(config.node_id, "node-1");
        assert!(config.cacher.is_some());
        assert_eq!(
            config.logging_config.map(|c| c.default_level),
            Some(LogLevel::Warn)
        );
    }
}
