// Public modules
pub mod broker;
pub mod cachers;
pub mod config;
pub mod error;
pub mod services;

// Re-export the broker and its configuration
pub use broker::{ServiceBroker, REGISTER_ACTION_EVENT, REGISTER_NODE_EVENT, REGISTER_SERVICE_EVENT};
pub use config::BrokerConfig;
pub use error::BrokerError;

// Re-export the main types from the services module
pub use services::action_catalog::{ActionCatalogEntry, ActionDescriptor, ActionProvider};
pub use services::load_balancing::{
    LoadBalancingStrategy, RandomLoadBalancer, RoundRobinLoadBalancer,
};
pub use services::schema::{ActionDef, ActionOptions, EventDef, ServiceSchema};
pub use services::service::{ServiceBuilder, ServiceState};
pub use services::service_registry::ServiceRegistry;
pub use services::{
    action_handler, event_handler, lifecycle_hook, method_handler, spawn_event_handler,
    ActionHandler, Context, EventContext, EventHandler, MethodHandler, Service, ServiceFuture,
};

// Re-export the cacher contract and the in-memory backend
pub use cachers::{Cacher, MemoryCacher, MemoryCacherConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
