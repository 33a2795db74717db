// Service Module
//
// INTENTION:
// Build a runtime Service from a ServiceSchema and register it with a broker.
// Construction validates the whole schema first and only then touches the
// broker, so a rejected schema leaves no trace in any registry.
//
// ARCHITECTURAL PRINCIPLES:
// 1. All-Or-Nothing Construction - Every validation error is raised before
//    the first registration
// 2. Bound Once - Action handlers, methods and event handlers are bound to the
//    service when it is built; nothing is rebound at call time
// 3. Explicit Ownership - Descriptors point back at the service weakly; the
//    registry holds the strong references

use anyhow::Result;
use hive_common::logging::{Component, Logger};
use hive_common::routing::EventPattern;
use hive_common::{log_debug, log_error, log_info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::broker::ServiceBroker;
use crate::cachers::{caching_wrapper, should_cache};
use crate::error::BrokerError;
use crate::services::action_catalog::ActionDescriptor;
use crate::services::schema::ServiceSchema;
use crate::services::{Context, EventContext, EventHandler, MethodHandler, ServiceFuture};

/// Lifecycle state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Built and registered, `started` not run yet
    Created,
    /// `started` completed
    Running,
    /// `stopped` completed
    Stopped,
    /// A lifecycle hook failed
    Error,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Created => write!(f, "Created"),
            ServiceState::Running => write!(f, "Running"),
            ServiceState::Stopped => write!(f, "Stopped"),
            ServiceState::Error => write!(f, "Error"),
        }
    }
}

/// A service registered with a broker
pub struct Service {
    full_name: String,
    schema: ServiceSchema,
    /// Declaration order
    actions: Vec<(String, Arc<ActionDescriptor>)>,
    /// Logger scoped to this service
    pub logger: Arc<Logger>,
    broker: ServiceBroker,
    state: RwLock<ServiceState>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.full_name)
            .field("actions", &self.action_names())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`Service`]
///
/// Both parts are required; `build` reports whichever is missing first.
#[derive(Default)]
pub struct ServiceBuilder {
    broker: Option<ServiceBroker>,
    schema: Option<ServiceSchema>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broker(mut self, broker: &ServiceBroker) -> Self {
        self.broker = Some(broker.clone());
        self
    }

    pub fn schema(mut self, schema: ServiceSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> Result<Arc<Service>, BrokerError> {
        let broker = self.broker.ok_or(BrokerError::MissingBroker)?;
        let schema = self.schema.ok_or(BrokerError::MissingSchema)?;
        Service::construct(broker, schema)
    }
}

/// Qualified service name: `v<version>.<name>` or `<name>`
fn qualified_name(schema: &ServiceSchema) -> String {
    match &schema.version {
        Some(version) => format!("v{version}.{}", schema.name),
        None => schema.name.clone(),
    }
}

impl Service {
    /// Build a service from `schema` and register it with `broker`
    pub fn new(broker: &ServiceBroker, schema: ServiceSchema) -> Result<Arc<Self>, BrokerError> {
        Self::construct(broker.clone(), schema)
    }

    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    fn construct(broker: ServiceBroker, schema: ServiceSchema) -> Result<Arc<Self>, BrokerError> {
        if schema.name.is_empty() {
            return Err(BrokerError::MissingName);
        }

        let handlers = schema
            .actions
            .iter()
            .map(|(name, def)| {
                def.handler()
                    .cloned()
                    .ok_or_else(|| BrokerError::MissingActionHandler {
                        action: name.clone(),
                        service: schema.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let subscriptions = schema
            .events
            .iter()
            .map(|(pattern, def)| -> Result<_, BrokerError> {
                let handler =
                    def.handler()
                        .cloned()
                        .ok_or_else(|| BrokerError::MissingEventHandler {
                            event: pattern.clone(),
                            service: schema.name.clone(),
                        })?;
                let pattern = EventPattern::new(pattern).map_err(|source| {
                    BrokerError::InvalidEventPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })?;
                Ok((pattern, handler))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let full_name = qualified_name(&schema);
        let logger = Arc::new(
            broker
                .logger()
                .with_component(Component::Service)
                .with_service_name(full_name.clone()),
        );
        let cacher = broker.cacher();
        let service_cache = schema.cache_setting();

        let service = Arc::new_cyclic(|weak: &Weak<Service>| {
            let actions = schema
                .actions
                .iter()
                .zip(handlers)
                .map(|((short_name, def), handler)| {
                    let cache = should_cache(service_cache, def.cache());
                    let (handler, wrapped) = match (&cacher, cache) {
                        (Some(cacher), true) => {
                            let action_name = format!("{full_name}.{short_name}");
                            let cache_logger =
                                Arc::new(logger.with_component(Component::Cacher));
                            (
                                caching_wrapper(cacher.clone(), cache_logger, &action_name, handler),
                                true,
                            )
                        }
                        _ => (handler, false),
                    };
                    let descriptor =
                        ActionDescriptor::new(short_name, &full_name, handler, weak.clone())
                            .with_cache(cache, wrapped)
                            .with_description(def.description().map(str::to_string));
                    (short_name.clone(), Arc::new(descriptor))
                })
                .collect();

            Service {
                full_name: full_name.clone(),
                schema,
                actions,
                logger: logger.clone(),
                broker: broker.clone(),
                state: RwLock::new(ServiceState::Created),
            }
        });

        broker.register_service(service.clone())?;

        for (_, descriptor) in &service.actions {
            broker.register_action(&service, descriptor.clone());
        }

        for (pattern, handler) in subscriptions {
            let weak = Arc::downgrade(&service);
            let bound: EventHandler =
                Arc::new(move |ctx: &EventContext, args: &[Value]| -> Result<()> {
                    match weak.upgrade() {
                        Some(service) => handler(&ctx.for_service(service), args),
                        None => Ok(()),
                    }
                });
            broker.subscribe(pattern, bound, Some(full_name.clone()));
        }

        if let Some(created) = &service.schema.created {
            created(&service);
        }

        log_info!(
            service.logger,
            "Service created with {} action(s)",
            service.actions.len()
        );
        Ok(service)
    }

    /// Name as declared in the schema
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn version(&self) -> Option<&str> {
        self.schema.version.as_deref()
    }

    /// Qualified name the service is registered under
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.schema.settings
    }

    pub fn schema(&self) -> &ServiceSchema {
        &self.schema
    }

    pub fn broker(&self) -> &ServiceBroker {
        &self.broker
    }

    /// Descriptor of an action by its short name
    pub fn action(&self, short_name: &str) -> Option<&Arc<ActionDescriptor>> {
        self.actions
            .iter()
            .find(|(name, _)| name == short_name)
            .map(|(_, descriptor)| descriptor)
    }

    /// Short action names in declaration order
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Invoke one of this service's actions directly
    ///
    /// Skips the broker lookup: a fresh root Context is built with `params`
    /// verbatim and the effective (possibly cache-wrapped) handler is run.
    pub fn call_action(self: &Arc<Self>, short_name: &str, params: Value) -> ServiceFuture {
        let Some(descriptor) = self.action(short_name).cloned() else {
            let name = format!("{}.{short_name}", self.full_name);
            return Box::pin(async move { Err(BrokerError::ActionNotFound(name).into()) });
        };
        log_debug!(self.logger, "Direct call to {}", descriptor.name);
        let ctx = Context::new(self.broker.clone(), params, descriptor.clone(), self.clone());
        (descriptor.handler)(Arc::new(ctx))
    }

    /// Invoke a schema method bound to this service
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method: &MethodHandler = self
            .schema
            .methods
            .iter()
            .find(|(method, _)| method == name)
            .map(|(_, handler)| handler)
            .ok_or_else(|| BrokerError::MethodNotFound {
                method: name.to_string(),
                service: self.full_name.clone(),
            })?;
        method(self, args)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.schema.methods.iter().any(|(method, _)| method == name)
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Run the `started` hook and move to `Running`
    pub(crate) async fn start(self: &Arc<Self>) -> Result<()> {
        if let Some(started) = self.schema.started.clone() {
            if let Err(e) = started(self.clone()).await {
                log_error!(self.logger, "Failed to start service: {e}");
                self.set_state(ServiceState::Error);
                return Err(e);
            }
        }
        self.set_state(ServiceState::Running);
        log_info!(self.logger, "Service started");
        Ok(())
    }

    /// Run the `stopped` hook and move to `Stopped`
    pub(crate) async fn stop(self: &Arc<Self>) -> Result<()> {
        if let Some(stopped) = self.schema.stopped.clone() {
            if let Err(e) = stopped(self.clone()).await {
                log_error!(self.logger, "Failed to stop service: {e}");
                self.set_state(ServiceState::Error);
                return Err(e);
            }
        }
        self.set_state(ServiceState::Stopped);
        log_info!(self.logger, "Service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::services::action_handler;
    use serde_json::json;

    fn broker() -> ServiceBroker {
        ServiceBroker::new(BrokerConfig::new("service-test").with_logging_config(
            hive_common::logging::LoggingConfig::new()
                .with_default_level(hive_common::logging::LogLevel::Off),
        ))
    }

    #[test]
    fn versioned_services_qualify_their_actions() {
        let broker = broker();
        let schema = ServiceSchema::new("posts").with_version(2).with_action(
            "find",
            action_handler(|_ctx| async move { Ok(json!([])) }),
        );
        let service = Service::new(&broker, schema).unwrap();

        assert_eq!(service.name(), "posts");
        assert_eq!(service.version(), Some("2"));
        assert_eq!(service.full_name(), "v2.posts");
        assert!(broker.has_action("v2.posts.find"));
        assert!(!broker.has_action("posts.find"));
    }

    #[test]
    fn builder_reports_missing_parts() {
        let err = Service::builder()
            .schema(ServiceSchema::new("posts"))
            .build()
            .unwrap_err();
        assert_eq!(err, BrokerError::MissingBroker);

        let broker = broker();
        let err = Service::builder().broker(&broker).build().unwrap_err();
        assert_eq!(err, BrokerError::MissingSchema);
    }

    #[test]
    fn fresh_service_is_created() {
        let broker = broker();
        let service = Service::new(&broker, ServiceSchema::new("empty")).unwrap();
        assert_eq!(service.state(), ServiceState::Created);
        assert!(service.action_names().is_empty());
        assert_eq!(service.state().to_string(), "Created");
    }
}
