// Service Broker Module
//
// INTENTION:
// The broker is the single entry point services and callers talk to. It owns
// the registry, resolves qualified action names to providers, builds the call
// Context, and fans emitted events out to every matching subscriber.
//
// ARCHITECTURAL PRINCIPLES:
// 1. Cheap Handles - ServiceBroker is a clone of shared Arcs; services and
//    contexts each keep their own handle
// 2. Lookup Before Context - An unknown action fails before any Context exists
// 3. No Translation - Handler results and errors reach the caller unchanged
// 4. One Matcher - `emit` and `emit_local` share the same dispatch path
//
// Lifecycle notifications (`register.service.<name>`,
// `register.action.<name>`) are emitted locally after the registry write has
// been published, so their handlers observe the new state.

use anyhow::Result;
use hive_common::logging::{Component, Logger};
use hive_common::routing::EventPattern;
use hive_common::{log_debug, log_error, log_info, log_warn};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cachers::Cacher;
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::services::action_catalog::{ActionDescriptor, ActionProvider};
use crate::services::load_balancing::LoadBalancingStrategy;
use crate::services::service_registry::ServiceRegistry;
use crate::services::{Context, EventContext, EventHandler, Service, ServiceFuture};

/// Prefix of the event emitted after a service is registered
pub const REGISTER_SERVICE_EVENT: &str = "register.service";
/// Prefix of the event emitted after an action is registered
pub const REGISTER_ACTION_EVENT: &str = "register.action";
/// Reserved for node discovery; never emitted by local registration
pub const REGISTER_NODE_EVENT: &str = "register.node";

/// Process-local service broker
#[derive(Clone)]
pub struct ServiceBroker {
    node_id: String,
    logger: Arc<Logger>,
    registry: Arc<ServiceRegistry>,
    cacher: Option<Arc<dyn Cacher>>,
    load_balancer: Arc<dyn LoadBalancingStrategy>,
    running: Arc<AtomicBool>,
}

impl fmt::Debug for ServiceBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBroker")
            .field("node_id", &self.node_id)
            .field("services", &self.registry.services().len())
            .field("cacher", &self.cacher.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ServiceBroker {
    /// Create a broker from its configuration
    ///
    /// Installs the logging configuration, if any, before anything is logged.
    pub fn new(config: BrokerConfig) -> Self {
        if let Some(logging_config) = &config.logging_config {
            logging_config.apply();
        }

        let logger = config
            .logger
            .clone()
            .unwrap_or_else(|| Arc::new(Logger::new_root(Component::Broker, &config.node_id)));
        let registry = Arc::new(ServiceRegistry::new(Arc::new(
            logger.with_component(Component::Registry),
        )));

        log_info!(logger, "Creating broker with config: {config}");

        Self {
            node_id: config.node_id.clone(),
            logger,
            registry,
            cacher: config.cacher.clone(),
            load_balancer: config.load_balancer(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// The attached cacher, if any
    pub fn cacher(&self) -> Option<Arc<dyn Cacher>> {
        self.cacher.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Call an action by its qualified name
    ///
    /// Fails with [`BrokerError::ActionNotFound`] when nothing provides `name`;
    /// the lookup happens before the returned future is polled.
    pub fn call(&self, action_name: &str, params: Value) -> ServiceFuture {
        self.dispatch(action_name, params, None)
    }

    /// Call an action as a child of `parent`
    pub fn call_with_parent(
        &self,
        action_name: &str,
        params: Value,
        parent: &Arc<Context>,
    ) -> ServiceFuture {
        self.dispatch(action_name, params, Some(parent.clone()))
    }

    fn dispatch(
        &self,
        action_name: &str,
        params: Value,
        parent: Option<Arc<Context>>,
    ) -> ServiceFuture {
        let provider = self
            .registry
            .get_action(action_name)
            .and_then(|entry| entry.get(self.load_balancer.as_ref()).cloned());

        let Some(provider) = provider else {
            log_warn!(self.logger, "No provider for action {action_name}");
            let error = BrokerError::ActionNotFound(action_name.to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        let mut ctx = Context::new(
            self.clone(),
            params,
            provider.descriptor.clone(),
            provider.service.clone(),
        );
        if let Some(parent) = parent {
            ctx = ctx.with_parent(parent);
        }
        log_debug!(
            self.logger,
            "Calling {action_name} (ctx {} level {})",
            ctx.id,
            ctx.level
        );

        (provider.descriptor.handler)(Arc::new(ctx))
    }

    /// Emit an event to every matching subscriber
    pub fn emit(&self, event_name: &str, args: &[Value]) {
        self.dispatch_event(event_name, args, false);
    }

    /// Emit a locally originated event to every matching subscriber
    pub fn emit_local(&self, event_name: &str, args: &[Value]) {
        self.dispatch_event(event_name, args, true);
    }

    fn dispatch_event(&self, event_name: &str, args: &[Value], is_local: bool) {
        let subscribers = self.registry.matching_subscribers(event_name);
        if subscribers.is_empty() {
            return;
        }
        log_debug!(
            self.logger,
            "Dispatching {event_name} to {} subscriber(s)",
            subscribers.len()
        );

        let ctx = EventContext::new(event_name, self.clone(), is_local, self.logger.clone());
        for subscription in subscribers {
            if let Err(e) = (subscription.handler)(&ctx, args) {
                log_error!(
                    self.logger,
                    "Event handler {} for {} failed: {e}",
                    subscription.id,
                    subscription.pattern
                );
            }
        }
    }

    /// Subscribe to an event name or wildcard pattern
    ///
    /// Returns the subscription id accepted by [`ServiceBroker::off`].
    pub fn on(&self, pattern: &str, handler: EventHandler) -> Result<String, BrokerError> {
        let parsed =
            EventPattern::new(pattern).map_err(|source| BrokerError::InvalidEventPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(self.subscribe(parsed, handler, None))
    }

    pub(crate) fn subscribe(
        &self,
        pattern: EventPattern,
        handler: EventHandler,
        owner: Option<String>,
    ) -> String {
        self.registry.subscribe(pattern, handler, owner)
    }

    /// Remove a subscription; returns whether it existed
    pub fn off(&self, subscription_id: &str) -> bool {
        self.registry.unsubscribe(subscription_id)
    }

    /// Exact-match lookup of a qualified action name
    pub fn has_action(&self, action_name: &str) -> bool {
        self.registry.has_action(action_name)
    }

    /// Descriptor of the provider `call` would select for `action_name`
    pub fn get_action(&self, action_name: &str) -> Option<Arc<ActionDescriptor>> {
        let entry = self.registry.get_action(action_name)?;
        entry
            .get(self.load_balancer.as_ref())
            .map(|provider| provider.descriptor.clone())
    }

    /// Number of providers registered for `action_name`
    pub fn provider_count(&self, action_name: &str) -> usize {
        self.registry
            .get_action(action_name)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Registered qualified action names, sorted
    pub fn action_names(&self) -> Vec<String> {
        self.registry.action_names()
    }

    /// Registered services in registration order
    pub fn services(&self) -> Vec<Arc<Service>> {
        self.registry
            .services()
            .into_iter()
            .map(|entry| entry.service.clone())
            .collect()
    }

    pub fn get_service(&self, name: &str) -> Option<Arc<Service>> {
        self.registry.get_service(name)
    }

    /// Add a service to the registry and announce it
    pub fn register_service(&self, service: Arc<Service>) -> Result<(), BrokerError> {
        let name = service.full_name().to_string();
        self.registry.register_service(service)?;
        self.emit_local(&format!("{REGISTER_SERVICE_EVENT}.{name}"), &[json!(name)]);
        Ok(())
    }

    /// Add `service` as a provider of `descriptor.name` and announce it
    pub fn register_action(&self, service: &Arc<Service>, descriptor: Arc<ActionDescriptor>) {
        let name = descriptor.name.clone();
        self.registry.register_action(ActionProvider {
            descriptor,
            service: service.clone(),
        });
        self.emit_local(
            &format!("{REGISTER_ACTION_EVENT}.{name}"),
            &[json!(service.full_name()), json!(name)],
        );
    }

    /// Remove a service, its action providers and its subscriptions
    pub fn unregister_service(&self, name: &str) -> Result<Arc<Service>, BrokerError> {
        self.registry.unregister_service(name)
    }

    /// Run every service's `started` hook in registration order
    ///
    /// A failing hook leaves that service in the `Error` state and does not
    /// stop the others.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            log_warn!(self.logger, "Broker already running");
            return Ok(());
        }
        log_info!(self.logger, "Starting broker...");

        for service in self.services() {
            if let Err(e) = service.start().await {
                log_error!(
                    self.logger,
                    "Failed to start service {}: {e}",
                    service.full_name()
                );
            }
        }

        log_info!(self.logger, "Broker started");
        Ok(())
    }

    /// Run every service's `stopped` hook in reverse registration order
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            log_warn!(self.logger, "Broker already stopped");
            return Ok(());
        }
        log_info!(self.logger, "Stopping broker...");

        for service in self.services().into_iter().rev() {
            if let Err(e) = service.stop().await {
                log_error!(
                    self.logger,
                    "Failed to stop service {}: {e}",
                    service.full_name()
                );
            }
        }

        log_info!(self.logger, "Broker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::event_handler;
    use hive_common::logging::{LogLevel, LoggingConfig};
    use std::sync::Mutex;

    fn broker() -> ServiceBroker {
        ServiceBroker::new(
            BrokerConfig::new("broker-unit")
                .with_logging_config(LoggingConfig::new().with_default_level(LogLevel::Off)),
        )
    }

    #[test]
    fn on_rejects_malformed_patterns() {
        let broker = broker();
        let handler = event_handler(|_ctx, _args| Ok(()));

        let err = broker.on("a..b", handler.clone()).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidEventPattern { .. }));
        let err = broker.on("a.**.b", handler).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidEventPattern { .. }));
    }

    #[test]
    fn event_context_reports_origin() {
        let broker = broker();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        broker
            .on(
                "user.*",
                event_handler(move |ctx, _args| {
                    sink.lock().unwrap().push((ctx.event_name.clone(), ctx.is_local()));
                    Ok(())
                }),
            )
            .unwrap();

        broker.emit("user.created", &[]);
        broker.emit_local("user.deleted", &[]);
        broker.emit("user.created.twice", &[]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("user.created".to_string(), false),
                ("user.deleted".to_string(), true),
            ]
        );
    }

    #[test]
    fn failing_handlers_do_not_stop_dispatch() {
        let broker = broker();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        broker
            .on("job.done", event_handler(|_ctx, _args| anyhow::bail!("boom")))
            .unwrap();
        broker
            .on(
                "job.done",
                event_handler(move |_ctx, _args| {
                    *counter.lock().unwrap() += 1;
                    Ok(())
                }),
            )
            .unwrap();

        broker.emit("job.done", &[]);
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
