// EventContext Module
//
// INTENTION:
// Give event handlers the emitted event name, whether it originated locally,
// the owning service (for schema-declared subscriptions) and a way back into
// the broker to call actions or emit follow-up events.

use hive_common::logging::Logger;
use hive_common::{log_debug, log_error, log_info, log_warn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::broker::ServiceBroker;
use crate::services::{Service, ServiceFuture};

/// Context for handling events
#[derive(Clone)]
pub struct EventContext {
    /// Name the event was emitted with
    pub event_name: String,
    /// Service the subscription belongs to; `None` for plain `on` subscribers
    pub service: Option<Arc<Service>>,
    /// Logger instance specific to this context
    pub logger: Arc<Logger>,
    broker: ServiceBroker,
    is_local: bool,
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("event_name", &self.event_name)
            .field("service", &self.service.as_ref().map(|s| s.full_name()))
            .field("is_local", &self.is_local)
            .finish()
    }
}

impl EventContext {
    pub fn new(
        event_name: &str,
        broker: ServiceBroker,
        is_local: bool,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            event_name: event_name.to_string(),
            service: None,
            logger: Arc::new(logger.with_event_path(event_name)),
            broker,
            is_local,
        }
    }

    /// Copy of this context bound to the subscribing service
    pub fn for_service(&self, service: Arc<Service>) -> Self {
        Self {
            logger: Arc::new(service.logger.with_event_path(self.event_name.clone())),
            service: Some(service),
            ..self.clone()
        }
    }

    /// Whether the event came in through `emit_local`
    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn broker(&self) -> &ServiceBroker {
        &self.broker
    }

    /// Call an action from within an event handler
    pub fn call(&self, action_name: &str, params: Value) -> ServiceFuture {
        log_debug!(self.logger, "Event handler calling {action_name}");
        self.broker.call(action_name, params)
    }

    pub fn emit(&self, event_name: &str, args: &[Value]) {
        self.broker.emit(event_name, args);
    }

    pub fn emit_local(&self, event_name: &str, args: &[Value]) {
        self.broker.emit_local(event_name, args);
    }

    pub fn debug(&self, message: impl Into<String>) {
        log_debug!(self.logger, "{}", message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        log_info!(self.logger, "{}", message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        log_warn!(self.logger, "{}", message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        log_error!(self.logger, "{}", message.into());
    }
}
