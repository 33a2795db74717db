// Context Module
//
// INTENTION:
// A Context represents one in-flight action call. It carries the caller's
// params, the action being invoked, the owning service and, for nested calls,
// the context that issued the call. Handlers make further calls through the
// context so the chain stays traceable.
//
// ARCHITECTURAL PRINCIPLE:
// Each call creates exactly one new Context that points at its immediate
// parent, so the chain is a simple linked list and never a cycle.

use hive_common::logging::Logger;
use hive_common::{log_debug, log_error, log_info, log_warn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::broker::ServiceBroker;
use crate::services::action_catalog::ActionDescriptor;
use crate::services::{Service, ServiceFuture};

/// Per-call state handed to action handlers
pub struct Context {
    /// Unique id of this call
    pub id: String,
    /// Payload passed by the caller, verbatim
    pub params: Value,
    /// The action being invoked
    pub action: Arc<ActionDescriptor>,
    /// The service that owns the action
    pub service: Arc<Service>,
    /// The context that issued this call, if nested
    pub parent: Option<Arc<Context>>,
    /// Depth in the call chain; a root call is level 1
    pub level: usize,
    /// Logger scoped to the action
    pub logger: Arc<Logger>,
    broker: ServiceBroker,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("action", &self.action.name)
            .field("service", &self.service.full_name())
            .field("params", &self.params)
            .field("parent", &self.parent.as_ref().map(|p| p.id.as_str()))
            .field("level", &self.level)
            .finish()
    }
}

impl Context {
    /// Create a root context for an action call
    pub fn new(
        broker: ServiceBroker,
        params: Value,
        action: Arc<ActionDescriptor>,
        service: Arc<Service>,
    ) -> Self {
        let logger = Arc::new(service.logger.with_action_path(action.name.clone()));
        Self {
            id: Uuid::new_v4().to_string(),
            params,
            action,
            service,
            parent: None,
            level: 1,
            logger,
            broker,
        }
    }

    /// Attach the context that issued this call
    pub fn with_parent(mut self, parent: Arc<Context>) -> Self {
        self.level = parent.level + 1;
        self.parent = Some(parent);
        self
    }

    pub fn broker(&self) -> &ServiceBroker {
        &self.broker
    }

    /// Call another action as a child of this context
    ///
    /// The nested Context's `parent` is this context.
    pub fn call(self: &Arc<Self>, action_name: &str, params: Value) -> ServiceFuture {
        log_debug!(self.logger, "Nested call to {action_name}");
        self.broker.call_with_parent(action_name, params, self)
    }

    /// Emit an event through the broker
    pub fn emit(&self, event_name: &str, args: &[Value]) {
        self.broker.emit(event_name, args);
    }

    /// Emit a locally originated event through the broker
    pub fn emit_local(&self, event_name: &str, args: &[Value]) {
        self.broker.emit_local(event_name, args);
    }

    /// Return `data` unchanged
    ///
    /// Handlers end with `Ok(ctx.result(data))` so result post-processing has
    /// a single place to live.
    pub fn result(&self, data: Value) -> Value {
        data
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
