// Services Module
//
// INTENTION:
// This module defines the service side of the broker: the declarative schema a
// service is built from, the runtime Service, the per-call contexts handed to
// handlers, and the registry the broker dispatches through.
//
// ARCHITECTURAL PRINCIPLES:
// 1. Declare Once - A service is described by a ServiceSchema and validated
//    eagerly; construction is all-or-nothing
// 2. Explicit Receivers - Handlers receive their Context (and through it the
//    owning Service) as a parameter, never through implicit binding
// 3. Transparent Interception - Caching wraps an ActionHandler without the
//    handler knowing about it
// 4. Read-Mostly Registry - Dispatch reads immutable snapshots; only
//    registration takes the writer lock

// Module declarations
pub mod action_catalog;
pub mod event_context;
pub mod load_balancing;
pub mod request_context;
pub mod schema;
pub mod service;
pub mod service_registry;

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// Re-export the context types from their dedicated modules
pub use crate::services::event_context::EventContext;
pub use crate::services::request_context::Context;
pub use crate::services::service::Service;

/// Future returned by action handlers and broker calls
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Handler for a service action
///
/// INTENTION: Define the signature for a function that handles a service action.
/// The handler receives the call Context (params, action, owning service,
/// parent) and resolves to the action's result.
pub type ActionHandler = Arc<dyn Fn(Arc<Context>) -> ServiceFuture + Send + Sync>;

/// Handler for an event subscription
///
/// Called synchronously with the emitted arguments. Errors are logged by the
/// broker and never reach the emitter.
pub type EventHandler = Arc<dyn Fn(&EventContext, &[Value]) -> Result<()> + Send + Sync>;

/// Plain service method, bound to the owning service at construction
pub type MethodHandler = Arc<dyn Fn(&Service, &[Value]) -> Result<Value> + Send + Sync>;

/// Synchronous `created` hook
pub type CreatedHook = Arc<dyn Fn(&Service) + Send + Sync>;

/// Asynchronous `started` / `stopped` hook
pub type LifecycleHook =
    Arc<dyn Fn(Arc<Service>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Build an [`ActionHandler`] from an async closure
pub fn action_handler<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |ctx: Arc<Context>| -> ServiceFuture { Box::pin(f(ctx)) })
}

/// Build an [`EventHandler`] from a closure
pub fn event_handler<F>(f: F) -> EventHandler
where
    F: Fn(&EventContext, &[Value]) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build an [`EventHandler`] that runs an async body on the tokio runtime
///
/// The broker never awaits event handlers; the spawned task's error is logged
/// through the event context's logger. Emitting outside a tokio runtime makes
/// the handler return an error, which the broker logs like any other handler
/// failure.
pub fn spawn_event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(EventContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx: &EventContext, args: &[Value]| -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            anyhow!(
                "Async handler for '{}' needs a tokio runtime: {e}",
                ctx.event_name
            )
        })?;
        let ctx = ctx.clone();
        let logger = ctx.logger.clone();
        let fut = f(ctx, args.to_vec());
        runtime.spawn(async move {
            if let Err(e) = fut.await {
                logger.error(format!("Async event handler failed: {e}"));
            }
        });
        Ok(())
    })
}

/// Build a [`MethodHandler`] from a closure
pub fn method_handler<F>(f: F) -> MethodHandler
where
    F: Fn(&Service, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a [`LifecycleHook`] from an async closure
pub fn lifecycle_hook<F, Fut>(f: F) -> LifecycleHook
where
    F: Fn(Arc<Service>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(
        move |service: Arc<Service>| -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
            Box::pin(f(service))
        },
    )
}
