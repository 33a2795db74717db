// Service Schema Module
//
// INTENTION:
// Describe a service declaratively: its name, optional version, free-form
// settings, actions, methods, event subscriptions and lifecycle hooks. A
// schema carries no runtime state; `Service` is built from it.

use serde_json::{Map, Value};
use std::fmt;

use crate::services::{
    ActionHandler, CreatedHook, EventHandler, LifecycleHook, MethodHandler,
};

/// Options for a single action
///
/// `cache` stays `None` when the action doesn't say, so the service-level
/// `settings.cache` flag can decide.
#[derive(Clone, Default)]
pub struct ActionOptions {
    pub cache: Option<bool>,
    pub handler: Option<ActionHandler>,
    pub description: Option<String>,
}

impl ActionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_handler(mut self, handler: ActionHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An action entry: a bare handler or a descriptor with options
#[derive(Clone)]
pub enum ActionDef {
    Handler(ActionHandler),
    Descriptor(ActionOptions),
}

impl ActionDef {
    /// The callable behind this entry, if any
    pub fn handler(&self) -> Option<&ActionHandler> {
        match self {
            ActionDef::Handler(handler) => Some(handler),
            ActionDef::Descriptor(options) => options.handler.as_ref(),
        }
    }

    /// Action-level cache flag; bare handlers never set one
    pub fn cache(&self) -> Option<bool> {
        match self {
            ActionDef::Handler(_) => None,
            ActionDef::Descriptor(options) => options.cache,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ActionDef::Handler(_) => None,
            ActionDef::Descriptor(options) => options.description.as_deref(),
        }
    }
}

impl From<ActionHandler> for ActionDef {
    fn from(handler: ActionHandler) -> Self {
        ActionDef::Handler(handler)
    }
}

impl From<ActionOptions> for ActionDef {
    fn from(options: ActionOptions) -> Self {
        ActionDef::Descriptor(options)
    }
}

/// An event entry: a bare handler or a descriptor whose handler may be missing
#[derive(Clone)]
pub enum EventDef {
    Handler(EventHandler),
    Descriptor { handler: Option<EventHandler> },
}

impl EventDef {
    pub fn handler(&self) -> Option<&EventHandler> {
        match self {
            EventDef::Handler(handler) => Some(handler),
            EventDef::Descriptor { handler } => handler.as_ref(),
        }
    }
}

impl From<EventHandler> for EventDef {
    fn from(handler: EventHandler) -> Self {
        EventDef::Handler(handler)
    }
}

/// Declarative definition of a service
///
/// Entries keep their declaration order; declaring the same action, method or
/// event name twice replaces the earlier entry.
#[derive(Clone, Default)]
pub struct ServiceSchema {
    pub name: String,
    pub version: Option<String>,
    pub settings: Map<String, Value>,
    pub actions: Vec<(String, ActionDef)>,
    pub methods: Vec<(String, MethodHandler)>,
    pub events: Vec<(String, EventDef)>,
    pub created: Option<CreatedHook>,
    pub started: Option<LifecycleHook>,
    pub stopped: Option<LifecycleHook>,
}

fn upsert<T>(entries: &mut Vec<(String, T)>, name: String, value: T) {
    match entries.iter_mut().find(|(existing, _)| *existing == name) {
        Some(entry) => entry.1 = value,
        None => entries.push((name, value)),
    }
}

impl ServiceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl ToString) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Replace the settings map
    ///
    /// Non-object values are ignored, leaving the settings empty.
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = match settings {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, action: impl Into<ActionDef>) -> Self {
        upsert(&mut self.actions, name.into(), action.into());
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, method: MethodHandler) -> Self {
        upsert(&mut self.methods, name.into(), method);
        self
    }

    pub fn with_event(mut self, pattern: impl Into<String>, event: impl Into<EventDef>) -> Self {
        upsert(&mut self.events, pattern.into(), event.into());
        self
    }

    pub fn with_created(mut self, hook: CreatedHook) -> Self {
        self.created = Some(hook);
        self
    }

    pub fn with_started(mut self, hook: LifecycleHook) -> Self {
        self.started = Some(hook);
        self
    }

    pub fn with_stopped(mut self, hook: LifecycleHook) -> Self {
        self.stopped = Some(hook);
        self
    }

    /// Service-level `settings.cache` flag, if it is a boolean
    pub fn cache_setting(&self) -> Option<bool> {
        self.settings.get("cache").and_then(Value::as_bool)
    }
}

impl fmt::Debug for ServiceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |entries: Vec<&String>| entries.into_iter().cloned().collect::<Vec<_>>();
        f.debug_struct("ServiceSchema")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("settings", &self.settings)
            .field("actions", &names(self.actions.iter().map(|(n, _)| n).collect()))
            .field("methods", &names(self.methods.iter().map(|(n, _)| n).collect()))
            .field("events", &names(self.events.iter().map(|(n, _)| n).collect()))
            .field("created", &self.created.is_some())
            .finish()
    }
}
