// Logging utilities for the Hive broker
//
// This module provides a structured logging layer on top of the `log` facade:
// - Component-based structured logging
// - Node ID tracking through logger inheritance
// - Service, action and event path tracing
// - A small configuration type that installs `env_logger` as the sink

use log::LevelFilter;
use std::collections::HashMap;
use std::fmt::{self, Arguments, Display, Formatter};
use std::io::Write;

/// Predefined components for logging categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Broker,
    Registry,
    Service,
    Cacher,
    Custom(&'static str),
}

impl Component {
    /// Get the string representation of the component
    pub fn as_str(&self) -> &str {
        match self {
            Component::Broker => "Broker",
            Component::Registry => "Registry",
            Component::Service => "Service",
            Component::Cacher => "Cacher",
            Component::Custom(name) => name,
        }
    }
}

// Display helpers so the `*_args` variants never build an intermediate prefix String
struct ComponentPrefixDisplay<'a> {
    parent: Option<Component>,
    component: Component,
    service: Option<&'a str>,
}

impl Display for ComponentPrefixDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) if parent != Component::Broker => {
                write!(f, "{}.{}", parent.as_str(), self.component.as_str())?
            }
            _ => write!(f, "{}", self.component.as_str())?,
        }
        if let Some(service) = self.service {
            write!(f, ":{service}")?;
        }
        Ok(())
    }
}

struct MaybeTagDisplay<'a>(&'static str, Option<&'a str>);

impl Display for MaybeTagDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(path) = self.1 {
            write!(f, "|{}={path}", self.0)
        } else {
            Ok(())
        }
    }
}

/// A helper for creating component-specific loggers with node ID tracking
#[derive(Clone, Debug)]
pub struct Logger {
    /// Component this logger is for
    component: Component,
    /// Node ID of the broker that owns this logger
    node_id: String,
    /// Parent component for hierarchical logging (if any)
    parent_component: Option<Component>,
    /// Qualified service name, set for service-scoped loggers
    service_name: Option<String>,
    /// Action path for call tracing
    action_path: Option<String>,
    /// Event path for event subscription tracing
    event_path: Option<String>,
}

impl Logger {
    /// Create a new root logger for a specific component and node ID
    ///
    /// This should only be called by the broker (or a test harness); every
    /// other logger is derived from the root with the `with_*` methods.
    pub fn new_root(component: Component, node_id: &str) -> Self {
        Self {
            component,
            node_id: node_id.to_string(),
            parent_component: None,
            service_name: None,
            action_path: None,
            event_path: None,
        }
    }

    /// Create a child logger with the same node ID but different component
    pub fn with_component(&self, component: Component) -> Self {
        Self {
            component,
            node_id: self.node_id.clone(),
            parent_component: Some(self.component),
            service_name: self.service_name.clone(),
            action_path: self.action_path.clone(),
            event_path: self.event_path.clone(),
        }
    }

    /// Create a logger scoped to a service
    pub fn with_service_name(&self, name: impl Into<String>) -> Self {
        Self {
            service_name: Some(name.into()),
            ..self.clone()
        }
    }

    /// Create a logger with an action path
    /// This is used to track calls through the system
    pub fn with_action_path(&self, path: impl Into<String>) -> Self {
        Self {
            action_path: Some(path.into()),
            ..self.clone()
        }
    }

    /// Create a logger with an event path
    pub fn with_event_path(&self, path: impl Into<String>) -> Self {
        Self {
            event_path: Some(path.into()),
            ..self.clone()
        }
    }

    /// Get a reference to the node ID
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Get a reference to the action path if available
    pub fn action_path(&self) -> Option<&str> {
        self.action_path.as_deref()
    }

    /// Get a reference to the event path if available
    pub fn event_path(&self) -> Option<&str> {
        self.event_path.as_deref()
    }

    fn is_root(&self) -> bool {
        self.component == Component::Broker
            && self.parent_component.is_none()
            && self.service_name.is_none()
    }

    fn prefix(&self) -> ComponentPrefixDisplay<'_> {
        ComponentPrefixDisplay {
            parent: self.parent_component,
            component: self.component,
            service: self.service_name(),
        }
    }

    /// `log` record target for this logger: the innermost component's name
    ///
    /// `LoggingConfig` filters per component on the target, never on the
    /// rendered prefix.
    pub fn target(&self) -> &str {
        self.component.as_str()
    }

    fn log_args(&self, level: log::Level, args: Arguments) {
        if !log::log_enabled!(level) {
            return;
        }
        let target = self.target();
        // Skip the component prefix for the root broker logger to avoid redundancy
        if self.is_root() {
            log::log!(target: target, level, "[{}] {}", self.node_id, args);
            return;
        }
        let prefix = self.prefix();
        let action = MaybeTagDisplay("action", self.action_path());
        let event = MaybeTagDisplay("event", self.event_path());
        log::log!(
            target: target,
            level,
            "[{}][{prefix}{action}{event}] {}",
            self.node_id,
            args
        );
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Debug) {
            self.log_args(log::Level::Debug, format_args!("{}", message.into()));
        }
    }

    /// Log a debug message using fmt::Arguments (avoids allocating message String)
    pub fn debug_args(&self, args: Arguments) {
        self.log_args(log::Level::Debug, args);
    }

    /// Log an info message
    pub fn info(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Info) {
            self.log_args(log::Level::Info, format_args!("{}", message.into()));
        }
    }

    pub fn info_args(&self, args: Arguments) {
        self.log_args(log::Level::Info, args);
    }

    /// Log a warning message
    pub fn warn(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Warn) {
            self.log_args(log::Level::Warn, format_args!("{}", message.into()));
        }
    }

    pub fn warn_args(&self, args: Arguments) {
        self.log_args(log::Level::Warn, args);
    }

    /// Log an error message
    pub fn error(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Error) {
            self.log_args(log::Level::Error, format_args!("{}", message.into()));
        }
    }

    pub fn error_args(&self, args: Arguments) {
        self.log_args(log::Level::Error, args);
    }
}

/// Log levels understood by [`LoggingConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

/// Key used to override the level of a single component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKey {
    Broker,
    Registry,
    Service,
    Cacher,
    Custom(String),
}

impl ComponentKey {
    /// Key for a `log` record target produced by [`Logger::target`]
    pub fn from_target(target: &str) -> Self {
        match target {
            "Broker" => ComponentKey::Broker,
            "Registry" => ComponentKey::Registry,
            "Service" => ComponentKey::Service,
            "Cacher" => ComponentKey::Cacher,
            other => ComponentKey::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentKey::Broker => "Broker",
            ComponentKey::Registry => "Registry",
            ComponentKey::Service => "Service",
            ComponentKey::Cacher => "Cacher",
            ComponentKey::Custom(name) => name,
        }
    }
}

impl From<Component> for ComponentKey {
    fn from(component: Component) -> Self {
        match component {
            Component::Broker => ComponentKey::Broker,
            Component::Registry => ComponentKey::Registry,
            Component::Service => ComponentKey::Service,
            Component::Cacher => ComponentKey::Cacher,
            Component::Custom(name) => ComponentKey::Custom(name.to_string()),
        }
    }
}

/// Logging configuration applied by the broker at construction
///
/// The broker only writes through the `log` facade; `apply` installs
/// `env_logger` as the sink unless another logger is already installed.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub default_level: LogLevel,
    pub component_levels: HashMap<ComponentKey, LogLevel>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self {
            default_level: LogLevel::Info,
            component_levels: HashMap::new(),
            timestamps: true,
        }
    }

    pub fn default_info() -> Self {
        Self::new().with_default_level(LogLevel::Info)
    }

    pub fn with_default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Override the level for one component
    ///
    /// The override applies to records whose target is the component, i.e.
    /// to loggers whose innermost component it is. A `Cacher` logger derived
    /// from a `Service` logger follows the `Cacher` level only.
    pub fn with_component_level(mut self, component: ComponentKey, level: LogLevel) -> Self {
        self.component_levels.insert(component, level);
        self
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Most verbose level across defaults and overrides
    fn max_level(&self) -> LevelFilter {
        self.component_levels
            .values()
            .map(|l| l.to_level_filter())
            .chain(std::iter::once(self.default_level.to_level_filter()))
            .max()
            .unwrap_or(LevelFilter::Info)
    }

    /// Effective level for a `log` record target
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.component_levels
            .get(&ComponentKey::from_target(target))
            .map(|level| level.to_level_filter())
            .unwrap_or(self.default_level.to_level_filter())
    }

    /// Install the configuration
    ///
    /// Safe to call more than once; only the first successful installation wins.
    pub fn apply(&self) {
        let config = self.clone();
        let _ = env_logger::builder()
            .filter_level(self.max_level())
            .format(move |buf, record| {
                if record.level() > config.level_for(record.target()) {
                    return Ok(());
                }
                let message = record.args();
                if config.timestamps {
                    writeln!(
                        buf,
                        "{} {:<5} {}",
                        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                        record.level(),
                        message
                    )
                } else {
                    writeln!(buf, "{:<5} {}", record.level(), message)
                }
            })
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_loggers_keep_node_id_and_paths() {
        let root = Logger::new_root(Component::Broker, "node-1");
        let service = root
            .with_component(Component::Service)
            .with_service_name("posts");
        let action = service.with_action_path("posts.find");

        assert_eq!(action.node_id(), "node-1");
        assert_eq!(action.service_name(), Some("posts"));
        assert_eq!(action.action_path(), Some("posts.find"));
        assert_eq!(action.event_path(), None);
        assert_eq!(action.component(), Component::Service);
    }

    #[test]
    fn component_override_follows_the_innermost_component() {
        let config = LoggingConfig::new()
            .with_default_level(LogLevel::Warn)
            .with_component_level(ComponentKey::Cacher, LogLevel::Debug);

        let root = Logger::new_root(Component::Broker, "n1");
        let service = root
            .with_component(Component::Service)
            .with_service_name("posts");
        let cacher = service.with_component(Component::Cacher);

        assert_eq!(config.max_level(), LevelFilter::Debug);
        assert_eq!(config.level_for(cacher.target()), LevelFilter::Debug);
        assert_eq!(config.level_for(service.target()), LevelFilter::Warn);
        assert_eq!(config.level_for(root.target()), LevelFilter::Warn);
    }

    #[test]
    fn service_and_cacher_overrides_do_not_interfere() {
        let config = LoggingConfig::new()
            .with_default_level(LogLevel::Info)
            .with_component_level(ComponentKey::Service, LogLevel::Error)
            .with_component_level(ComponentKey::Cacher, LogLevel::Trace);

        let service = Logger::new_root(Component::Broker, "n1")
            .with_component(Component::Service)
            .with_service_name("posts");
        let cacher = service.with_component(Component::Cacher);

        for _ in 0..8 {
            assert_eq!(config.level_for(cacher.target()), LevelFilter::Trace);
            assert_eq!(config.level_for(service.target()), LevelFilter::Error);
        }
    }

    #[test]
    fn custom_components_and_foreign_targets() {
        let config = LoggingConfig::new()
            .with_component_level(ComponentKey::Custom("Gateway".into()), LogLevel::Off);
        let gateway = Logger::new_root(Component::Custom("Gateway"), "n1");

        assert_eq!(config.level_for(gateway.target()), LevelFilter::Off);
        assert_eq!(config.level_for("hyper::client"), LevelFilter::Info);
    }
}
