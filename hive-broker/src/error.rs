//! Broker error kinds.
//!
//! Construction errors are returned before anything reaches the registry.
//! `ActionNotFound` is returned by call lookup before a context exists. Errors
//! raised inside handlers are never wrapped in a `BrokerError`.

use hive_common::routing::PatternError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Must to set a ServiceBroker instance!")]
    MissingBroker,

    #[error("Must pass a service schema in constructor!")]
    MissingSchema,

    #[error("Service name can't be empty!")]
    MissingName,

    #[error("Missing action handler on '{action}' action in '{service}' service!")]
    MissingActionHandler { action: String, service: String },

    #[error("Missing event handler on '{event}' event in '{service}' service!")]
    MissingEventHandler { event: String, service: String },

    #[error("Invalid event pattern '{pattern}': {source}")]
    InvalidEventPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("Action '{0}' is not registered!")]
    ActionNotFound(String),

    #[error("Service '{name}' is already registered!")]
    DuplicateService { name: String },

    #[error("Missing method '{method}' in '{service}' service!")]
    MethodNotFound { method: String, service: String },

    #[error("Service '{0}' is not registered!")]
    ServiceNotFound(String),

    #[error("Subscription '{0}' is not registered!")]
    SubscriptionNotFound(String),
}

impl BrokerError {
    /// Recover a broker error carried inside an `anyhow::Error`
    pub fn from_anyhow(error: &anyhow::Error) -> Option<&BrokerError> {
        error.downcast_ref::<BrokerError>()
    }
}
