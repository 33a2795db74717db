// Service Registry Module
//
// INTENTION:
// Hold everything the broker dispatches through: registered services, the
// action catalog (qualified name -> providers) and the event subscription
// table (subscriptions in insertion order). The registry never invokes a
// handler; calling and emitting are the broker's job.
//
// ARCHITECTURAL PRINCIPLES:
// 1. Copy-On-Write - Readers load an immutable snapshot without locking
// 2. Single Writer - Every mutation runs under one writer lock, builds a new
//    snapshot and swaps it in; a failed mutation publishes nothing
// 3. Ordered Dispatch - Matching subscribers are returned in the order they
//    subscribed, whatever their pattern

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use hive_common::logging::Logger;
use hive_common::routing::EventPattern;
use hive_common::{log_debug, log_info};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::error::BrokerError;
use crate::services::action_catalog::{ActionCatalogEntry, ActionProvider};
use crate::services::{EventHandler, Service};

#[derive(Clone)]
pub struct ServiceEntry {
    /// The service instance
    pub service: Arc<Service>,
    /// When the service was registered
    pub registered_at: DateTime<Utc>,
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.service.full_name())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// One event subscription
pub struct EventSubscription {
    pub id: String,
    pub pattern: EventPattern,
    pub handler: EventHandler,
    /// Qualified name of the owning service, if declared by a schema
    pub owner: Option<String>,
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern.as_str())
            .field("owner", &self.owner)
            .finish()
    }
}

#[derive(Clone, Default)]
struct RegistrySnapshot {
    /// Registration order
    services: Vec<Arc<ServiceEntry>>,
    actions: HashMap<String, Arc<ActionCatalogEntry>>,
    /// Insertion order
    subscriptions: Vec<Arc<EventSubscription>>,
}

/// Registry of services, actions and event subscriptions
pub struct ServiceRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
    write_lock: Mutex<()>,
    logger: Arc<Logger>,
}

impl ServiceRegistry {
    /// Create a new registry with a provided logger
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
            write_lock: Mutex::new(()),
            logger,
        }
    }

    /// Run one mutation under the writer lock
    ///
    /// The new snapshot is only published when `mutate` succeeds.
    fn update<R>(
        &self,
        mutate: impl FnOnce(&mut RegistrySnapshot) -> Result<R, BrokerError>,
    ) -> Result<R, BrokerError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = RegistrySnapshot::clone(&self.snapshot.load());
        let result = mutate(&mut next)?;
        self.snapshot.store(Arc::new(next));
        Ok(result)
    }

    /// Run a mutation that cannot fail under the writer lock
    fn update_with<R>(&self, mutate: impl FnOnce(&mut RegistrySnapshot) -> R) -> R {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = RegistrySnapshot::clone(&self.snapshot.load());
        let result = mutate(&mut next);
        self.snapshot.store(Arc::new(next));
        result
    }

    /// Register a service under its qualified name
    ///
    /// A second service with the same name and version is rejected.
    pub fn register_service(&self, service: Arc<Service>) -> Result<(), BrokerError> {
        let name = service.full_name().to_string();
        self.update(|snapshot| {
            if snapshot
                .services
                .iter()
                .any(|entry| entry.service.full_name() == name)
            {
                return Err(BrokerError::DuplicateService { name: name.clone() });
            }
            snapshot.services.push(Arc::new(ServiceEntry {
                service,
                registered_at: Utc::now(),
            }));
            Ok(())
        })?;
        log_info!(self.logger, "Registered service: {name}");
        Ok(())
    }

    /// Remove a service with its action providers and subscriptions
    pub fn unregister_service(&self, name: &str) -> Result<Arc<Service>, BrokerError> {
        let removed = self.update(|snapshot| {
            let index = snapshot
                .services
                .iter()
                .position(|entry| entry.service.full_name() == name)
                .ok_or_else(|| BrokerError::ServiceNotFound(name.to_string()))?;
            let entry = snapshot.services.remove(index);

            snapshot.actions = snapshot
                .actions
                .iter()
                .filter_map(|(action, catalog)| {
                    catalog
                        .without_service(name)
                        .map(|rest| (action.clone(), Arc::new(rest)))
                })
                .collect();

            snapshot
                .subscriptions
                .retain(|sub| sub.owner.as_deref() != Some(name));

            Ok(entry.service.clone())
        })?;
        log_info!(self.logger, "Unregistered service: {name}");
        Ok(removed)
    }

    /// Add a provider to the catalog entry for its action name
    pub fn register_action(&self, provider: ActionProvider) {
        let name = provider.descriptor.name.clone();
        self.update_with(|snapshot| {
            let entry = match snapshot.actions.get(&name) {
                Some(existing) => existing.with_provider(provider),
                None => ActionCatalogEntry::new(name.clone(), provider),
            };
            snapshot.actions.insert(name.clone(), Arc::new(entry));
        });
        log_debug!(self.logger, "Registered action: {name}");
    }

    /// Exact lookup of a qualified action name
    pub fn get_action(&self, name: &str) -> Option<Arc<ActionCatalogEntry>> {
        self.snapshot.load().actions.get(name).cloned()
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.snapshot.load().actions.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.load().actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_service(&self, name: &str) -> Option<Arc<Service>> {
        self.snapshot
            .load()
            .services
            .iter()
            .find(|entry| entry.service.full_name() == name)
            .map(|entry| entry.service.clone())
    }

    /// Registered services in registration order
    pub fn services(&self) -> Vec<Arc<ServiceEntry>> {
        self.snapshot.load().services.clone()
    }

    /// Add a subscriber for `pattern`, returning its subscription id
    pub fn subscribe(
        &self,
        pattern: EventPattern,
        handler: EventHandler,
        owner: Option<String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        log_debug!(self.logger, "Subscribing {id} to {pattern}");
        let subscription = Arc::new(EventSubscription {
            id: id.clone(),
            pattern,
            handler,
            owner,
        });
        self.update_with(|snapshot| snapshot.subscriptions.push(subscription));
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.update(|snapshot| {
            let before = snapshot.subscriptions.len();
            snapshot.subscriptions.retain(|sub| sub.id != id);
            if snapshot.subscriptions.len() == before {
                return Err(BrokerError::SubscriptionNotFound(id.to_string()));
            }
            Ok(())
        })
        .is_ok()
    }

    /// Subscribers whose pattern matches `event_name`, in dispatch order
    pub fn matching_subscribers(&self, event_name: &str) -> Vec<Arc<EventSubscription>> {
        self.snapshot
            .load()
            .subscriptions
            .iter()
            .filter(|sub| sub.pattern.matches(event_name))
            .cloned()
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.snapshot.load().subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::event_handler;
    use hive_common::logging::Component;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(Arc::new(Logger::new_root(Component::Registry, "test")))
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        event_handler(move |_ctx, _args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn matches_in_insertion_order_across_patterns() {
        let registry = registry();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = registry.subscribe(
            EventPattern::new("request.rest.**").unwrap(),
            counting_handler(counter.clone()),
            None,
        );
        let second = registry.subscribe(
            EventPattern::new("request.*.posts").unwrap(),
            counting_handler(counter.clone()),
            None,
        );
        let third = registry.subscribe(
            EventPattern::new("request.rest.**").unwrap(),
            counting_handler(counter),
            Some("posts".into()),
        );

        let matched: Vec<String> = registry
            .matching_subscribers("request.rest.posts")
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(matched, vec![first, second, third]);

        assert_eq!(registry.matching_subscribers("request.rest").len(), 2);
        assert!(registry.matching_subscribers("request.other").is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_the_given_id() {
        let registry = registry();
        let counter = Arc::new(AtomicUsize::new(0));
        let pattern = EventPattern::new("user.created").unwrap();

        let a = registry.subscribe(pattern.clone(), counting_handler(counter.clone()), None);
        let b = registry.subscribe(pattern, counting_handler(counter), None);

        assert!(registry.unsubscribe(&a));
        assert!(!registry.unsubscribe(&a));
        let left = registry.matching_subscribers("user.created");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, b);

        assert!(registry.unsubscribe(&b));
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn every_subscribe_is_published() {
        let registry = registry();
        let counter = Arc::new(AtomicUsize::new(0));

        let ids: Vec<String> = (0..3)
            .map(|_| {
                registry.subscribe(
                    EventPattern::new("job.*").unwrap(),
                    counting_handler(counter.clone()),
                    None,
                )
            })
            .collect();

        assert_eq!(registry.subscription_count(), 3);
        let matched: Vec<String> = registry
            .matching_subscribers("job.done")
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(matched, ids);
    }

    #[test]
    fn unknown_names_are_absent() {
        let registry = registry();
        assert!(!registry.has_action("posts.find"));
        assert!(registry.get_action("posts.find").is_none());
        assert!(registry.action_names().is_empty());
        assert!(matches!(
            registry.unregister_service("posts"),
            Err(BrokerError::ServiceNotFound(_))
        ));
    }
}
