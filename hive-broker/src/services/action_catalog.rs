// Action Catalog Module
//
// The registry maps a qualified action name to an ActionCatalogEntry: the
// ordered list of providers (one per registering service) for that name.
// Entries are immutable; registration builds a new entry and swaps it in.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::services::load_balancing::LoadBalancingStrategy;
use crate::services::{ActionHandler, Service};

/// A registered action
pub struct ActionDescriptor {
    /// Fully qualified name, e.g. `posts.find`
    pub name: String,
    /// Name as declared in the schema, e.g. `find`
    pub short_name: String,
    /// Qualified name of the owning service
    pub service_name: String,
    /// Cache flag resolved from the action and service settings
    pub cache: bool,
    /// Whether `handler` is actually cache-wrapped (needs a cacher on the broker)
    pub cache_wrapped: bool,
    pub description: Option<String>,
    /// Effective handler, possibly cache-wrapped
    pub handler: ActionHandler,
    service: Weak<Service>,
}

impl ActionDescriptor {
    pub(crate) fn new(
        short_name: &str,
        service_name: &str,
        handler: ActionHandler,
        service: Weak<Service>,
    ) -> Self {
        Self {
            name: format!("{service_name}.{short_name}"),
            short_name: short_name.to_string(),
            service_name: service_name.to_string(),
            cache: false,
            cache_wrapped: false,
            description: None,
            handler,
            service,
        }
    }

    pub(crate) fn with_cache(mut self, cache: bool, cache_wrapped: bool) -> Self {
        self.cache = cache;
        self.cache_wrapped = cache_wrapped;
        self
    }

    pub(crate) fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// The owning service, while it is alive
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.upgrade()
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("service_name", &self.service_name)
            .field("cache", &self.cache)
            .field("cache_wrapped", &self.cache_wrapped)
            .finish()
    }
}

/// One service's registration of an action name
#[derive(Clone)]
pub struct ActionProvider {
    pub descriptor: Arc<ActionDescriptor>,
    pub service: Arc<Service>,
}

impl fmt::Debug for ActionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionProvider")
            .field("action", &self.descriptor.name)
            .field("service", &self.service.full_name())
            .finish()
    }
}

/// All providers of one qualified action name; never empty
#[derive(Clone, Debug)]
pub struct ActionCatalogEntry {
    name: String,
    providers: Vec<ActionProvider>,
}

impl ActionCatalogEntry {
    pub fn new(name: impl Into<String>, provider: ActionProvider) -> Self {
        Self {
            name: name.into(),
            providers: vec![provider],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn providers(&self) -> &[ActionProvider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Copy of this entry with one more provider appended
    pub fn with_provider(&self, provider: ActionProvider) -> Self {
        let mut next = self.clone();
        next.providers.push(provider);
        next
    }

    /// Copy of this entry without the given service's providers
    ///
    /// Returns `None` when no provider is left, so the caller drops the entry.
    pub fn without_service(&self, service_name: &str) -> Option<Self> {
        let providers: Vec<ActionProvider> = self
            .providers
            .iter()
            .filter(|p| p.service.full_name() != service_name)
            .cloned()
            .collect();
        if providers.is_empty() {
            None
        } else {
            Some(Self {
                name: self.name.clone(),
                providers,
            })
        }
    }

    /// Select one provider
    ///
    /// A single provider is always returned directly; otherwise the strategy
    /// picks one.
    pub fn get(&self, strategy: &dyn LoadBalancingStrategy) -> Option<&ActionProvider> {
        match self.providers.len() {
            0 => None,
            1 => self.providers.first(),
            _ => {
                let index = strategy.select_provider(&self.name, &self.providers);
                self.providers.get(index)
            }
        }
    }
}
