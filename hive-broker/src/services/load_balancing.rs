// Load Balancing Module
//
// INTENTION:
// Pick one provider when several services register the same qualified action
// name. Strategies only return an index; the catalog entry owns the providers.

use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::services::action_catalog::ActionProvider;

/// Strategy for choosing among the providers of one action
pub trait LoadBalancingStrategy: Send + Sync {
    /// Return an index into `providers`; only called with at least two providers
    fn select_provider(&self, action_name: &str, providers: &[ActionProvider]) -> usize;
}

/// Cycles through providers, keeping a separate cursor per action name
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    cursors: DashMap<String, AtomicUsize>,
}

impl RoundRobinLoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancingStrategy for RoundRobinLoadBalancer {
    fn select_provider(&self, action_name: &str, providers: &[ActionProvider]) -> usize {
        if let Some(cursor) = self.cursors.get(action_name) {
            return cursor.fetch_add(1, Ordering::Relaxed) % providers.len();
        }
        self.cursors
            .entry(action_name.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed)
            % providers.len()
    }
}

/// Picks a provider uniformly at random
#[derive(Debug, Default)]
pub struct RandomLoadBalancer;

impl RandomLoadBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancingStrategy for RandomLoadBalancer {
    fn select_provider(&self, _action_name: &str, providers: &[ActionProvider]) -> usize {
        rand::rng().random_range(0..providers.len())
    }
}
