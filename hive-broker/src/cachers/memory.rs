// In-process cache backend
//
// Entries live in a DashMap. With a TTL configured, an entry expires lazily:
// the first read after its deadline removes it and reports a miss.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

use super::Cacher;

#[derive(Debug, Clone, Default)]
pub struct MemoryCacherConfig {
    /// Time to live for every entry; `None` keeps entries forever
    pub ttl: Option<Duration>,
}

impl MemoryCacherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory [`Cacher`] backend
#[derive(Debug, Default)]
pub struct MemoryCacher {
    config: MemoryCacherConfig,
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryCacherConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, expired ones included until they are read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        None
    }
}

#[async_trait]
impl Cacher for MemoryCacher {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let expires_at = self.config.ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clean(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_and_removes_values() {
        let cacher = MemoryCacher::new();
        assert!(!cacher.has("posts.find:null").await.unwrap());

        cacher.set("posts.find:null", json!([1, 2])).await.unwrap();
        assert!(cacher.has("posts.find:null").await.unwrap());
        assert_eq!(
            cacher.get("posts.find:null").await.unwrap(),
            Some(json!([1, 2]))
        );

        cacher.del("posts.find:null").await.unwrap();
        assert_eq!(cacher.get("posts.find:null").await.unwrap(), None);

        cacher.set("a", json!(1)).await.unwrap();
        cacher.set("b", json!(2)).await.unwrap();
        cacher.clean().await.unwrap();
        assert!(cacher.is_empty());
    }

    #[test]
    fn set_overwrites_and_keeps_entries_without_ttl() {
        let cacher = MemoryCacher::new();
        tokio_test::block_on(async {
            cacher.set("k", json!(1)).await.unwrap();
            cacher.set("k", json!(2)).await.unwrap();
            assert_eq!(cacher.get("k").await.unwrap(), Some(json!(2)));
        });
        assert_eq!(cacher.len(), 1);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cacher =
            MemoryCacher::with_config(MemoryCacherConfig::new().with_ttl(Duration::from_millis(20)));
        cacher.set("k", json!("v")).await.unwrap();
        assert!(cacher.has("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cacher.get("k").await.unwrap(), None);
        assert_eq!(cacher.len(), 0);
    }
}
