// Cachers Module
//
// INTENTION:
// Define the contract every cache backend satisfies and the wrapper that
// memoizes an action's results through it. The broker only ever talks to the
// `Cacher` trait; `MemoryCacher` is the in-process backend.
//
// Cacher faults never fail a call: a failed read falls through to the
// handler without caching, a failed write is logged and the fresh result is
// returned. Handler errors are never cached.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use hive_common::logging::Logger;
use hive_common::{log_debug, log_warn};
use serde_json::Value;
use std::sync::Arc;

use crate::services::{ActionHandler, Context, ServiceFuture};

pub use memory::{MemoryCacher, MemoryCacherConfig};

/// Key-value store used to memoize action results
#[async_trait]
pub trait Cacher: Send + Sync {
    /// Get a cached value, `None` on a miss
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value under a key
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Check whether a key is cached
    async fn has(&self, key: &str) -> Result<bool>;

    /// Remove a single key
    async fn del(&self, key: &str) -> Result<()>;

    /// Remove every key
    async fn clean(&self) -> Result<()>;
}

/// Decide whether an action's handler is cache-wrapped
///
/// An explicit action-level flag always wins; otherwise the service-level
/// `settings.cache` flag applies. Absent on both sides means no caching.
pub fn should_cache(service_cache: Option<bool>, action_cache: Option<bool>) -> bool {
    match action_cache {
        Some(flag) => flag,
        None => service_cache == Some(true),
    }
}

/// Deterministic cache key for a call
///
/// Object keys are sorted at every depth before formatting, so equal params
/// give the same key even when `serde_json/preserve_order` is enabled.
pub fn cache_key(action_name: &str, params: &Value) -> String {
    format!("{action_name}:{}", canonical(params))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Wrap a handler so its results are memoized in `cacher`
///
/// The returned handler looks up `cache_key(action_name, ctx.params)`; on a
/// hit it returns the stored value without running `handler`.
pub fn caching_wrapper(
    cacher: Arc<dyn Cacher>,
    logger: Arc<Logger>,
    action_name: &str,
    handler: ActionHandler,
) -> ActionHandler {
    let action_name = action_name.to_string();
    Arc::new(move |ctx: Arc<Context>| -> ServiceFuture {
        let cacher = cacher.clone();
        let logger = logger.clone();
        let handler = handler.clone();
        let key = cache_key(&action_name, &ctx.params);

        Box::pin(async move {
            match cacher.get(&key).await {
                Ok(Some(cached)) => {
                    log_debug!(logger, "Cache hit: {key}");
                    return Ok(cached);
                }
                Ok(None) => log_debug!(logger, "Cache miss: {key}"),
                Err(e) => {
                    log_warn!(logger, "Cache read failed for {key}, bypassing cache: {e}");
                    return handler(ctx).await;
                }
            }

            let result = handler(ctx).await?;
            if let Err(e) = cacher.set(&key, result.clone()).await {
                log_warn!(logger, "Cache write failed for {key}: {e}");
            }
            Ok(result)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_flag_precedence() {
        assert!(!should_cache(None, None));
        assert!(should_cache(Some(true), None));
        assert!(!should_cache(Some(true), Some(false)));
        assert!(should_cache(None, Some(true)));
        assert!(should_cache(Some(false), Some(true)));
        assert!(should_cache(Some(true), Some(true)));
        assert!(!should_cache(Some(false), None));
        assert!(!should_cache(None, Some(false)));
        assert!(!should_cache(Some(false), Some(false)));
    }

    #[test]
    fn cache_key_ignores_param_construction_order() {
        let a = json!({ "id": 5, "limit": 10 });
        let mut b = serde_json::Map::new();
        b.insert("limit".into(), json!(10));
        b.insert("id".into(), json!(5));

        assert_eq!(cache_key("posts.find", &a), cache_key("posts.find", &Value::Object(b)));
        assert_ne!(cache_key("posts.find", &a), cache_key("posts.get", &a));
        assert_eq!(cache_key("posts.find", &Value::Null), "posts.find:null");
    }

    #[test]
    fn cache_key_sorts_nested_objects() {
        let mut inner = serde_json::Map::new();
        inner.insert("sort".into(), json!("title"));
        inner.insert("fields".into(), json!(["id", "title"]));
        let mut params = serde_json::Map::new();
        params.insert("query".into(), Value::Object(inner));
        params.insert("limit".into(), json!(10));

        assert_eq!(
            cache_key("posts.find", &Value::Object(params)),
            r#"posts.find:{"limit":10,"query":{"fields":["id","title"],"sort":"title"}}"#
        );
    }
}
