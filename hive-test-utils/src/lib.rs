// Test utilities for Hive crates
//
// This crate provides test-specific functionality that should not be available
// in production builds. All functions in this crate are for testing only.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hive_broker::cachers::{Cacher, MemoryCacher};
use hive_broker::config::{BrokerConfig, LogLevel, LoggingConfig};
use hive_broker::{action_handler, ActionOptions, Context, Service, ServiceBroker, ServiceSchema};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared invocation counter for observing handler side effects
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Logging configuration for tests: warnings and errors only
pub fn test_logging_config() -> LoggingConfig {
    LoggingConfig::new()
        .with_default_level(LogLevel::Warn)
        .with_timestamp(false)
}

/// Create a broker configuration with a unique node id and quiet logging
pub fn create_test_broker_config() -> BrokerConfig {
    BrokerConfig::new(format!("test-node-{}", uuid::Uuid::new_v4()))
        .with_logging_config(test_logging_config())
}

/// Create a broker without a cacher
pub fn create_test_broker() -> ServiceBroker {
    ServiceBroker::new(create_test_broker_config())
}

/// Create a broker with a fresh in-memory cacher, returning both
pub fn create_caching_broker() -> (ServiceBroker, Arc<MemoryCacher>) {
    let cacher = Arc::new(MemoryCacher::new());
    let broker = ServiceBroker::new(create_test_broker_config().with_cacher(cacher.clone()));
    (broker, cacher)
}

/// Cacher whose backend is unreachable
///
/// `unreadable` fails every operation; `unwritable` reports misses and fails
/// only on writes.
#[derive(Debug, Default)]
pub struct FailingCacher {
    fail_reads: bool,
    pub reads: CallCounter,
    pub writes: CallCounter,
}

impl FailingCacher {
    pub fn unreadable() -> Self {
        Self {
            fail_reads: true,
            ..Default::default()
        }
    }

    pub fn unwritable() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cacher for FailingCacher {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        self.reads.increment();
        if self.fail_reads {
            Err(anyhow!("cache backend unavailable"))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<()> {
        self.writes.increment();
        Err(anyhow!("cache backend unavailable"))
    }

    async fn has(&self, _key: &str) -> Result<bool> {
        Err(anyhow!("cache backend unavailable"))
    }

    async fn del(&self, _key: &str) -> Result<()> {
        Err(anyhow!("cache backend unavailable"))
    }

    async fn clean(&self) -> Result<()> {
        Err(anyhow!("cache backend unavailable"))
    }
}

/// Five fixture users with ids 1..=5
pub fn fixture_users() -> Vec<Value> {
    (1..=5)
        .map(|id| {
            json!({
                "id": id,
                "userName": format!("user{id}"),
                "email": format!("user{id}@example.com"),
                "firstName": format!("First{id}"),
                "lastName": format!("Last{id}"),
            })
        })
        .collect()
}

/// Ten fixture posts with ids 1..=10, authored round-robin by users 1..=5
pub fn fixture_posts() -> Vec<Value> {
    (1..=10)
        .map(|id| {
            json!({
                "id": id,
                "title": format!("Post #{id}"),
                "author": (id - 1) % 5 + 1,
            })
        })
        .collect()
}

fn find_by_id(items: &[Value], params: &Value) -> Value {
    items
        .iter()
        .find(|item| item["id"] == params["id"])
        .cloned()
        .unwrap_or(Value::Null)
}

/// `users` service: `find`, and a cached `get` whose invocations are counted
pub fn users_schema(get_calls: CallCounter) -> ServiceSchema {
    let users = Arc::new(fixture_users());
    let all_users = users.clone();

    ServiceSchema::new("users")
        .with_action(
            "find",
            action_handler(move |ctx: Arc<Context>| {
                let users = all_users.clone();
                async move { Ok(ctx.result(Value::Array(users.to_vec()))) }
            }),
        )
        .with_action(
            "get",
            ActionOptions::new()
                .with_cache(true)
                .with_handler(action_handler(move |ctx: Arc<Context>| {
                    let users = users.clone();
                    let get_calls = get_calls.clone();
                    async move {
                        get_calls.increment();
                        Ok(ctx.result(find_by_id(&users, &ctx.params)))
                    }
                })),
        )
}

/// `posts` service: cached `find` (resolves authors through `users.get`),
/// `get`, and `author` (nested `posts.get` then `users.get`)
pub fn posts_schema(find_calls: CallCounter) -> ServiceSchema {
    let posts = Arc::new(fixture_posts());
    let find_posts = posts.clone();

    ServiceSchema::new("posts")
        .with_action(
            "find",
            ActionOptions::new().with_cache(true).with_handler(action_handler(
                move |ctx: Arc<Context>| {
                    let posts = find_posts.clone();
                    let find_calls = find_calls.clone();
                    async move {
                        find_calls.increment();
                        ctx.debug("Find posts...");
                        let mut result = Vec::with_capacity(posts.len());
                        for post in posts.iter() {
                            let mut post = post.clone();
                            let user = ctx
                                .call("users.get", json!({ "id": post["author"] }))
                                .await?;
                            post["author"] = json!({
                                "id": user["id"],
                                "userName": user["userName"],
                                "email": user["email"],
                            });
                            result.push(post);
                        }
                        Ok(ctx.result(Value::Array(result)))
                    }
                },
            )),
        )
        .with_action(
            "get",
            action_handler(move |ctx: Arc<Context>| {
                let posts = posts.clone();
                async move { Ok(ctx.result(find_by_id(&posts, &ctx.params))) }
            }),
        )
        .with_action(
            "author",
            action_handler(|ctx: Arc<Context>| async move {
                let post = ctx.call("posts.get", ctx.params.clone()).await?;
                ctx.call("users.get", json!({ "id": post["author"] })).await
            }),
        )
        .with_created(Arc::new(|service: &Service| {
            service.logger.info("Posts service created!");
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_posts_reference_existing_users() {
        let users = fixture_users();
        for post in fixture_posts() {
            let author = find_by_id(&users, &json!({ "id": post["author"] }));
            assert!(!author.is_null(), "post {} has no author", post["id"]);
        }
    }

    #[test]
    fn call_counter_is_shared_between_clones() {
        let counter = CallCounter::new();
        let clone = counter.clone();
        clone.increment();
        clone.increment();
        assert_eq!(counter.get(), 2);
    }
}
