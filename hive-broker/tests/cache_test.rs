use anyhow::Result;
use hive_broker::cachers::{cache_key, Cacher};
use hive_broker::{
    action_handler, ActionOptions, BrokerError, Context, Service, ServiceBroker, ServiceSchema,
};
use hive_test_utils::{
    create_caching_broker, create_test_broker, create_test_broker_config, posts_schema,
    users_schema, CallCounter, FailingCacher,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn noop_handler() -> hive_broker::ActionHandler {
    action_handler(|_ctx: Arc<Context>| async move { Ok(Value::Null) })
}

/// Build a `cache-test` service with the given flags and report whether
/// `cache-test.find` ended up cache-wrapped
fn wrapped(service_cache: Option<bool>, action_cache: Option<bool>) -> bool {
    let (broker, _cacher) = create_caching_broker();

    let mut options = ActionOptions::new().with_handler(noop_handler());
    options.cache = action_cache;
    let mut schema = ServiceSchema::new("cache-test").with_action("find", options);
    if let Some(flag) = service_cache {
        schema = schema.with_setting("cache", json!(flag));
    }

    Service::new(&broker, schema).unwrap();
    broker.get_action("cache-test.find").unwrap().cache_wrapped
}

#[test]
fn wrapping_follows_the_precedence_table() {
    assert!(!wrapped(None, None));
    assert!(wrapped(Some(true), None));
    assert!(!wrapped(Some(true), Some(false)));
    assert!(wrapped(None, Some(true)));
    assert!(wrapped(Some(false), Some(true)));
    assert!(wrapped(Some(true), Some(true)));
}

#[test]
fn no_cacher_means_no_wrapping() {
    let broker = create_test_broker();
    let schema = ServiceSchema::new("cache-test")
        .with_setting("cache", json!(true))
        .with_action(
            "find",
            ActionOptions::new().with_cache(true).with_handler(noop_handler()),
        );
    Service::new(&broker, schema).unwrap();

    let action = broker.get_action("cache-test.find").unwrap();
    assert!(action.cache);
    assert!(!action.cache_wrapped);
}

#[tokio::test]
async fn second_identical_call_is_served_from_cache() -> Result<()> {
    let (broker, cacher) = create_caching_broker();
    let find_calls = CallCounter::new();
    let user_calls = CallCounter::new();
    Service::new(&broker, users_schema(user_calls.clone()))?;
    Service::new(&broker, posts_schema(find_calls.clone()))?;

    let first = broker.call("posts.find", json!({ "limit": 10 })).await?;
    let second = broker.call("posts.find", json!({ "limit": 10 })).await?;

    assert_eq!(find_calls.get(), 1);
    assert_eq!(first, second);
    assert_eq!(first.as_array().map(Vec::len), Some(10));
    assert!(cacher
        .has(&cache_key("posts.find", &json!({ "limit": 10 })))
        .await?);

    // five distinct authors, each fetched once and then cached
    assert_eq!(user_calls.get(), 5);

    // different params miss the cache
    broker.call("posts.find", json!({ "limit": 5 })).await?;
    assert_eq!(find_calls.get(), 2);
    Ok(())
}

#[tokio::test]
async fn cleaning_the_cacher_forces_a_fresh_call() -> Result<()> {
    let (broker, cacher) = create_caching_broker();
    let user_calls = CallCounter::new();
    Service::new(&broker, users_schema(user_calls.clone()))?;

    broker.call("users.get", json!({ "id": 2 })).await?;
    broker.call("users.get", json!({ "id": 2 })).await?;
    assert_eq!(user_calls.get(), 1);

    cacher.clean().await?;
    let user = broker.call("users.get", json!({ "id": 2 })).await?;
    assert_eq!(user_calls.get(), 2);
    assert_eq!(user["email"], json!("user2@example.com"));
    Ok(())
}

#[tokio::test]
async fn handler_errors_are_not_cached() -> Result<()> {
    let (broker, _cacher) = create_caching_broker();
    let calls = CallCounter::new();
    let counter = calls.clone();

    Service::new(
        &broker,
        ServiceSchema::new("flaky").with_action(
            "get",
            ActionOptions::new()
                .with_cache(true)
                .with_handler(action_handler(move |_ctx: Arc<Context>| {
                    let attempt = counter.increment();
                    async move {
                        if attempt == 1 {
                            anyhow::bail!("first attempt fails");
                        }
                        Ok(json!({ "attempt": attempt }))
                    }
                })),
        ),
    )?;

    let err = broker.call("flaky.get", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "first attempt fails");
    assert!(BrokerError::from_anyhow(&err).is_none());

    let ok = broker.call("flaky.get", json!({})).await?;
    assert_eq!(ok, json!({ "attempt": 2 }));

    let cached = broker.call("flaky.get", json!({})).await?;
    assert_eq!(cached, json!({ "attempt": 2 }));
    assert_eq!(calls.get(), 2);
    Ok(())
}

#[tokio::test]
async fn unreadable_cacher_falls_through_to_the_handler() -> Result<()> {
    let cacher = Arc::new(FailingCacher::unreadable());
    let broker = ServiceBroker::new(create_test_broker_config().with_cacher(cacher.clone()));
    let user_calls = CallCounter::new();
    Service::new(&broker, users_schema(user_calls.clone()))?;

    let first = broker.call("users.get", json!({ "id": 1 })).await?;
    let second = broker.call("users.get", json!({ "id": 1 })).await?;

    assert_eq!(first, second);
    assert_eq!(first["userName"], json!("user1"));
    assert_eq!(user_calls.get(), 2);
    assert_eq!(cacher.reads.get(), 2);
    assert_eq!(cacher.writes.get(), 0);
    Ok(())
}

#[tokio::test]
async fn unwritable_cacher_still_returns_fresh_results() -> Result<()> {
    let cacher = Arc::new(FailingCacher::unwritable());
    let broker = ServiceBroker::new(create_test_broker_config().with_cacher(cacher.clone()));
    let user_calls = CallCounter::new();
    Service::new(&broker, users_schema(user_calls.clone()))?;

    let user = broker.call("users.get", json!({ "id": 3 })).await?;
    assert_eq!(user["id"], json!(3));
    assert_eq!(user_calls.get(), 1);
    assert_eq!(cacher.writes.get(), 1);
    Ok(())
}

#[tokio::test]
async fn direct_invocation_uses_the_cache_wrapper() -> Result<()> {
    let (broker, _cacher) = create_caching_broker();
    let user_calls = CallCounter::new();
    let users = Service::new(&broker, users_schema(user_calls.clone()))?;

    users.call_action("get", json!({ "id": 4 })).await?;
    broker.call("users.get", json!({ "id": 4 })).await?;
    assert_eq!(user_calls.get(), 1);
    Ok(())
}
