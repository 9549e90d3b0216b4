//! Subscription registry stress tests
//!
//! Many concurrent users against one registry, with counts read while the
//! book is being written.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::init_test_logging;
use safe_action::executor::{Scope, SerializerConfig};
use safe_action::subscription::{
    LockFreeSubscriptions, PersonName, SubscriptionHandler, SubscriptionId, Topic,
};

const USERS: usize = 100;
const TOPICS: usize = 3;

fn topic(index: usize) -> Topic {
    Topic::new(format!("topic {}", index % TOPICS))
}

async fn total(registry: &LockFreeSubscriptions) -> usize {
    let mut total = 0;
    for index in 0..TOPICS {
        total += registry.count_by_topic(&topic(index)).await.unwrap();
    }
    total
}

async fn create_all(registry: &LockFreeSubscriptions) -> Vec<(Topic, SubscriptionId)> {
    let creators: Vec<_> = (0..USERS)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let topic = topic(i);
                let id = registry
                    .add_subscription(topic.clone(), PersonName::new(format!("Name {}", i)))
                    .await
                    .unwrap();
                (topic, id)
            })
        })
        .collect();

    // Counts read concurrently with the creates never exceed what exists.
    let mut observed = 0;
    while observed < USERS {
        observed = total(registry).await;
        assert!(observed <= USERS);
        tokio::task::yield_now().await;
    }

    let mut created = Vec::with_capacity(USERS);
    for creator in creators {
        created.push(creator.await.unwrap());
    }
    created
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_then_sync_removes() {
    init_test_logging();
    let scope = Scope::new();
    let (registry, handle) = LockFreeSubscriptions::spawn(scope.clone(), SerializerConfig::default());

    let created = create_all(&registry).await;
    let ids: HashSet<_> = created.iter().map(|(_, id)| *id).collect();
    assert_eq!(ids.len(), USERS, "subscription ids must be unique");

    let counts = registry.topic_counts().await.unwrap();
    assert_eq!(counts.values().sum::<usize>(), USERS);
    assert_eq!(counts.len(), TOPICS);
    assert_eq!(counts[&topic(0)], 34);

    let removers: Vec<_> = created
        .into_iter()
        .map(|(topic, id)| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.remove_subscription_sync(&topic, id).await })
        })
        .collect();
    for remover in removers {
        remover.await.unwrap().unwrap();
    }

    assert_eq!(total(&registry).await, 0);
    assert!(registry.topic_counts().await.unwrap().is_empty());

    scope.cancel();
    let book = handle.join().await.unwrap();
    assert!(book.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_then_async_removes() {
    let scope = Scope::new();
    // A tiny queue forces most asynchronous removals through hand-off helpers.
    let (registry, handle) = LockFreeSubscriptions::spawn(scope.clone(), SerializerConfig { queue_capacity: 2 });

    let created = create_all(&registry).await;
    for (topic, id) in &created {
        registry.remove_subscription_async(topic, *id);
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while total(&registry).await > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("asynchronous removals were never applied");

    let stats = registry.stats();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.dropped, 0);

    scope.cancel();
    assert!(handle.join().await.unwrap().is_empty());
}
