//! Subscription handler backed by a serializer
//!
//! Every read and write of the book is a task submitted to the serializer
//! that owns it. Work that does not touch the book (logging the outcome)
//! happens after the task returns, outside the loop.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::{PersonName, SubscriptionBook, SubscriptionId, Topic};
use crate::error::{Error, Result};
use crate::executor::{LoopHandle, Scope, Serializer, SerializerConfig, StatsSnapshot};

/// Operations on a subscription registry
#[async_trait]
pub trait SubscriptionHandler: Send + Sync {
    /// Subscribe `name` to `topic`, returning the new subscription's id
    async fn add_subscription(&self, topic: Topic, name: PersonName) -> Result<SubscriptionId>;

    /// Number of subscriptions under `topic` (0 for an unknown topic)
    async fn count_by_topic(&self, topic: &Topic) -> Result<usize>;

    /// Remove a subscription and wait until it is gone
    async fn remove_subscription_sync(&self, topic: &Topic, id: SubscriptionId) -> Result<()>;

    /// Request a removal without waiting for it
    fn remove_subscription_async(&self, topic: &Topic, id: SubscriptionId);

    /// Subscription count of every non-empty topic
    async fn topic_counts(&self) -> Result<BTreeMap<Topic, usize>>;
}

/// Subscription registry that needs no lock around its book
#[derive(Clone)]
pub struct LockFreeSubscriptions {
    serializer: Serializer<SubscriptionBook>,
}

impl LockFreeSubscriptions {
    /// Start a serializer owning an empty book, bound to `scope`
    pub fn spawn(scope: Scope, config: SerializerConfig) -> (Self, LoopHandle<SubscriptionBook>) {
        let (serializer, handle) = Serializer::spawn(SubscriptionBook::new(), scope, config);
        (Self { serializer }, handle)
    }

    /// Counters of the underlying serializer
    pub fn stats(&self) -> StatsSnapshot {
        self.serializer.stats()
    }
}

#[async_trait]
impl SubscriptionHandler for LockFreeSubscriptions {
    async fn add_subscription(&self, topic: Topic, name: PersonName) -> Result<SubscriptionId> {
        let id = self
            .serializer
            .submit_sync(insert_subscription, (topic.clone(), name.clone()))
            .await?;

        info!(subscription_id = %id, person = %name, topic = %topic, "Subscription created");
        Ok(id)
    }

    async fn count_by_topic(&self, topic: &Topic) -> Result<usize> {
        let count = self
            .serializer
            .submit_sync(count_subscriptions, topic.clone())
            .await?;
        Ok(count)
    }

    async fn remove_subscription_sync(&self, topic: &Topic, id: SubscriptionId) -> Result<()> {
        self.serializer
            .submit_sync(delete_subscription, (topic.clone(), id))
            .await?;

        info!(subscription_id = %id, topic = %topic, "Subscription removed");
        Ok(())
    }

    fn remove_subscription_async(&self, topic: &Topic, id: SubscriptionId) {
        self.serializer
            .submit_async(delete_subscription, (topic.clone(), id));

        debug!(subscription_id = %id, topic = %topic, "Subscription removal requested");
    }

    async fn topic_counts(&self) -> Result<BTreeMap<Topic, usize>> {
        let counts = self.serializer.submit_sync(count_all, ()).await?;
        Ok(counts)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tasks run inside the serializer
// ─────────────────────────────────────────────────────────────────

fn insert_subscription(
    book: &mut SubscriptionBook,
    (topic, name): (Topic, PersonName),
) -> Result<SubscriptionId> {
    let id = SubscriptionId::generate();
    let entries = book.entry(topic).or_default();
    if entries.contains_key(&id) {
        return Err(Error::DuplicateSubscription { id: id.to_string() });
    }
    entries.insert(id, name);
    Ok(id)
}

fn count_subscriptions(book: &mut SubscriptionBook, topic: Topic) -> Result<usize> {
    Ok(book.get(&topic).map_or(0, |entries| entries.len()))
}

fn delete_subscription(
    book: &mut SubscriptionBook,
    (topic, id): (Topic, SubscriptionId),
) -> Result<()> {
    let entries = book
        .get_mut(&topic)
        .ok_or_else(|| not_found(&topic, id))?;
    if entries.remove(&id).is_none() {
        return Err(not_found(&topic, id));
    }
    if entries.is_empty() {
        book.remove(&topic);
    }
    Ok(())
}

fn count_all(book: &mut SubscriptionBook, _: ()) -> Result<BTreeMap<Topic, usize>> {
    Ok(book
        .iter()
        .map(|(topic, entries)| (topic.clone(), entries.len()))
        .collect())
}

fn not_found(topic: &Topic, id: SubscriptionId) -> Error {
    Error::SubscriptionNotFound {
        topic: topic.to_string(),
        id: id.to_string(),
    }
}
