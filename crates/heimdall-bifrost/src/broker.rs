//! Topic broker.
//!
//! Topic state lives in a sharded map keyed by the lowercased topic. Each
//! topic owns the queues of its live subscriptions. A topic entry exists only
//! while it has at least one subscription: the last unsubscribe removes it
//! with a check-and-remove under the shard lock, so a concurrent subscribe to
//! the same topic either lands in the surviving entry or recreates it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use heimdall_core::{IntoHtml, SubscriptionId};
use heimdall_settings::{BifrostSettings, MIN_MESSAGE_TTL_FLOOR_MS};
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::content::BifrostContent;
use crate::errors::{BifrostError, Result};
use crate::message::Message;
use crate::metric_names::{
    ACTIVE_SUBSCRIPTIONS, MESSAGES_DELIVERED, MESSAGES_EVICTED, MESSAGES_PUBLISHED,
};
use crate::queue::{DeliveryQueue, Offer};

/// Case-folded map key for a topic.
pub(crate) fn topic_key(topic: &str) -> String {
    topic.trim().to_lowercase()
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Broker tuning.
#[derive(Clone, Debug)]
pub struct BifrostConfig {
    /// Per-subscriber queue capacity.
    pub subscriber_buffer: usize,
    /// Floor applied to every message TTL. Built from settings it is never
    /// below [`MIN_MESSAGE_TTL_FLOOR_MS`].
    pub min_message_ttl: Duration,
}

impl Default for BifrostConfig {
    fn default() -> Self {
        Self::from(&BifrostSettings::default())
    }
}

impl From<&BifrostSettings> for BifrostConfig {
    fn from(s: &BifrostSettings) -> Self {
        Self {
            subscriber_buffer: s.subscriber_buffer.max(1),
            min_message_ttl: Duration::from_millis(
                s.min_message_ttl_ms.max(MIN_MESSAGE_TTL_FLOOR_MS),
            ),
        }
    }
}

// ── Broker ──────────────────────────────────────────────────────────────────

type Subscribers = HashMap<SubscriptionId, Arc<DeliveryQueue>>;

struct Inner {
    topics: DashMap<String, Subscribers>,
    config: BifrostConfig,
}

/// Outcome of one [`Bifrost::publish`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscriber queues the message was appended to.
    pub delivered: usize,
    /// Of those, queues that had to drop their oldest entry to make room.
    pub evicted: usize,
}

/// The broker. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Bifrost {
    inner: Arc<Inner>,
}

impl fmt::Debug for Bifrost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bifrost")
            .field("topics", &self.topic_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for Bifrost {
    fn default() -> Self {
        Self::new(BifrostConfig::default())
    }
}

impl Bifrost {
    /// Create an empty broker.
    pub fn new(config: BifrostConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: DashMap::new(),
                config,
            }),
        }
    }

    /// Broker configuration.
    pub fn config(&self) -> &BifrostConfig {
        &self.inner.config
    }

    /// Subscribe to `topic` with the configured queue capacity.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription> {
        self.subscribe_with_capacity(topic, self.inner.config.subscriber_buffer)
    }

    /// Subscribe to `topic` with an explicit queue capacity (minimum 1).
    pub fn subscribe_with_capacity(&self, topic: &str, capacity: usize) -> Result<Subscription> {
        if topic.trim().is_empty() {
            return Err(BifrostError::InvalidTopic);
        }
        let key = topic_key(topic);
        let id = SubscriptionId::new();
        let queue = Arc::new(DeliveryQueue::new(capacity));

        let _ = self
            .inner
            .topics
            .entry(key.clone())
            .or_default()
            .insert(id.clone(), Arc::clone(&queue));

        gauge!(ACTIVE_SUBSCRIPTIONS).increment(1.0);
        debug!(topic, subscription = %id, capacity, "subscribed");

        let handle = Unsubscribe {
            inner: Arc::new(UnsubscribeInner {
                broker: Arc::downgrade(&self.inner),
                key,
                id: id.clone(),
                queue: Arc::clone(&queue),
                done: AtomicBool::new(false),
            }),
        };

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            queue,
            handle,
        })
    }

    /// Publish `content` to every current subscriber of `topic`.
    ///
    /// The content is rendered once. The message expires after
    /// `max(ttl, min_message_ttl)`. With no subscribers this is a no-op.
    /// A full subscriber queue drops its oldest message; publish never waits.
    pub fn publish(
        &self,
        topic: &str,
        content: impl IntoHtml,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<PublishReport> {
        if topic.trim().is_empty() {
            return Err(BifrostError::InvalidTopic);
        }
        if cancel.is_cancelled() {
            return Err(BifrostError::Cancelled);
        }

        let key = topic_key(topic);
        let queues: Vec<Arc<DeliveryQueue>> = match self.inner.topics.get(&key) {
            Some(subs) => subs.values().cloned().collect(),
            None => {
                trace!(topic, "publish with no subscribers");
                return Ok(PublishReport::default());
            }
        };

        let ttl = ttl.max(self.inner.config.min_message_ttl);
        let message = Arc::new(Message::new(topic, content.into_html(), ttl));

        let mut report = PublishReport::default();
        for queue in &queues {
            match queue.offer(Arc::clone(&message)) {
                Offer::Queued => report.delivered += 1,
                Offer::Evicted => {
                    report.delivered += 1;
                    report.evicted += 1;
                }
                Offer::Closed => {}
            }
        }

        counter!(MESSAGES_PUBLISHED).increment(1);
        counter!(MESSAGES_DELIVERED).increment(report.delivered as u64);
        if report.evicted > 0 {
            counter!(MESSAGES_EVICTED).increment(report.evicted as u64);
        }
        debug!(
            topic,
            message = %message.id,
            delivered = report.delivered,
            evicted = report.evicted,
            "published"
        );
        Ok(report)
    }

    /// Publish a prepared [`BifrostContent`].
    pub fn publish_content(
        &self,
        content: BifrostContent,
        cancel: &CancellationToken,
    ) -> Result<PublishReport> {
        let ttl = content.ttl.unwrap_or(Duration::ZERO);
        self.publish(&content.topic, content.html, ttl, cancel)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    /// True when `topic` currently has subscribers.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.inner.topics.contains_key(&topic_key(topic))
    }

    /// Live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .get(&topic_key(topic))
            .map_or(0, |subs| subs.len())
    }

    /// Live subscriptions across all topics.
    pub fn total_subscribers(&self) -> usize {
        self.inner.topics.iter().map(|e| e.value().len()).sum()
    }

    /// Close every subscription. Streams observe end-of-queue and exit.
    pub fn close_all(&self) {
        let keys: Vec<String> = self.inner.topics.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, subs)) = self.inner.topics.remove(&key) {
                for queue in subs.values() {
                    queue.close();
                    gauge!(ACTIVE_SUBSCRIPTIONS).decrement(1.0);
                }
            }
        }
    }
}

impl Inner {
    /// Remove one subscription and drop its topic if it was the last.
    fn remove(&self, key: &str, id: &SubscriptionId) -> bool {
        let removed = match self.topics.get_mut(key) {
            Some(mut subs) => subs.remove(id),
            None => None,
        };
        let _ = self.topics.remove_if(key, |_, subs| subs.is_empty());

        match removed {
            Some(queue) => {
                queue.close();
                gauge!(ACTIVE_SUBSCRIPTIONS).decrement(1.0);
                true
            }
            None => false,
        }
    }
}

// ── Subscription ────────────────────────────────────────────────────────────

struct UnsubscribeInner {
    broker: Weak<Inner>,
    key: String,
    id: SubscriptionId,
    queue: Arc<DeliveryQueue>,
    done: AtomicBool,
}

/// Idempotent unsubscribe handle. Clones refer to the same subscription.
#[derive(Clone)]
pub struct Unsubscribe {
    inner: Arc<UnsubscribeInner>,
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("subscription", &self.inner.id)
            .field("done", &self.is_done())
            .finish()
    }
}

impl Unsubscribe {
    /// Remove the subscription. Returns `true` only for the call that did it.
    pub fn unsubscribe(&self) -> bool {
        if self.inner.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        let removed = match self.inner.broker.upgrade() {
            Some(broker) => broker.remove(&self.inner.key, &self.inner.id),
            None => false,
        };
        // Broker may already have closed it (close_all) or be gone.
        self.inner.queue.close();
        debug!(subscription = %self.inner.id, removed, "unsubscribed");
        true
    }

    /// True once [`Unsubscribe::unsubscribe`] has run.
    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }
}

/// One live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    queue: Arc<DeliveryQueue>,
    handle: Unsubscribe,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Subscription {
    /// Subscription id.
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Topic as given at subscribe time.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message. `None` once unsubscribed.
    pub async fn recv(&self) -> Option<Arc<Message>> {
        self.queue.recv().await
    }

    /// Take the next message without waiting.
    pub fn try_recv(&self) -> Option<Arc<Message>> {
        self.queue.try_recv()
    }

    /// Messages currently buffered.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// A cloneable handle that can unsubscribe from elsewhere.
    pub fn handle(&self) -> Unsubscribe {
        self.handle.clone()
    }

    /// Unsubscribe now. Safe to call repeatedly.
    pub fn unsubscribe(&self) -> bool {
        self.handle.unsubscribe()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.handle.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use heimdall_core::Html;

    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    fn broker(buffer: usize) -> Bifrost {
        Bifrost::new(BifrostConfig {
            subscriber_buffer: buffer,
            min_message_ttl: Duration::from_secs(5),
        })
    }

    fn drain(sub: &Subscription) -> Vec<String> {
        std::iter::from_fn(|| sub.try_recv())
            .map(|m| m.html.as_str().to_string())
            .collect()
    }

    #[test]
    fn subscribe_creates_topic_and_unsubscribe_removes_it() {
        let b = broker(4);
        let sub = b.subscribe("orders").unwrap();
        assert!(b.has_topic("orders"));
        assert_eq!(b.subscriber_count("orders"), 1);

        assert!(sub.unsubscribe());
        assert!(!b.has_topic("orders"));
        assert_eq!(b.topic_count(), 0);
    }

    #[test]
    fn topics_are_case_insensitive() {
        let b = broker(4);
        let a = b.subscribe("Orders").unwrap();
        let c = b.subscribe("ORDERS").unwrap();
        assert_eq!(b.topic_count(), 1);
        assert_eq!(b.subscriber_count("orders"), 2);

        let report = b
            .publish("orders", Html::raw("x"), TTL, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(drain(&a), ["x"]);
        assert_eq!(drain(&c), ["x"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let b = broker(4);
        let sub = b.subscribe("t").unwrap();
        let _other = b.subscribe("t").unwrap();
        let handle = sub.handle();

        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(b.subscriber_count("t"), 1);
        assert!(b.has_topic("t"));
    }

    #[test]
    fn drop_unsubscribes() {
        let b = broker(4);
        {
            let _sub = b.subscribe("t").unwrap();
            assert!(b.has_topic("t"));
        }
        assert!(!b.has_topic("t"));
    }

    #[test]
    fn topic_survives_while_any_subscriber_remains() {
        let b = broker(4);
        let first = b.subscribe("t").unwrap();
        let second = b.subscribe("t").unwrap();
        drop(first);
        assert!(b.has_topic("t"));
        drop(second);
        assert!(!b.has_topic("t"));
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let b = broker(4);
        let report = b
            .publish("nobody", Html::raw("x"), TTL, &CancellationToken::new())
            .unwrap();
        assert_eq!(report, PublishReport::default());
        assert_eq!(b.topic_count(), 0);
    }

    #[test]
    fn publish_rejects_blank_topic() {
        let b = broker(4);
        assert_matches!(
            b.publish("  ", Html::raw("x"), TTL, &CancellationToken::new()),
            Err(BifrostError::InvalidTopic)
        );
        assert_matches!(b.subscribe(""), Err(BifrostError::InvalidTopic));
    }

    #[test]
    fn publish_honors_cancellation() {
        let b = broker(4);
        let _sub = b.subscribe("t").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_matches!(
            b.publish("t", Html::raw("x"), TTL, &cancel),
            Err(BifrostError::Cancelled)
        );
    }

    #[test]
    fn zero_ttl_is_raised_to_floor() {
        let b = broker(4);
        let sub = b.subscribe("t").unwrap();
        let _ = b
            .publish("t", Html::raw("x"), Duration::ZERO, &CancellationToken::new())
            .unwrap();
        let m = sub.try_recv().unwrap();
        assert!(!m.is_expired());
        assert_eq!((m.expires_at - m.created_at).num_seconds(), 5);
    }

    #[test]
    fn longer_ttl_is_kept() {
        let b = broker(4);
        let sub = b.subscribe("t").unwrap();
        let _ = b
            .publish("t", "x", Duration::from_secs(60), &CancellationToken::new())
            .unwrap();
        let m = sub.try_recv().unwrap();
        assert_eq!((m.expires_at - m.created_at).num_seconds(), 60);
    }

    #[test]
    fn full_queue_evicts_only_for_that_subscriber() {
        let b = broker(2);
        let slow = b.subscribe_with_capacity("t", 1).unwrap();
        let fast = b.subscribe("t").unwrap();
        let cancel = CancellationToken::new();

        let _ = b.publish("t", "a", TTL, &cancel).unwrap();
        let report = b.publish("t", "b", TTL, &cancel).unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.evicted, 1);

        assert_eq!(drain(&slow), ["b"]);
        assert_eq!(drain(&fast), ["a", "b"]);
    }

    #[test]
    fn publish_shares_one_message_id() {
        let b = broker(4);
        let a = b.subscribe("t").unwrap();
        let c = b.subscribe("t").unwrap();
        let _ = b.publish("t", "x", TTL, &CancellationToken::new()).unwrap();
        assert_eq!(a.try_recv().unwrap().id, c.try_recv().unwrap().id);
    }

    #[test]
    fn publish_content_uses_bundle() {
        let b = broker(4);
        let sub = b.subscribe("notes").unwrap();
        let content = BifrostContent::new("notes", Html::raw("<li>n</li>"));
        let report = b.publish_content(content, &CancellationToken::new()).unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(drain(&sub), ["<li>n</li>"]);
    }

    #[test]
    fn settings_below_floor_still_yield_live_messages() {
        let settings = BifrostSettings {
            min_message_ttl_ms: 0,
            ..BifrostSettings::default()
        };
        let config = BifrostConfig::from(&settings);
        assert_eq!(
            config.min_message_ttl,
            Duration::from_millis(MIN_MESSAGE_TTL_FLOOR_MS)
        );

        let b = Bifrost::new(config);
        let sub = b.subscribe("t").unwrap();
        let _ = b
            .publish("t", "x", Duration::ZERO, &CancellationToken::new())
            .unwrap();
        let m = sub.try_recv().unwrap();
        assert!(!m.is_expired());
        assert!(m.expires_at - m.created_at >= chrono::Duration::seconds(5));
    }

    #[test]
    fn close_all_ends_every_subscription() {
        let b = broker(4);
        let a = b.subscribe("x").unwrap();
        let c = b.subscribe("y").unwrap();
        b.close_all();
        assert_eq!(b.topic_count(), 0);
        assert!(a.try_recv().is_none());
        assert!(c.unsubscribe());
    }

    #[test]
    fn unsubscribe_after_broker_dropped_is_safe() {
        let b = broker(4);
        let sub = b.subscribe("t").unwrap();
        drop(b);
        assert!(sub.unsubscribe());
    }

    #[tokio::test]
    async fn recv_ends_after_unsubscribe() {
        let b = broker(4);
        let sub = b.subscribe("t").unwrap();
        let _ = b.publish("t", "x", TTL, &CancellationToken::new()).unwrap();
        let _ = sub.unsubscribe();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_unsubscribe_leave_no_orphans() {
        let b = broker(4);
        let mut tasks = Vec::new();
        for i in 0..64 {
            let b = b.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let sub = b.subscribe(if i % 2 == 0 { "hot" } else { "HOT" }).unwrap();
                    tokio::task::yield_now().await;
                    drop(sub);
                }
            }));
        }
        for t in futures::future::join_all(tasks).await {
            t.unwrap();
        }
        assert_eq!(b.topic_count(), 0);
        assert_eq!(b.total_subscribers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscriber_is_not_lost_to_topic_removal() {
        let b = broker(4);
        let keeper = b.subscribe("t").unwrap();
        let churn = {
            let b = b.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    drop(b.subscribe("t").unwrap());
                    tokio::task::yield_now().await;
                }
            })
        };
        churn.await.unwrap();
        assert!(b.has_topic("t"));
        let report = b.publish("t", "x", TTL, &CancellationToken::new()).unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(drain(&keeper), ["x"]);
    }
}
