//! [`TopicRegistry`]: the topic → subscriber mapping.
//!
//! Lock order, outermost first: a connection's subscription map, a shard of
//! the topic map, a topic's subscriber set. The topic map shard is never held
//! while waiting on a subscriber set, except inside [`TopicRegistry::prune`].

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
  },
};

use agora_core::event::{Event, Topic};
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::connection::{
  Connection, ConnectionId, ConnectionState, Mailbox, Subscription, SubscriptionId,
};

/// Events buffered per connection before further deliveries are dropped.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

// ─── Per-topic state ─────────────────────────────────────────────────────────

pub(crate) struct Subscriber {
  pub(crate) connection: ConnectionId,
  pub(crate) mailbox:    mpsc::Sender<Arc<Event>>,
}

/// Everything the registry knows about one topic.
pub(crate) struct TopicChannel {
  /// Subscribe, unsubscribe and deliver on this topic all take this lock.
  subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
  /// Serialises commit-then-publish on this topic so that delivery order
  /// matches commit order. Held across the commit, never across delivery to
  /// a socket.
  pub(crate) gate: tokio::sync::Mutex<()>,
}

impl TopicChannel {
  fn new() -> Self {
    Self {
      subscribers: Mutex::new(HashMap::new()),
      gate:        tokio::sync::Mutex::new(()),
    }
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
    // Entries are inserted and removed whole; a poisoned map is consistent.
    self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

// ─── Delivery outcome ────────────────────────────────────────────────────────

/// What happened to one event. Drops are logged, never surfaced as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
  /// Subscribers whose mailbox accepted the event.
  pub delivered: usize,
  /// Subscribers whose mailbox was full or closed.
  pub dropped:   usize,
}

// ─── Registry ────────────────────────────────────────────────────────────────

struct Inner {
  topics:           DashMap<Topic, Arc<TopicChannel>>,
  next_id:          AtomicU64,
  mailbox_capacity: usize,
}

/// The shared fan-out resource. Cheap to clone; clones share state.
///
/// Pass an instance explicitly to whatever needs it. Independent registries
/// in one process never see each other's events.
#[derive(Clone)]
pub struct TopicRegistry {
  inner: Arc<Inner>,
}

impl Default for TopicRegistry {
  fn default() -> Self { Self::new(DEFAULT_MAILBOX_CAPACITY) }
}

impl TopicRegistry {
  pub fn new(mailbox_capacity: usize) -> Self {
    Self {
      inner: Arc::new(Inner {
        topics:           DashMap::new(),
        next_id:          AtomicU64::new(1),
        mailbox_capacity: mailbox_capacity.max(1),
      }),
    }
  }

  fn next_id(&self) -> u64 { self.inner.next_id.fetch_add(1, Ordering::Relaxed) }

  /// Open a connection with no subscriptions. Dropping the [`Connection`]
  /// cancels all of its subscriptions.
  pub fn connect(&self) -> (Connection, Mailbox) {
    let id       = ConnectionId(self.next_id());
    let (tx, rx) = mpsc::channel(self.inner.mailbox_capacity);
    let state    = Arc::new(ConnectionState::new(id));
    tracing::debug!(connection = %id, "connection opened");
    (
      Connection::new(state.clone(), self.clone(), tx),
      Mailbox::new(state, rx),
    )
  }

  /// Subscribe `connection` to `topic`. Subscribing twice to the same topic
  /// returns the existing subscription.
  pub fn subscribe(&self, connection: &Connection, topic: Topic) -> Subscription {
    let state   = connection.state();
    let mut map = state.lock();
    if let Some(&id) = map.get(&topic) {
      return Subscription::new(id, topic, state.clone());
    }

    let id      = SubscriptionId(self.next_id());
    let channel = self.channel(topic);
    channel.lock().insert(id, Subscriber {
      connection: state.id,
      mailbox:    connection.sender().clone(),
    });
    map.insert(topic, id);
    drop(map);

    tracing::debug!(connection = %state.id, %topic, subscription = %id, "subscribed");
    Subscription::new(id, topic, state.clone())
  }

  /// Cancel `subscription`. Calling this more than once is a no-op.
  pub fn unsubscribe(&self, subscription: &Subscription) {
    let owned = {
      let mut map = subscription.connection.lock();
      if map.get(&subscription.topic) == Some(&subscription.id) {
        map.remove(&subscription.topic);
        true
      } else {
        false
      }
    };
    self.detach(subscription.topic, subscription.id);
    if owned {
      tracing::debug!(
        connection = %subscription.connection.id,
        topic = %subscription.topic,
        subscription = %subscription.id,
        "unsubscribed"
      );
    }
  }

  /// Cancel every subscription held by a connection.
  pub(crate) fn disconnect(&self, state: &ConnectionState) {
    let topics = std::mem::take(&mut *state.lock());
    for (topic, id) in &topics {
      self.detach(*topic, *id);
    }
    tracing::debug!(connection = %state.id, subscriptions = topics.len(), "connection closed");
  }

  /// Hand `event` to every connection currently subscribed to its topic.
  ///
  /// Never blocks on a consumer. A full or closed mailbox costs that one
  /// connection this one event; everybody else is unaffected.
  pub fn deliver(&self, event: &Event) -> DeliveryReport {
    let Some(channel) = self.existing(&event.topic) else {
      return DeliveryReport::default();
    };

    let shared     = Arc::new(event.clone());
    let mut report = DeliveryReport::default();
    let mut subs   = channel.lock();
    let mut closed = Vec::new();

    for (id, sub) in subs.iter() {
      match sub.mailbox.try_send(Arc::clone(&shared)) {
        Ok(()) => report.delivered += 1,
        Err(TrySendError::Full(_)) => {
          report.dropped += 1;
          tracing::warn!(
            connection = %sub.connection,
            topic = %event.topic,
            resource_id = event.resource_id,
            "delivery dropped: mailbox full"
          );
        }
        Err(TrySendError::Closed(_)) => {
          report.dropped += 1;
          closed.push(*id);
          tracing::warn!(
            connection = %sub.connection,
            topic = %event.topic,
            resource_id = event.resource_id,
            "delivery dropped: connection gone"
          );
        }
      }
    }

    for id in closed {
      subs.remove(&id);
    }

    report
  }

  /// Number of subscriptions on `topic`.
  pub fn subscriber_count(&self, topic: &Topic) -> usize {
    self.existing(topic).map_or(0, |channel| channel.lock().len())
  }

  /// Number of topics currently tracked.
  pub fn topic_count(&self) -> usize { self.inner.topics.len() }

  // ── Internals ─────────────────────────────────────────────────────────────

  fn existing(&self, topic: &Topic) -> Option<Arc<TopicChannel>> {
    self.inner.topics.get(topic).map(|entry| Arc::clone(entry.value()))
  }

  /// The channel for `topic`, created on first use. While the returned
  /// handle is alive the channel is never pruned.
  pub(crate) fn channel(&self, topic: Topic) -> Arc<TopicChannel> {
    let entry = self
      .inner
      .topics
      .entry(topic)
      .or_insert_with(|| Arc::new(TopicChannel::new()));
    Arc::clone(entry.value())
  }

  fn detach(&self, topic: Topic, id: SubscriptionId) {
    if let Some(channel) = self.existing(&topic) {
      channel.lock().remove(&id);
    }
    self.prune(topic);
  }

  /// Forget `topic` if nobody subscribes to it and nobody holds its channel.
  pub(crate) fn prune(&self, topic: Topic) {
    self
      .inner
      .topics
      .remove_if(&topic, |_, channel| {
        Arc::strong_count(channel) == 1 && channel.lock().is_empty()
      });
  }
}
