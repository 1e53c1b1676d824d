//! Connections, their subscriptions, and their mailboxes.

use std::{
  collections::HashMap,
  fmt,
  sync::{Arc, Mutex, MutexGuard},
};

use agora_core::event::{Event, Topic};
use tokio::sync::mpsc;

use crate::registry::TopicRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "c{}", self.0) }
}

impl fmt::Display for SubscriptionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "s{}", self.0) }
}

// ─── Shared connection state ─────────────────────────────────────────────────

/// The topics a connection listens to. Shared between the [`Connection`],
/// its [`Mailbox`] and every [`Subscription`] it handed out.
pub(crate) struct ConnectionState {
  pub(crate) id: ConnectionId,
  subscriptions: Mutex<HashMap<Topic, SubscriptionId>>,
}

impl ConnectionState {
  pub(crate) fn new(id: ConnectionId) -> Self {
    Self { id, subscriptions: Mutex::new(HashMap::new()) }
  }

  pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<Topic, SubscriptionId>> {
    self.subscriptions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn is_subscribed(&self, topic: &Topic) -> bool { self.lock().contains_key(topic) }
}

// ─── Connection ──────────────────────────────────────────────────────────────

/// One client's handle on the registry.
///
/// Owns its subscriptions: dropping the connection cancels all of them in one
/// step, so a torn-down transport can never leak a subscription.
pub struct Connection {
  state:    Arc<ConnectionState>,
  registry: TopicRegistry,
  sender:   mpsc::Sender<Arc<Event>>,
}

impl Connection {
  pub(crate) fn new(
    state: Arc<ConnectionState>,
    registry: TopicRegistry,
    sender: mpsc::Sender<Arc<Event>>,
  ) -> Self {
    Self { state, registry, sender }
  }

  pub(crate) fn state(&self) -> &Arc<ConnectionState> { &self.state }

  pub(crate) fn sender(&self) -> &mpsc::Sender<Arc<Event>> { &self.sender }

  pub fn id(&self) -> ConnectionId { self.state.id }

  pub fn is_subscribed(&self, topic: &Topic) -> bool { self.state.is_subscribed(topic) }

  /// Currently subscribed topics, in no particular order.
  pub fn topics(&self) -> Vec<Topic> { self.state.lock().keys().copied().collect() }

  /// Subscribe this connection to `topic` on its registry.
  pub fn subscribe(&self, topic: Topic) -> Subscription { self.registry.subscribe(self, topic) }

  /// Cancel this connection's subscription to `topic`, if any. Returns
  /// whether one existed.
  pub fn unsubscribe(&self, topic: &Topic) -> bool {
    let existing = self.state.lock().get(topic).copied();
    match existing {
      Some(id) => {
        self.registry.unsubscribe(&Subscription::new(id, *topic, self.state.clone()));
        true
      }
      None => false,
    }
  }
}

impl Drop for Connection {
  fn drop(&mut self) { self.registry.disconnect(&self.state); }
}

impl fmt::Debug for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Connection")
      .field("id", &self.state.id)
      .field("topics", &self.topics())
      .finish()
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// Binds one connection to one topic until unsubscribed or the connection
/// closes.
#[derive(Clone)]
pub struct Subscription {
  pub(crate) id:         SubscriptionId,
  pub(crate) topic:      Topic,
  pub(crate) connection: Arc<ConnectionState>,
}

impl Subscription {
  pub(crate) fn new(id: SubscriptionId, topic: Topic, connection: Arc<ConnectionState>) -> Self {
    Self { id, topic, connection }
  }

  pub fn id(&self) -> SubscriptionId { self.id }

  pub fn topic(&self) -> Topic { self.topic }

  pub fn connection_id(&self) -> ConnectionId { self.connection.id }

  /// `false` once unsubscribed, directly or by connection teardown.
  pub fn is_active(&self) -> bool {
    self.connection.lock().get(&self.topic) == Some(&self.id)
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .field("topic", &self.topic)
      .field("connection", &self.connection.id)
      .finish()
  }
}

// ─── Mailbox ─────────────────────────────────────────────────────────────────

/// The receiving end of a connection: events delivered to it, in delivery
/// order, for the transport to forward.
///
/// Events for a topic the connection has since left are discarded here, so a
/// consumer never sees a delivery after its unsubscribe returned.
pub struct Mailbox {
  state: Arc<ConnectionState>,
  rx:    mpsc::Receiver<Arc<Event>>,
}

impl Mailbox {
  pub(crate) fn new(state: Arc<ConnectionState>, rx: mpsc::Receiver<Arc<Event>>) -> Self {
    Self { state, rx }
  }

  /// Wait for the next event. `None` once the connection is closed and the
  /// queue is drained.
  pub async fn recv(&mut self) -> Option<Arc<Event>> {
    loop {
      let event = self.rx.recv().await?;
      if self.accepts(&event) {
        return Some(event);
      }
    }
  }

  /// Non-blocking variant of [`recv`](Self::recv).
  pub fn try_recv(&mut self) -> Option<Arc<Event>> {
    while let Ok(event) = self.rx.try_recv() {
      if self.accepts(&event) {
        return Some(event);
      }
    }
    None
  }

  fn accepts(&self, event: &Event) -> bool {
    let ok = self.state.is_subscribed(&event.topic);
    if !ok {
      tracing::trace!(
        connection = %self.state.id,
        topic = %event.topic,
        "discarding event for topic no longer subscribed"
      );
    }
    ok
  }
}
