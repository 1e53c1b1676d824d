//! Realtime fan-out for Agora.
//!
//! A [`TopicRegistry`] maps topics to the connections subscribed to them and
//! delivers events to exactly those connections. A [`Publisher`] sits in
//! front of it on the write path and only announces state that has been
//! committed.
//!
//! Each topic is guarded independently; no lock spans all topics. Delivery
//! never waits on a consumer: every connection owns a bounded [`Mailbox`],
//! and an event that does not fit is dropped for that connection alone.

mod connection;
mod publisher;
mod registry;

pub use connection::{Connection, ConnectionId, Mailbox, Subscription, SubscriptionId};
pub use publisher::Publisher;
pub use registry::{DEFAULT_MAILBOX_CAPACITY, DeliveryReport, TopicRegistry};
