//! Topics and broadcast events.
//!
//! A [`Topic`] is derived deterministically from resource identity: the
//! collection topic `threads`, and one `thread:{id}` topic per thread. An
//! [`Event`] always carries the full resource it announces, never a delta.
//!
//! The payload shape is fixed per kind. Thread events carry a
//! [`ThreadSummary`] (no nested posts) so the collection topic stays small;
//! post events carry the [`Post`] with its author.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  forum::{Post, ThreadId, ThreadSummary},
};

// ─── Topic ───────────────────────────────────────────────────────────────────

/// A named broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Topic {
  /// Announces every newly created thread.
  Threads,
  /// Announces every new post in one thread.
  Thread(ThreadId),
}

impl Topic {
  pub const THREADS: &'static str = "threads";
  const THREAD_PREFIX: &'static str = "thread:";
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Topic::Threads    => f.write_str(Self::THREADS),
      Topic::Thread(id) => write!(f, "{}{id}", Self::THREAD_PREFIX),
    }
  }
}

impl FromStr for Topic {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    if s == Self::THREADS {
      return Ok(Topic::Threads);
    }
    // Only canonical decimal ids are accepted so that one thread never maps
    // to two topic names (`thread:07` vs `thread:7`).
    let id = s
      .strip_prefix(Self::THREAD_PREFIX)
      .filter(|digits| {
        !digits.is_empty()
          && digits.bytes().all(|b| b.is_ascii_digit())
          && (digits == &"0" || !digits.starts_with('0'))
      })
      .and_then(|digits| digits.parse::<i64>().ok())
      .ok_or_else(|| Error::InvalidTopic(s.to_string()))?;
    Ok(Topic::Thread(ThreadId(id)))
  }
}

impl TryFrom<String> for Topic {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<Topic> for String {
  fn from(t: Topic) -> Self { t.to_string() }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// Discriminant of [`EventPayload`], exposed on the wire as `event_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Thread,
  Post,
}

/// The typed payload of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_kind", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
  Thread(ThreadSummary),
  Post(Post),
}

impl EventPayload {
  pub fn kind(&self) -> EventKind {
    match self {
      EventPayload::Thread(_) => EventKind::Thread,
      EventPayload::Post(_)   => EventKind::Post,
    }
  }

  /// The id of the thread or post carried by this payload.
  pub fn resource_id(&self) -> i64 {
    match self {
      EventPayload::Thread(t) => t.id.0,
      EventPayload::Post(p)   => p.id.0,
    }
  }

  /// The topic this payload belongs on. Thread payloads go to the
  /// collection topic, post payloads to their thread's topic.
  pub fn topic(&self) -> Topic {
    match self {
      EventPayload::Thread(_) => Topic::Threads,
      EventPayload::Post(p)   => Topic::Thread(p.thread_id),
    }
  }
}

/// An immutable notification that a resource was committed.
///
/// Serialises as
/// `{"topic", "resource_id", "occurred_at", "event_kind", "payload"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub topic:       Topic,
  pub resource_id: i64,
  /// Commit time of the underlying write.
  pub occurred_at: DateTime<Utc>,
  #[serde(flatten)]
  pub payload:     EventPayload,
}

impl Event {
  /// Build the event for `payload` on the topic its kind dictates.
  pub fn new(payload: EventPayload, occurred_at: DateTime<Utc>) -> Self {
    Self {
      topic: payload.topic(),
      resource_id: payload.resource_id(),
      occurred_at,
      payload,
    }
  }

  pub fn thread_created(thread: ThreadSummary) -> Self {
    let at = thread.created_at;
    Self::new(EventPayload::Thread(thread), at)
  }

  pub fn post_created(post: Post) -> Self {
    let at = post.created_at;
    Self::new(EventPayload::Post(post), at)
  }

  pub fn kind(&self) -> EventKind { self.payload.kind() }
}
