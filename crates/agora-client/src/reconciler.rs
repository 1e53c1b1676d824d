//! [`LocalCache`]: the client's view of the forum, kept current by merging
//! pushed events into state fetched over HTTP.
//!
//! Thread events are upserts, so replaying one changes nothing. Post events
//! append unless the post is already present. Events that reference a thread
//! the cache has not loaded are dropped; the next authoritative fetch picks
//! them up.

use std::collections::HashMap;

use agora_core::{
  event::{Event, EventPayload},
  forum::{Post, ThreadDetail, ThreadId, ThreadSummary},
};

/// What [`LocalCache::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  /// A thread not seen before was put at the front of the list.
  Inserted,
  /// A cached thread was replaced and moved to the front.
  Bumped,
  /// A post was appended to its thread.
  Appended,
  /// The post was already cached; nothing changed.
  Duplicate,
  /// The event referenced a thread that is not loaded.
  Dropped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCache {
  /// Display order: most recent activity first.
  threads: Vec<ThreadSummary>,
  /// Threads opened in detail, with their posts in arrival order.
  details: HashMap<ThreadId, ThreadDetail>,
}

impl LocalCache {
  pub fn new() -> Self { Self::default() }

  // ── Authoritative fetch path ──────────────────────────────────────────────

  /// Replace the thread list with a freshly fetched one.
  pub fn load_threads(&mut self, threads: Vec<ThreadSummary>) { self.threads = threads; }

  /// Cache a freshly fetched thread with its posts, replacing any earlier
  /// copy. The list entry, if present, is refreshed in place.
  pub fn load_thread(&mut self, detail: ThreadDetail) {
    if let Some(slot) = self.threads.iter_mut().find(|t| t.id == detail.thread.id) {
      *slot = detail.thread.clone();
    }
    self.details.insert(detail.thread.id, detail);
  }

  /// Stop tracking a thread's posts, e.g. when its view is closed. Later
  /// post events for it are dropped.
  pub fn forget_thread(&mut self, id: ThreadId) -> bool { self.details.remove(&id).is_some() }

  // ── Accessors ─────────────────────────────────────────────────────────────

  pub fn threads(&self) -> &[ThreadSummary] { &self.threads }

  pub fn thread(&self, id: ThreadId) -> Option<&ThreadSummary> {
    self
      .details
      .get(&id)
      .map(|d| &d.thread)
      .or_else(|| self.threads.iter().find(|t| t.id == id))
  }

  /// Posts of a loaded thread; `None` if the thread is not loaded.
  pub fn posts(&self, id: ThreadId) -> Option<&[Post]> {
    self.details.get(&id).map(|d| d.posts.as_slice())
  }

  // ── Reconciliation ────────────────────────────────────────────────────────

  pub fn apply(&mut self, event: &Event) -> Applied {
    let applied = match &event.payload {
      EventPayload::Thread(thread) => self.upsert_thread(thread),
      EventPayload::Post(post) => self.append_post(post),
    };
    tracing::trace!(topic = %event.topic, resource_id = event.resource_id, ?applied, "event applied");
    applied
  }

  fn upsert_thread(&mut self, thread: &ThreadSummary) -> Applied {
    if let Some(detail) = self.details.get_mut(&thread.id) {
      detail.thread = thread.clone();
    }
    match self.threads.iter().position(|t| t.id == thread.id) {
      Some(index) => {
        self.threads.remove(index);
        self.threads.insert(0, thread.clone());
        Applied::Bumped
      }
      None => {
        self.threads.insert(0, thread.clone());
        Applied::Inserted
      }
    }
  }

  fn append_post(&mut self, post: &Post) -> Applied {
    let Some(detail) = self.details.get_mut(&post.thread_id) else {
      return Applied::Dropped;
    };
    if detail.posts.iter().any(|p| p.id == post.id) {
      return Applied::Duplicate;
    }
    detail.posts.push(post.clone());
    detail.thread.posts_count += 1;
    if let Some(summary) = self.threads.iter_mut().find(|t| t.id == post.thread_id) {
      summary.posts_count = detail.thread.posts_count;
    }
    Applied::Appended
  }
}
