//! The write-path entry point into the registry.
//!
//! Writers on one topic are serialised from the start of their commit to the
//! end of delivery. For `thread:{id}` topics that is one lock per thread;
//! for the `threads` collection topic it means thread creations commit one
//! at a time. Topics never wait on each other.

use std::{future::Future, panic};

use agora_core::event::{Event, Topic};
use tokio::task::JoinError;

use crate::registry::{DeliveryReport, TopicRegistry};

/// Publishes events for committed state only.
#[derive(Clone, Default)]
pub struct Publisher {
  registry: TopicRegistry,
}

impl Publisher {
  pub fn new(registry: TopicRegistry) -> Self { Self { registry } }

  pub fn registry(&self) -> &TopicRegistry { &self.registry }

  /// Deliver an already-committed event.
  pub fn publish(&self, event: &Event) -> DeliveryReport {
    let report = self.registry.deliver(event);
    tracing::debug!(
      topic = %event.topic,
      kind = ?event.kind(),
      resource_id = event.resource_id,
      delivered = report.delivered,
      dropped = report.dropped,
      "event published"
    );
    report
  }

  /// Run `commit`, then announce its result on `topic`.
  ///
  /// Subscribers observe events in commit order. Nothing is published when
  /// the commit fails, and `announce` may return `None` to publish nothing
  /// for a successful commit.
  ///
  /// Commit and announcement run on their own task: dropping the returned
  /// future does not stop a commit that has started, nor the announcement
  /// that follows it. A panic inside `commit` resumes in the caller; a task
  /// cancelled by runtime shutdown surfaces as `E::from(JoinError)`.
  pub async fn commit_then_publish<T, E, F, A>(
    &self,
    topic: Topic,
    commit: F,
    announce: A,
  ) -> Result<T, E>
  where
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
    A: FnOnce(&T) -> Option<Event> + Send + 'static,
  {
    let publisher = self.clone();
    let task = tokio::spawn(async move { publisher.gated(topic, commit, announce).await });
    match task.await {
      Ok(result) => result,
      Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
      Err(e) => {
        tracing::warn!(%topic, error = %e, "commit task cancelled");
        Err(E::from(e))
      }
    }
  }

  async fn gated<T, E, F, A>(&self, topic: Topic, commit: F, announce: A) -> Result<T, E>
  where
    F: Future<Output = Result<T, E>>,
    A: FnOnce(&T) -> Option<Event>,
  {
    let channel = self.registry.channel(topic);
    let result = {
      let _gate = channel.gate.lock().await;
      let result = commit.await;
      match &result {
        Ok(value) => {
          if let Some(event) = announce(value) {
            debug_assert_eq!(event.topic, topic);
            self.publish(&event);
          }
        }
        Err(_) => tracing::debug!(%topic, "commit failed; nothing published"),
      }
      result
    };
    drop(channel);
    self.registry.prune(topic);
    result
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Arc,
      atomic::{AtomicI64, Ordering},
    },
    time::Duration,
  };

  use agora_core::{
    forum::{Post, PostId, ThreadId},
    user::{Author, UserId},
  };
  use chrono::Utc;

  use super::*;

  #[derive(Debug, PartialEq)]
  enum Failure {
    DiskFull,
    Aborted,
  }

  impl From<JoinError> for Failure {
    fn from(_: JoinError) -> Self { Failure::Aborted }
  }

  fn post(thread: i64, id: i64) -> Post {
    let now = Utc::now();
    Post {
      id:         PostId(id),
      content:    format!("post {id}"),
      user_id:    UserId(1),
      thread_id:  ThreadId(thread),
      created_at: now,
      updated_at: now,
      user:       Author { id: UserId(1), username: "alice".into() },
    }
  }

  #[tokio::test]
  async fn failed_commit_publishes_nothing() {
    let publisher = Publisher::default();
    let (c, mut rx) = publisher.registry().connect();
    c.subscribe(Topic::Thread(ThreadId(1)));

    let result: Result<Post, Failure> = publisher
      .commit_then_publish(
        Topic::Thread(ThreadId(1)),
        async { Err(Failure::DiskFull) },
        |p: &Post| Some(Event::post_created(p.clone())),
      )
      .await;

    assert_eq!(result.unwrap_err(), Failure::DiskFull);
    assert!(rx.try_recv().is_none());
  }

  #[tokio::test]
  async fn successful_commit_is_announced_once() {
    let publisher = Publisher::default();
    let (c, mut rx) = publisher.registry().connect();
    c.subscribe(Topic::Thread(ThreadId(3)));

    let result: Result<Post, Failure> = publisher
      .commit_then_publish(
        Topic::Thread(ThreadId(3)),
        async { Ok(post(3, 11)) },
        |p: &Post| Some(Event::post_created(p.clone())),
      )
      .await;

    assert_eq!(result.unwrap().id, PostId(11));
    assert_eq!(rx.recv().await.unwrap().resource_id, 11);
    assert!(rx.try_recv().is_none());
  }

  #[tokio::test]
  async fn gate_does_not_leak_topics() {
    let publisher = Publisher::default();
    let _: Result<(), Failure> = publisher
      .commit_then_publish(Topic::Threads, async { Ok(()) }, |_| None)
      .await;
    assert_eq!(publisher.registry().topic_count(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn delivery_order_matches_commit_order() {
    let publisher = Publisher::default();
    let topic = Topic::Thread(ThreadId(1));
    let (c, mut rx) = publisher.registry().connect();
    c.subscribe(topic);

    // Ids are handed out inside the commit, like an autoincrement column.
    let sequence = Arc::new(AtomicI64::new(1));
    let mut writers = Vec::new();
    for n in 0..32u64 {
      let publisher = publisher.clone();
      let sequence = sequence.clone();
      writers.push(tokio::spawn(async move {
        let _: Result<Post, Failure> = publisher
          .commit_then_publish(
            topic,
            async move {
              let id = sequence.fetch_add(1, Ordering::SeqCst);
              tokio::time::sleep(Duration::from_millis((n * 7) % 5)).await;
              Ok(post(1, id))
            },
            |p: &Post| Some(Event::post_created(p.clone())),
          )
          .await;
      }));
    }
    for w in writers {
      w.await.unwrap();
    }

    let mut seen = Vec::new();
    while let Some(event) = rx.try_recv() {
      seen.push(event.resource_id);
    }
    assert_eq!(seen, (1..=32).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn abandoned_caller_still_announces_its_commit() {
    let publisher = Publisher::default();
    let topic = Topic::Thread(ThreadId(5));
    let (c, mut rx) = publisher.registry().connect();
    c.subscribe(topic);

    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let write = publisher.commit_then_publish(
      topic,
      async move {
        let _ = started_tx.send(());
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, Failure>(post(5, 21))
      },
      |p: &Post| Some(Event::post_created(p.clone())),
    );

    // Drop the caller once the commit is under way.
    tokio::select! {
      _ = write => panic!("commit finished before the caller was dropped"),
      _ = started_rx => {}
    }

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .expect("announcement after the caller went away")
      .unwrap();
    assert_eq!(event.resource_id, 21);
  }
}
