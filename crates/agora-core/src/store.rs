//! The `ForumStore` trait and supporting query types.
//!
//! The trait is the persistence contract the Resource Service relies on. It
//! is implemented by storage backends (e.g. `agora-store-sqlite`). Backends
//! must enforce referential integrity: deleting a thread deletes its posts.
//!
//! Every write method returns only after the change is durably committed;
//! callers publish broadcast events on the strength of that guarantee.

use std::future::Future;

use crate::{
  forum::{Post, PostId, PostInput, NewThread, ThreadChanges, ThreadDetail, ThreadId, ThreadSummary},
  user::{NewUser, Taken, User, UserCredentials, UserId},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ForumStore::list_threads`].
#[derive(Debug, Clone, Default)]
pub struct ThreadQuery {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an Agora persistence backend.
///
/// Lookups return `None` for absent rows. Writes targeting an absent row also
/// return `None` rather than an error, so callers can surface "not found"
/// without inspecting backend-specific error types.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ForumStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. Email and username are unique case-insensitively;
  /// a collision yields `Ok(Err(Taken))` and writes nothing.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Result<User, Taken>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Case-insensitive lookup by email, including the password hash.
  fn find_credentials<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + 'a;

  // ── Threads ───────────────────────────────────────────────────────────

  /// Summaries ordered by `last_activity_at` then `created_at`, newest first.
  fn list_threads<'a>(
    &'a self,
    query: &'a ThreadQuery,
  ) -> impl Future<Output = Result<Vec<ThreadSummary>, Self::Error>> + Send + 'a;

  fn get_thread(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<Option<ThreadSummary>, Self::Error>> + Send + '_;

  /// The thread with its posts in creation order.
  fn get_thread_detail(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<Option<ThreadDetail>, Self::Error>> + Send + '_;

  fn create_thread(
    &self,
    owner: UserId,
    input: NewThread,
  ) -> impl Future<Output = Result<ThreadSummary, Self::Error>> + Send + '_;

  /// Apply `changes`; a title change bumps `last_activity_at`.
  fn update_thread(
    &self,
    id: ThreadId,
    changes: ThreadChanges,
  ) -> impl Future<Output = Result<Option<ThreadSummary>, Self::Error>> + Send + '_;

  /// Delete a thread and, by cascade, all of its posts. Returns `false` if
  /// the thread did not exist.
  fn delete_thread(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Look up a post scoped to its thread; a post id under the wrong thread
  /// is treated as absent.
  fn get_post(
    &self,
    thread_id: ThreadId,
    post_id: PostId,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Persist a reply and bump the thread's `last_activity_at`. Returns `None`
  /// if the thread does not exist.
  fn create_post(
    &self,
    thread_id: ThreadId,
    owner: UserId,
    input: PostInput,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  fn update_post(
    &self,
    thread_id: ThreadId,
    post_id: PostId,
    input: PostInput,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  fn delete_post(
    &self,
    thread_id: ThreadId,
    post_id: PostId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
