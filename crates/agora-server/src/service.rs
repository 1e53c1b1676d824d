//! The forum's write and read paths: validate, check ownership, commit, and
//! announce.
//!
//! Every mutation of an existing resource first loads it, so that a missing
//! resource and one owned by somebody else fail the same way. Creation is the
//! only write that publishes, and it publishes only what the store committed.

use std::sync::Arc;

use agora_auth::{Principal, authorize};
use agora_core::{
  event::{Event, Topic},
  forum::{
    NewThread, Post, PostId, PostInput, ThreadChanges, ThreadDetail, ThreadId, ThreadSummary,
  },
  store::{ForumStore, ThreadQuery},
};
use agora_realtime::Publisher;

use crate::error::{ApiError, store_failure};

pub struct ForumService<'a, S> {
  store:     &'a Arc<S>,
  publisher: &'a Publisher,
}

impl<'a, S: ForumStore + 'static> ForumService<'a, S> {
  pub fn new(store: &'a Arc<S>, publisher: &'a Publisher) -> Self { Self { store, publisher } }

  // ── Threads ───────────────────────────────────────────────────────────────

  pub async fn list_threads(&self, query: &ThreadQuery) -> Result<Vec<ThreadSummary>, ApiError> {
    self
      .store
      .list_threads(query)
      .await
      .map_err(store_failure("list_threads"))
  }

  pub async fn show_thread(&self, id: ThreadId) -> Result<ThreadDetail, ApiError> {
    self
      .store
      .get_thread_detail(id)
      .await
      .map_err(store_failure("get_thread_detail"))?
      .ok_or(ApiError::NotFound)
  }

  /// Commit a new thread, then announce it on `threads`.
  pub async fn create_thread(
    &self,
    principal: &Principal,
    input: NewThread,
  ) -> Result<ThreadSummary, ApiError> {
    input.validate()?;
    let store = Arc::clone(self.store);
    let owner = principal.id;
    let commit = async move {
      store
        .create_thread(owner, input)
        .await
        .map_err(store_failure("create_thread"))
    };
    let thread = self
      .publisher
      .commit_then_publish(Topic::Threads, commit, |t: &ThreadSummary| {
        Some(Event::thread_created(t.clone()))
      })
      .await?;
    tracing::info!(thread = %thread.id, owner = %principal.id, "thread created");
    Ok(thread)
  }

  async fn owned_thread(
    &self,
    principal: &Principal,
    id: ThreadId,
  ) -> Result<ThreadSummary, ApiError> {
    let thread = self
      .store
      .get_thread(id)
      .await
      .map_err(store_failure("get_thread"))?
      .ok_or(ApiError::NotFound)?;
    authorize(principal, &thread).require()?;
    Ok(thread)
  }

  pub async fn update_thread(
    &self,
    principal: &Principal,
    id: ThreadId,
    changes: ThreadChanges,
  ) -> Result<ThreadSummary, ApiError> {
    self.owned_thread(principal, id).await?;
    changes.validate()?;
    self
      .store
      .update_thread(id, changes)
      .await
      .map_err(store_failure("update_thread"))?
      .ok_or(ApiError::NotFound)
  }

  pub async fn delete_thread(&self, principal: &Principal, id: ThreadId) -> Result<(), ApiError> {
    self.owned_thread(principal, id).await?;
    let deleted = self
      .store
      .delete_thread(id)
      .await
      .map_err(store_failure("delete_thread"))?;
    if !deleted {
      return Err(ApiError::NotFound);
    }
    tracing::info!(thread = %id, "thread deleted");
    Ok(())
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  /// Commit a reply, then announce it on the thread's own topic.
  pub async fn create_post(
    &self,
    principal: &Principal,
    thread_id: ThreadId,
    input: PostInput,
  ) -> Result<Post, ApiError> {
    let exists = self
      .store
      .get_thread(thread_id)
      .await
      .map_err(store_failure("get_thread"))?
      .is_some();
    if !exists {
      return Err(ApiError::NotFound);
    }
    input.validate()?;

    let store = Arc::clone(self.store);
    let owner = principal.id;
    let commit = async move {
      store
        .create_post(thread_id, owner, input)
        .await
        .map_err(store_failure("create_post"))
    };
    // The thread may vanish between the check and the commit; then the
    // store writes nothing and nothing is announced.
    let post = self
      .publisher
      .commit_then_publish(Topic::Thread(thread_id), commit, |p: &Option<Post>| {
        p.as_ref().map(|p| Event::post_created(p.clone()))
      })
      .await?
      .ok_or(ApiError::NotFound)?;
    tracing::info!(thread = %thread_id, post = %post.id, owner = %principal.id, "post created");
    Ok(post)
  }

  async fn owned_post(
    &self,
    principal: &Principal,
    thread_id: ThreadId,
    id: PostId,
  ) -> Result<Post, ApiError> {
    let post = self
      .store
      .get_post(thread_id, id)
      .await
      .map_err(store_failure("get_post"))?
      .ok_or(ApiError::NotFound)?;
    authorize(principal, &post).require()?;
    Ok(post)
  }

  pub async fn update_post(
    &self,
    principal: &Principal,
    thread_id: ThreadId,
    id: PostId,
    input: PostInput,
  ) -> Result<Post, ApiError> {
    self.owned_post(principal, thread_id, id).await?;
    input.validate()?;
    self
      .store
      .update_post(thread_id, id, input)
      .await
      .map_err(store_failure("update_post"))?
      .ok_or(ApiError::NotFound)
  }

  pub async fn delete_post(
    &self,
    principal: &Principal,
    thread_id: ThreadId,
    id: PostId,
  ) -> Result<(), ApiError> {
    self.owned_post(principal, thread_id, id).await?;
    let deleted = self
      .store
      .delete_post(thread_id, id)
      .await
      .map_err(store_failure("delete_post"))?;
    if !deleted {
      return Err(ApiError::NotFound);
    }
    Ok(())
  }
}
