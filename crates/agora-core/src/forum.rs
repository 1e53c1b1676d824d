//! Threads and posts: the two owned resource types.
//!
//! Every resource has exactly one owning user, fixed at creation. Nothing in
//! this crate can change `user_id` after the fact; the update inputs below
//! only carry content fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  user::{Author, UserId},
  validate::Validator,
};

// ─── Identifiers ─────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ThreadId(pub i64);

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for ThreadId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl fmt::Display for PostId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// A resource with a single, immutable owner.
pub trait Owned {
  fn owner_id(&self) -> UserId;
}

// ─── Threads ─────────────────────────────────────────────────────────────────

/// A thread without its posts. This is the shape listed on the index page and
/// pushed on the `threads` collection topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
  pub id:               ThreadId,
  pub title:            String,
  pub content:          String,
  pub user_id:          UserId,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
  /// Bumped by thread creation, title edits and every new or edited post.
  pub last_activity_at: DateTime<Utc>,
  pub posts_count:      u64,
  pub user:             Author,
}

impl Owned for ThreadSummary {
  fn owner_id(&self) -> UserId { self.user_id }
}

/// A thread together with its posts in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDetail {
  #[serde(flatten)]
  pub thread: ThreadSummary,
  pub posts:  Vec<Post>,
}

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 200;
pub const THREAD_CONTENT_MIN: usize = 10;
pub const THREAD_CONTENT_MAX: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThread {
  pub title:   String,
  pub content: String,
}

impl NewThread {
  pub fn validate(&self) -> Result<()> {
    let mut v = Validator::default();
    check_title(&mut v, &self.title);
    check_thread_content(&mut v, &self.content);
    v.finish()
  }
}

/// Partial update of a thread; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadChanges {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
}

impl ThreadChanges {
  pub fn validate(&self) -> Result<()> {
    let mut v = Validator::default();
    if let Some(title) = &self.title {
      check_title(&mut v, title);
    }
    if let Some(content) = &self.content {
      check_thread_content(&mut v, content);
    }
    v.finish()
  }
}

fn check_title(v: &mut Validator, title: &str) {
  v.presence("Title", title);
  v.length("Title", title, TITLE_MIN, TITLE_MAX);
}

fn check_thread_content(v: &mut Validator, content: &str) {
  v.presence("Content", content);
  v.length("Content", content, THREAD_CONTENT_MIN, THREAD_CONTENT_MAX);
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// A reply within a thread, including its author's id and username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub id:         PostId,
  pub content:    String,
  pub user_id:    UserId,
  pub thread_id:  ThreadId,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub user:       Author,
}

impl Owned for Post {
  fn owner_id(&self) -> UserId { self.user_id }
}

pub const POST_CONTENT_MIN: usize = 1;
pub const POST_CONTENT_MAX: usize = 5_000;

/// Body of both post creation and post update; content is the only field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInput {
  pub content: String,
}

impl PostInput {
  pub fn validate(&self) -> Result<()> {
    let mut v = Validator::default();
    v.presence("Content", &self.content);
    v.length("Content", &self.content, POST_CONTENT_MIN, POST_CONTENT_MAX);
    v.finish()
  }
}
