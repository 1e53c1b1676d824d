//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision and a
//! `Z` suffix. Rows come out of SQLite as `Raw*` structs holding plain column
//! values and are converted to domain types off the database thread.

use agora_core::{
  forum::{Post, PostId, ThreadId, ThreadSummary},
  user::{Author, User, UserCredentials, UserId},
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at storage precision, so what a write returns equals what
/// a later read yields.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "id, email, username, created_at, password_hash";

pub struct RawUser {
  pub id:            i64,
  pub email:         String,
  pub username:      String,
  pub created_at:    String,
  pub password_hash: String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      email:         row.get(1)?,
      username:      row.get(2)?,
      created_at:    row.get(3)?,
      password_hash: row.get(4)?,
    })
  }

  pub fn into_credentials(self) -> Result<UserCredentials> {
    Ok(UserCredentials {
      user:          User {
        id:         UserId(self.id),
        email:      self.email,
        username:   self.username,
        created_at: decode_dt(&self.created_at)?,
      },
      password_hash: self.password_hash,
    })
  }

  pub fn into_user(self) -> Result<User> { self.into_credentials().map(|c| c.user) }
}

// ─── Threads ─────────────────────────────────────────────────────────────────

pub const THREAD_SELECT: &str = "
  SELECT t.id, t.title, t.content, t.user_id,
         t.created_at, t.updated_at, t.last_activity_at,
         (SELECT COUNT(*) FROM posts p WHERE p.thread_id = t.id) AS posts_count,
         u.username
  FROM threads t
  JOIN users u ON u.id = t.user_id";

pub struct RawThread {
  pub id:               i64,
  pub title:            String,
  pub content:          String,
  pub user_id:          i64,
  pub created_at:       String,
  pub updated_at:       String,
  pub last_activity_at: String,
  pub posts_count:      i64,
  pub username:         String,
}

impl RawThread {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      title:            row.get(1)?,
      content:          row.get(2)?,
      user_id:          row.get(3)?,
      created_at:       row.get(4)?,
      updated_at:       row.get(5)?,
      last_activity_at: row.get(6)?,
      posts_count:      row.get(7)?,
      username:         row.get(8)?,
    })
  }

  pub fn into_summary(self) -> Result<ThreadSummary> {
    Ok(ThreadSummary {
      id:               ThreadId(self.id),
      title:            self.title,
      content:          self.content,
      user_id:          UserId(self.user_id),
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
      last_activity_at: decode_dt(&self.last_activity_at)?,
      posts_count:      self.posts_count.max(0) as u64,
      user:             Author { id: UserId(self.user_id), username: self.username },
    })
  }
}

// ─── Posts ───────────────────────────────────────────────────────────────────

pub const POST_SELECT: &str = "
  SELECT p.id, p.content, p.user_id, p.thread_id, p.created_at, p.updated_at,
         u.username
  FROM posts p
  JOIN users u ON u.id = p.user_id";

pub struct RawPost {
  pub id:         i64,
  pub content:    String,
  pub user_id:    i64,
  pub thread_id:  i64,
  pub created_at: String,
  pub updated_at: String,
  pub username:   String,
}

impl RawPost {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      content:    row.get(1)?,
      user_id:    row.get(2)?,
      thread_id:  row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
      username:   row.get(6)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      id:         PostId(self.id),
      content:    self.content,
      user_id:    UserId(self.user_id),
      thread_id:  ThreadId(self.thread_id),
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      user:       Author { id: UserId(self.user_id), username: self.username },
    })
  }
}
