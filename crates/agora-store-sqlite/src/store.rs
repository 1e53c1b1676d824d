//! [`SqliteStore`]: the SQLite implementation of [`ForumStore`].

use std::path::Path;

use rusqlite::{Connection, OptionalExtension as _};

use agora_core::{
  forum::{NewThread, Post, PostId, PostInput, ThreadChanges, ThreadDetail, ThreadId, ThreadSummary},
  store::{ForumStore, ThreadQuery},
  user::{NewUser, Taken, User, UserCredentials, UserId},
};

use crate::{
  Error, Result,
  encode::{POST_SELECT, RawPost, RawThread, RawUser, THREAD_SELECT, USER_COLUMNS, encode_dt, now},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Agora forum store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers (run on the database thread) ────────────────────────────────

fn select_thread(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawThread>> {
  conn
    .query_row(&format!("{THREAD_SELECT} WHERE t.id = ?1"), [id], RawThread::from_row)
    .optional()
}

fn select_post(conn: &Connection, thread_id: i64, post_id: i64) -> rusqlite::Result<Option<RawPost>> {
  conn
    .query_row(
      &format!("{POST_SELECT} WHERE p.id = ?1 AND p.thread_id = ?2"),
      [post_id, thread_id],
      RawPost::from_row,
    )
    .optional()
}

fn exists(conn: &Connection, sql: &str, value: &str) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, [value], |_| Ok(())).optional()?.is_some())
}

fn touch_thread(conn: &Connection, thread_id: i64, at: &str) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE threads SET last_activity_at = ?2 WHERE id = ?1",
    rusqlite::params![thread_id, at],
  )?;
  Ok(())
}

// ─── ForumStore impl ─────────────────────────────────────────────────────────

impl ForumStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<Result<User, Taken>> {
    let created_at = now();
    let at_str     = encode_dt(created_at);
    let email      = input.email.clone();
    let username   = input.username.clone();

    let outcome: Result<i64, Taken> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Both columns are COLLATE NOCASE, so `=` compares case-insensitively.
        let taken = Taken {
          email:    exists(&tx, "SELECT 1 FROM users WHERE email = ?1", &input.email)?,
          username: exists(&tx, "SELECT 1 FROM users WHERE username = ?1", &input.username)?,
        };
        if taken.any() {
          return Ok(Err(taken));
        }
        tx.execute(
          "INSERT INTO users (email, username, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.email, input.username, input.password_hash, at_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok(id))
      })
      .await?;

    Ok(outcome.map(|id| User { id: UserId(id), email, username, created_at }))
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
              [id.0],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
    let email = email.to_owned();
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
              [email],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_credentials).transpose()
  }

  // ── Threads ───────────────────────────────────────────────────────────────

  async fn list_threads(&self, query: &ThreadQuery) -> Result<Vec<ThreadSummary>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val  = query.limit.map_or(-1, |l| l as i64);
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawThread> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{THREAD_SELECT}
           ORDER BY t.last_activity_at DESC, t.created_at DESC, t.id DESC
           LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map([limit_val, offset_val], RawThread::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawThread::into_summary).collect()
  }

  async fn get_thread(&self, id: ThreadId) -> Result<Option<ThreadSummary>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_thread(conn, id.0)?))
      .await?;
    raw.map(RawThread::into_summary).transpose()
  }

  async fn get_thread_detail(&self, id: ThreadId) -> Result<Option<ThreadDetail>> {
    let raw: Option<(RawThread, Vec<RawPost>)> = self
      .conn
      .call(move |conn| {
        let Some(thread) = select_thread(conn, id.0)? else { return Ok(None) };
        let mut stmt = conn.prepare(&format!(
          "{POST_SELECT} WHERE p.thread_id = ?1 ORDER BY p.created_at ASC, p.id ASC"
        ))?;
        let posts = stmt
          .query_map([id.0], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((thread, posts)))
      })
      .await?;

    let Some((thread, posts)) = raw else { return Ok(None) };
    Ok(Some(ThreadDetail {
      thread: thread.into_summary()?,
      posts:  posts.into_iter().map(RawPost::into_post).collect::<Result<_>>()?,
    }))
  }

  async fn create_thread(&self, owner: UserId, input: NewThread) -> Result<ThreadSummary> {
    let at_str = encode_dt(now());

    let (id, raw) = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO threads (title, content, user_id, created_at, updated_at, last_activity_at)
           VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
          rusqlite::params![input.title, input.content, owner.0, at_str],
        )?;
        let id = conn.last_insert_rowid();
        Ok((id, select_thread(conn, id)?))
      })
      .await?;

    tracing::debug!(thread = id, owner = %owner, "thread stored");
    raw
      .ok_or(Error::MissingRow { table: "threads", id })?
      .into_summary()
  }

  async fn update_thread(
    &self,
    id: ThreadId,
    changes: ThreadChanges,
  ) -> Result<Option<ThreadSummary>> {
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        // A title change also counts as activity on the thread.
        let changed = conn.execute(
          "UPDATE threads
           SET title            = COALESCE(?2, title),
               content          = COALESCE(?3, content),
               updated_at       = ?4,
               last_activity_at = CASE WHEN ?2 IS NOT NULL AND ?2 != title
                                       THEN ?4 ELSE last_activity_at END
           WHERE id = ?1",
          rusqlite::params![id.0, changes.title, changes.content, at_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_thread(conn, id.0)?)
      })
      .await?;

    raw.map(RawThread::into_summary).transpose()
  }

  async fn delete_thread(&self, id: ThreadId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM threads WHERE id = ?1", [id.0])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn get_post(&self, thread_id: ThreadId, post_id: PostId) -> Result<Option<Post>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_post(conn, thread_id.0, post_id.0)?))
      .await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn create_post(
    &self,
    thread_id: ThreadId,
    owner: UserId,
    input: PostInput,
  ) -> Result<Option<Post>> {
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let thread_exists = tx
          .query_row("SELECT 1 FROM threads WHERE id = ?1", [thread_id.0], |_| Ok(()))
          .optional()?
          .is_some();
        if !thread_exists {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO posts (content, user_id, thread_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![input.content, owner.0, thread_id.0, at_str],
        )?;
        let id = tx.last_insert_rowid();
        touch_thread(&tx, thread_id.0, &at_str)?;
        let raw = select_post(&tx, thread_id.0, id)?;
        tx.commit()?;
        Ok(Some((id, raw)))
      })
      .await?;

    let Some((id, raw)) = raw else { return Ok(None) };
    let post = raw.ok_or(Error::MissingRow { table: "posts", id })?.into_post()?;
    tracing::debug!(thread = %thread_id, post = id, owner = %owner, "post stored");
    Ok(Some(post))
  }

  async fn update_post(
    &self,
    thread_id: ThreadId,
    post_id: PostId,
    input: PostInput,
  ) -> Result<Option<Post>> {
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE posts SET content = ?3, updated_at = ?4 WHERE id = ?1 AND thread_id = ?2",
          rusqlite::params![post_id.0, thread_id.0, input.content, at_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        touch_thread(&tx, thread_id.0, &at_str)?;
        let raw = select_post(&tx, thread_id.0, post_id.0)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn delete_post(&self, thread_id: ThreadId, post_id: PostId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM posts WHERE id = ?1 AND thread_id = ?2",
          [post_id.0, thread_id.0],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }
}
