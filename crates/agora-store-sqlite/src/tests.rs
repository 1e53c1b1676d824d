//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use agora_core::{
  forum::{NewThread, PostId, PostInput, ThreadChanges, ThreadId},
  store::{ForumStore, ThreadQuery},
  user::{NewUser, Taken, User, UserId},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Keeps successive writes on distinct timestamps.
async fn tick() { tokio::time::sleep(Duration::from_millis(2)).await }

async fn user(s: &SqliteStore, name: &str) -> User {
  s.create_user(NewUser {
    email:         format!("{name}@example.com"),
    username:      name.into(),
    password_hash: "$argon2id$placeholder".into(),
  })
  .await
  .unwrap()
  .expect("fresh user")
}

fn new_thread(title: &str) -> NewThread {
  NewThread { title: title.into(), content: "Some thread content".into() }
}

fn reply(content: &str) -> PostInput { PostInput { content: content.into() } }

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let fetched = s.get_user(alice.id).await.unwrap().unwrap();
  assert_eq!(fetched, alice);
  assert!(s.get_user(UserId(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn uniqueness_is_case_insensitive_and_reports_each_field() {
  let s = store().await;
  user(&s, "alice").await;

  let clash = s
    .create_user(NewUser {
      email:         "ALICE@example.com".into(),
      username:      "Alice".into(),
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  assert_eq!(clash, Err(Taken { email: true, username: true }));

  let email_only = s
    .create_user(NewUser {
      email:         "Alice@Example.com".into(),
      username:      "someone".into(),
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  assert_eq!(email_only, Err(Taken { email: true, username: false }));
}

#[tokio::test]
async fn credentials_lookup_ignores_case() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let creds = s.find_credentials("ALICE@EXAMPLE.COM").await.unwrap().unwrap();
  assert_eq!(creds.user.id, alice.id);
  assert_eq!(creds.password_hash, "$argon2id$placeholder");
  assert!(s.find_credentials("nobody@example.com").await.unwrap().is_none());
}

// ─── Threads ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_thread_returns_summary_with_author() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let t = s.create_thread(alice.id, new_thread("Hello world")).await.unwrap();
  assert_eq!(t.title, "Hello world");
  assert_eq!(t.user_id, alice.id);
  assert_eq!(t.user.username, "alice");
  assert_eq!(t.posts_count, 0);
  assert_eq!(t.created_at, t.last_activity_at);

  assert_eq!(s.get_thread(t.id).await.unwrap(), Some(t));
}

#[tokio::test]
async fn list_orders_by_latest_activity() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let first = s.create_thread(alice.id, new_thread("First thread")).await.unwrap();
  tick().await;
  let second = s.create_thread(alice.id, new_thread("Second thread")).await.unwrap();

  let ids: Vec<_> = s
    .list_threads(&ThreadQuery::default())
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.id)
    .collect();
  assert_eq!(ids, vec![second.id, first.id]);

  // A reply in the older thread moves it to the top.
  tick().await;
  s.create_post(first.id, alice.id, reply("bump")).await.unwrap().unwrap();
  let listed = s.list_threads(&ThreadQuery::default()).await.unwrap();
  assert_eq!(listed[0].id, first.id);
  assert_eq!(listed[0].posts_count, 1);
  assert!(listed[0].last_activity_at > first.last_activity_at);
}

#[tokio::test]
async fn list_paginates() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  for n in 0..5 {
    s.create_thread(alice.id, new_thread(&format!("Thread {n}"))).await.unwrap();
    tick().await;
  }

  let page = s
    .list_threads(&ThreadQuery { limit: Some(2), offset: Some(1) })
    .await
    .unwrap();
  let titles: Vec<_> = page.iter().map(|t| t.title.as_str()).collect();
  assert_eq!(titles, vec!["Thread 3", "Thread 2"]);
}

#[tokio::test]
async fn title_change_bumps_activity_content_change_does_not() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let t = s.create_thread(alice.id, new_thread("Original title")).await.unwrap();

  tick().await;
  let edited = s
    .update_thread(t.id, ThreadChanges { title: None, content: Some("New content here".into()) })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(edited.content, "New content here");
  assert_eq!(edited.last_activity_at, t.last_activity_at);
  assert!(edited.updated_at > t.updated_at);

  tick().await;
  let renamed = s
    .update_thread(t.id, ThreadChanges { title: Some("Better title".into()), content: None })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(renamed.title, "Better title");
  assert_eq!(renamed.content, "New content here");
  assert!(renamed.last_activity_at > t.last_activity_at);
}

#[tokio::test]
async fn writes_to_missing_rows_return_none() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  assert!(s.update_thread(ThreadId(42), ThreadChanges::default()).await.unwrap().is_none());
  assert!(!s.delete_thread(ThreadId(42)).await.unwrap());
  assert!(s.create_post(ThreadId(42), alice.id, reply("hi")).await.unwrap().is_none());
  assert!(s.update_post(ThreadId(42), PostId(1), reply("hi")).await.unwrap().is_none());
  assert!(!s.delete_post(ThreadId(42), PostId(1)).await.unwrap());
  assert!(s.get_thread_detail(ThreadId(42)).await.unwrap().is_none());
}

// ─── Posts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn detail_lists_posts_in_creation_order() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let t = s.create_thread(alice.id, new_thread("Discussion")).await.unwrap();

  let p1 = s.create_post(t.id, bob.id, reply("first")).await.unwrap().unwrap();
  tick().await;
  let p2 = s.create_post(t.id, alice.id, reply("second")).await.unwrap().unwrap();

  let detail = s.get_thread_detail(t.id).await.unwrap().unwrap();
  assert_eq!(detail.thread.posts_count, 2);
  assert_eq!(detail.posts, vec![p1.clone(), p2]);
  assert_eq!(p1.user.username, "bob");
  assert_eq!(p1.thread_id, t.id);
}

#[tokio::test]
async fn post_lookup_is_scoped_to_its_thread() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let a = s.create_thread(alice.id, new_thread("Thread A")).await.unwrap();
  let b = s.create_thread(alice.id, new_thread("Thread B")).await.unwrap();
  let p = s.create_post(a.id, alice.id, reply("in A")).await.unwrap().unwrap();

  assert!(s.get_post(a.id, p.id).await.unwrap().is_some());
  assert!(s.get_post(b.id, p.id).await.unwrap().is_none());
  assert!(s.update_post(b.id, p.id, reply("moved?")).await.unwrap().is_none());
  assert!(!s.delete_post(b.id, p.id).await.unwrap());
}

#[tokio::test]
async fn editing_a_post_bumps_thread_activity() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let t = s.create_thread(alice.id, new_thread("Thread")).await.unwrap();
  let p = s.create_post(t.id, alice.id, reply("draft")).await.unwrap().unwrap();

  tick().await;
  let edited = s.update_post(t.id, p.id, reply("final")).await.unwrap().unwrap();
  assert_eq!(edited.content, "final");
  assert_eq!(edited.created_at, p.created_at);

  let thread = s.get_thread(t.id).await.unwrap().unwrap();
  assert_eq!(thread.last_activity_at, edited.updated_at);
}

#[tokio::test]
async fn deleting_a_thread_cascades_to_posts() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let t = s.create_thread(alice.id, new_thread("Doomed thread")).await.unwrap();
  let p = s.create_post(t.id, alice.id, reply("gone soon")).await.unwrap().unwrap();

  assert!(s.delete_thread(t.id).await.unwrap());
  assert!(s.get_thread(t.id).await.unwrap().is_none());
  assert!(s.get_post(t.id, p.id).await.unwrap().is_none());
  assert!(s.list_threads(&ThreadQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_post_removes_only_that_post() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let t = s.create_thread(alice.id, new_thread("Thread")).await.unwrap();
  let keep = s.create_post(t.id, alice.id, reply("keep")).await.unwrap().unwrap();
  let gone = s.create_post(t.id, alice.id, reply("drop")).await.unwrap().unwrap();

  assert!(s.delete_post(t.id, gone.id).await.unwrap());
  let detail = s.get_thread_detail(t.id).await.unwrap().unwrap();
  assert_eq!(detail.posts, vec![keep]);
}
