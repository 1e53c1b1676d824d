//! End-to-end tests over a real listener: HTTP writes on one side, cable
//! subscribers on the other.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use agora_client::{ApiClient, EventStream, LocalCache};
use agora_core::{
  event::{EventPayload, Topic},
  forum::{
    NewThread, Post, PostId, PostInput, ThreadChanges, ThreadDetail, ThreadId, ThreadSummary,
  },
  store::{ForumStore, ThreadQuery},
  user::{NewUser, Signup, Taken, User, UserCredentials, UserId},
};
use agora_server::{AppState, ServerConfig, router};
use agora_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::oneshot, time::timeout};

const QUIET: Duration = Duration::from_millis(250);
const PATIENT: Duration = Duration::from_secs(5);

struct Server {
  base:      String,
  _shutdown: oneshot::Sender<()>,
}

async fn spawn_server<S: ForumStore + 'static>(store: S, config: ServerConfig) -> Server {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let app = router(AppState::new(store, config));
  let (tx, rx) = oneshot::channel::<()>();
  tokio::spawn(async move {
    axum::serve(listener, app)
      .with_graceful_shutdown(async {
        rx.await.ok();
      })
      .await
      .unwrap();
  });
  Server { base: format!("http://{addr}"), _shutdown: tx }
}

async fn sqlite_server() -> Server {
  spawn_server(SqliteStore::open_in_memory().await.unwrap(), ServerConfig::with_secret("e2e")).await
}

async fn user(base: &str, name: &str) -> ApiClient {
  let api = ApiClient::new(base).unwrap();
  api
    .signup(&Signup {
      email:                 format!("{name}@example.com"),
      username:              name.to_string(),
      password:              "secret1".to_string(),
      password_confirmation: Some("secret1".to_string()),
    })
    .await
    .unwrap();
  api
}

fn new_thread(title: &str) -> NewThread {
  NewThread { title: title.to_string(), content: "Opening post content.".to_string() }
}

fn reply(content: &str) -> PostInput { PostInput { content: content.to_string() } }

async fn next(stream: &mut EventStream) -> agora_core::event::Event {
  timeout(PATIENT, stream.next_event())
    .await
    .expect("event within deadline")
    .unwrap()
    .expect("stream open")
}

async fn assert_silent(stream: &mut EventStream) {
  if let Ok(event) = timeout(QUIET, stream.next_event()).await {
    panic!("unexpected delivery: {event:?}");
  }
}

// ─── Fan-out ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn thread_and_reply_reach_exactly_their_topics() {
  let server = sqlite_server().await;
  let alice = user(&server.base, "alice").await;
  let bob = user(&server.base, "bobby").await;

  let mut index = ApiClient::new(&server.base).unwrap().event_stream().await.unwrap();
  index.subscribe(Topic::Threads).await.unwrap();

  let t1 = alice.create_thread(&new_thread("First thread")).await.unwrap();
  let event = next(&mut index).await;
  assert_eq!(event.topic, Topic::Threads);
  assert!(matches!(&event.payload, EventPayload::Thread(t) if t.id == t1.id));

  let mut watcher = bob.event_stream().await.unwrap();
  watcher.subscribe(Topic::Thread(t1.id)).await.unwrap();

  let post = bob.create_post(t1.id, &reply("Hello from Bob")).await.unwrap();
  let event = next(&mut watcher).await;
  assert!(matches!(&event.payload, EventPayload::Post(p) if p.id == post.id));

  assert_silent(&mut watcher).await;
  assert_silent(&mut index).await;
}

#[tokio::test]
async fn unsubscribed_and_unrelated_topics_stay_quiet() {
  let server = sqlite_server().await;
  let alice = user(&server.base, "alice").await;
  let one = alice.create_thread(&new_thread("Thread one")).await.unwrap();
  let two = alice.create_thread(&new_thread("Thread two")).await.unwrap();

  let mut stream = alice.event_stream().await.unwrap();
  stream.subscribe(Topic::Thread(one.id)).await.unwrap();

  alice.create_post(two.id, &reply("elsewhere")).await.unwrap();
  assert_silent(&mut stream).await;

  stream.subscribe(Topic::Thread(two.id)).await.unwrap();
  stream.unsubscribe(Topic::Thread(two.id)).await.unwrap();
  alice.create_post(two.id, &reply("still elsewhere")).await.unwrap();
  assert_silent(&mut stream).await;

  alice.create_post(one.id, &reply("here")).await.unwrap();
  let event = next(&mut stream).await;
  assert_eq!(event.topic, Topic::Thread(one.id));
  stream.close().await.unwrap();
}

#[tokio::test]
async fn events_keep_a_client_cache_in_step() {
  let server = sqlite_server().await;
  let alice = user(&server.base, "alice").await;
  let mut cache = LocalCache::default();
  let thread = alice.create_thread(&new_thread("Cached thread")).await.unwrap();
  alice.refresh_threads(&mut cache).await.unwrap();
  alice.refresh_thread(&mut cache, thread.id).await.unwrap();

  let mut stream = alice.event_stream().await.unwrap();
  stream.subscribe(Topic::Threads).await.unwrap();
  stream.subscribe(Topic::Thread(thread.id)).await.unwrap();

  alice.create_thread(&new_thread("Newer thread")).await.unwrap();
  alice.create_post(thread.id, &reply("appended live")).await.unwrap();
  for _ in 0..2 {
    let event = next(&mut stream).await;
    cache.apply(&event);
  }

  let mut fresh = LocalCache::default();
  alice.refresh_threads(&mut fresh).await.unwrap();
  alice.refresh_thread(&mut fresh, thread.id).await.unwrap();

  let ids = |c: &LocalCache| {
    let mut ids = c.threads().iter().map(|t| t.id).collect::<Vec<_>>();
    ids.sort();
    ids
  };
  assert_eq!(ids(&cache), ids(&fresh));
  assert_eq!(cache.thread(thread.id).map(|t| t.posts_count), Some(1));
  assert_eq!(cache.posts(thread.id), fresh.posts(thread.id));
}

// ─── Authentication on the cable ─────────────────────────────────────────────

#[tokio::test]
async fn invalid_cable_token_is_refused_before_upgrade() {
  let server = sqlite_server().await;
  let url = format!("{}/api/v1/cable?token=garbage", server.base.replacen("http", "ws", 1));
  match tokio_tungstenite::connect_async(url).await {
    Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
      assert_eq!(resp.status(), 401);
    }
    other => panic!("expected HTTP 401, got {other:?}"),
  }
}

#[tokio::test]
async fn bad_topics_are_rejected_without_dropping_the_connection() {
  let server = sqlite_server().await;
  let alice = user(&server.base, "alice").await;
  let mut stream = alice.event_stream().await.unwrap();

  let err = stream.subscribe(Topic::Thread(ThreadId(-1))).await.unwrap_err();
  assert!(matches!(err, agora_client::Error::Rejected(_)), "{err:?}");

  stream.subscribe(Topic::Threads).await.unwrap();
  alice.create_thread(&new_thread("Still connected")).await.unwrap();
  next(&mut stream).await;
}

#[tokio::test]
async fn lapsed_session_keeps_public_topics() {
  let mut config = ServerConfig::with_secret("e2e");
  config.token_ttl_secs = 2;
  let server = spawn_server(SqliteStore::open_in_memory().await.unwrap(), config).await;
  let alice = user(&server.base, "alice").await;

  let mut stream = alice.event_stream().await.unwrap();
  stream.subscribe(Topic::Threads).await.unwrap();
  tokio::time::sleep(Duration::from_millis(2_200)).await;

  alice.login("alice@example.com", "secret1").await.unwrap();
  alice.create_thread(&new_thread("After expiry")).await.unwrap();

  let event = next(&mut stream).await;
  assert!(matches!(&event.payload, EventPayload::Thread(t) if t.title == "After expiry"));
  assert!(stream.session_expired());
}

// ─── Commit failures ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum FailingError {
  #[error("injected commit failure")]
  Injected,
  #[error(transparent)]
  Store(#[from] agora_store_sqlite::Error),
}

/// Delegates to SQLite but fails creation commits while `broken` is set and
/// user lookups while `lookups_broken` is set.
#[derive(Clone)]
struct FailingStore {
  inner:          Arc<SqliteStore>,
  broken:         Arc<AtomicBool>,
  lookups_broken: Arc<AtomicBool>,
}

impl FailingStore {
  async fn new() -> Self {
    Self {
      inner:          Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      broken:         Arc::new(AtomicBool::new(false)),
      lookups_broken: Arc::new(AtomicBool::new(false)),
    }
  }

  fn check(&self) -> Result<(), FailingError> {
    if self.broken.load(Ordering::SeqCst) { Err(FailingError::Injected) } else { Ok(()) }
  }
}

impl ForumStore for FailingStore {
  type Error = FailingError;

  async fn create_user(&self, input: NewUser) -> Result<Result<User, Taken>, FailingError> {
    Ok(self.inner.create_user(input).await?)
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>, FailingError> {
    if self.lookups_broken.load(Ordering::SeqCst) {
      return Err(FailingError::Injected);
    }
    Ok(self.inner.get_user(id).await?)
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, FailingError> {
    Ok(self.inner.find_credentials(email).await?)
  }

  async fn list_threads(&self, query: &ThreadQuery) -> Result<Vec<ThreadSummary>, FailingError> {
    Ok(self.inner.list_threads(query).await?)
  }

  async fn get_thread(&self, id: ThreadId) -> Result<Option<ThreadSummary>, FailingError> {
    Ok(self.inner.get_thread(id).await?)
  }

  async fn get_thread_detail(&self, id: ThreadId) -> Result<Option<ThreadDetail>, FailingError> {
    Ok(self.inner.get_thread_detail(id).await?)
  }

  async fn create_thread(
    &self,
    owner: UserId,
    input: NewThread,
  ) -> Result<ThreadSummary, FailingError> {
    self.check()?;
    Ok(self.inner.create_thread(owner, input).await?)
  }

  async fn update_thread(
    &self,
    id: ThreadId,
    changes: ThreadChanges,
  ) -> Result<Option<ThreadSummary>, FailingError> {
    Ok(self.inner.update_thread(id, changes).await?)
  }

  async fn delete_thread(&self, id: ThreadId) -> Result<bool, FailingError> {
    Ok(self.inner.delete_thread(id).await?)
  }

  async fn get_post(&self, thread_id: ThreadId, post_id: PostId) -> Result<Option<Post>, FailingError> {
    Ok(self.inner.get_post(thread_id, post_id).await?)
  }

  async fn create_post(
    &self,
    thread_id: ThreadId,
    owner: UserId,
    input: PostInput,
  ) -> Result<Option<Post>, FailingError> {
    self.check()?;
    Ok(self.inner.create_post(thread_id, owner, input).await?)
  }

  async fn update_post(
    &self,
    thread_id: ThreadId,
    post_id: PostId,
    input: PostInput,
  ) -> Result<Option<Post>, FailingError> {
    Ok(self.inner.update_post(thread_id, post_id, input).await?)
  }

  async fn delete_post(&self, thread_id: ThreadId, post_id: PostId) -> Result<bool, FailingError> {
    Ok(self.inner.delete_post(thread_id, post_id).await?)
  }
}

#[tokio::test]
async fn failed_commits_announce_nothing() {
  let store = FailingStore::new().await;
  let broken = store.broken.clone();
  let server = spawn_server(store, ServerConfig::with_secret("e2e")).await;
  let alice = user(&server.base, "alice").await;
  let thread = alice.create_thread(&new_thread("Stable thread")).await.unwrap();

  let mut stream = alice.event_stream().await.unwrap();
  stream.subscribe(Topic::Threads).await.unwrap();
  stream.subscribe(Topic::Thread(thread.id)).await.unwrap();

  broken.store(true, Ordering::SeqCst);
  let err = alice.create_thread(&new_thread("Never stored")).await.unwrap_err();
  assert!(matches!(err, agora_client::Error::Status { status: 500, .. }), "{err:?}");
  assert!(alice.create_post(thread.id, &reply("Never stored")).await.is_err());
  assert_silent(&mut stream).await;

  broken.store(false, Ordering::SeqCst);
  let post = alice.create_post(thread.id, &reply("Stored")).await.unwrap();
  let event = next(&mut stream).await;
  assert!(matches!(&event.payload, EventPayload::Post(p) if p.id == post.id));
}

#[tokio::test]
async fn store_outage_while_authenticating_is_a_server_error() {
  let store = FailingStore::new().await;
  let lookups_broken = store.lookups_broken.clone();
  let server = spawn_server(store, ServerConfig::with_secret("e2e")).await;
  let alice = user(&server.base, "alice").await;

  lookups_broken.store(true, Ordering::SeqCst);
  let err = alice.current_user().await.unwrap_err();
  assert!(matches!(err, agora_client::Error::Status { status: 500, .. }), "{err:?}");
  match tokio_tungstenite::connect_async(alice.cable_url()).await {
    Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 500),
    other => panic!("expected HTTP 500, got {other:?}"),
  }

  lookups_broken.store(false, Ordering::SeqCst);
  assert_eq!(alice.current_user().await.unwrap().username, "alice");
}
