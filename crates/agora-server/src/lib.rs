//! HTTP and realtime server for Agora.
//!
//! Exposes an axum [`Router`] backed by any [`ForumStore`]: the JSON API
//! under `/api/v1`, the WebSocket cable at `/api/v1/cable`, and a health
//! check at `/up`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod service;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use agora_auth::{TokenService, denylist::MemoryDenylist};
use agora_core::store::ForumStore;
use agora_realtime::{DEFAULT_MAILBOX_CAPACITY, Publisher, TopicRegistry};
use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, de::Error as _};
use tower_http::trace::TraceLayer;

use handlers::{cable, health, posts, threads, users};
use service::ForumService;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `AGORA_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default = "default_database_path")]
  pub database_path:     PathBuf,
  /// HMAC key for bearer tokens. Generate one with `--generate-secret`.
  pub token_secret:      String,
  /// Token lifetime in seconds, at most [`MAX_TOKEN_TTL_SECS`].
  #[serde(default = "default_token_ttl_secs", deserialize_with = "bounded_ttl")]
  pub token_ttl_secs:    u64,
  /// Events buffered per realtime connection before deliveries are dropped.
  #[serde(default = "default_mailbox_capacity")]
  pub mailbox_capacity:  usize,
  /// Keep a denylist so that logout invalidates the token immediately.
  #[serde(default = "default_enable_revocation")]
  pub enable_revocation: bool,
}

/// Longest accepted token lifetime: ten years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 86_400;

fn bounded_ttl<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
  let secs = u64::deserialize(deserializer)?;
  if secs > MAX_TOKEN_TTL_SECS {
    return Err(D::Error::custom(format!(
      "token_ttl_secs must be at most {MAX_TOKEN_TTL_SECS}, got {secs}"
    )));
  }
  Ok(secs)
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_database_path() -> PathBuf { PathBuf::from("agora.sqlite3") }
fn default_token_ttl_secs() -> u64 { 86_400 }
fn default_mailbox_capacity() -> usize { DEFAULT_MAILBOX_CAPACITY }
fn default_enable_revocation() -> bool { true }

impl ServerConfig {
  /// Defaults for everything but the secret.
  pub fn with_secret(token_secret: impl Into<String>) -> Self {
    Self {
      host:              default_host(),
      port:              default_port(),
      database_path:     default_database_path(),
      token_secret:      token_secret.into(),
      token_ttl_secs:    default_token_ttl_secs(),
      mailbox_capacity:  default_mailbox_capacity(),
      enable_revocation: default_enable_revocation(),
    }
  }

  /// The token lifetime, clamped to [`MAX_TOKEN_TTL_SECS`] for values set
  /// directly rather than deserialised.
  pub fn token_ttl(&self) -> TimeDelta {
    let secs = self.token_ttl_secs.min(MAX_TOKEN_TTL_SECS);
    TimeDelta::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX)).unwrap_or(TimeDelta::MAX)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: ForumStore> {
  pub store:     Arc<S>,
  pub tokens:    TokenService,
  pub publisher: Publisher,
  pub config:    Arc<ServerConfig>,
}

impl<S: ForumStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      tokens:    self.tokens.clone(),
      publisher: self.publisher.clone(),
      config:    self.config.clone(),
    }
  }
}

impl<S: ForumStore + 'static> AppState<S> {
  /// Wire up token service and topic registry from `config`.
  pub fn new(store: S, config: ServerConfig) -> Self {
    let mut tokens = TokenService::new(config.token_secret.as_bytes(), config.token_ttl());
    if config.enable_revocation {
      tokens = tokens.with_denylist(Arc::new(MemoryDenylist::default()));
    }
    let registry = TopicRegistry::new(config.mailbox_capacity);
    Self {
      store: Arc::new(store),
      tokens,
      publisher: Publisher::new(registry),
      config: Arc::new(config),
    }
  }

  pub fn registry(&self) -> &TopicRegistry { self.publisher.registry() }

  pub fn service(&self) -> ForumService<'_, S> { ForumService::new(&self.store, &self.publisher) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the whole server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ForumStore + 'static,
{
  let api = Router::new()
    // Users
    .route("/users/signup",  post(users::signup::<S>))
    .route("/users/login",   post(users::login::<S>))
    .route("/users/logout",  delete(users::logout::<S>))
    .route("/current_user",  get(users::current::<S>))
    // Threads
    .route("/threads",       get(threads::list::<S>).post(threads::create::<S>))
    .route(
      "/threads/{id}",
      get(threads::show::<S>)
        .put(threads::update::<S>)
        .patch(threads::update::<S>)
        .delete(threads::destroy::<S>),
    )
    // Posts
    .route("/threads/{thread_id}/posts", post(posts::create::<S>))
    .route(
      "/threads/{thread_id}/posts/{id}",
      patch(posts::update::<S>).put(posts::update::<S>).delete(posts::destroy::<S>),
    )
    // Realtime
    .route("/cable",         get(cable::upgrade::<S>));

  Router::new()
    .route("/up", get(health::up))
    .nest("/api/v1", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
