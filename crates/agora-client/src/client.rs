//! Async HTTP client wrapping the Agora JSON API.

use std::{
  sync::{Arc, RwLock},
  time::Duration,
};

use agora_core::{
  api::{AuthResponse, ErrorBody, ErrorsBody, Login, PostBody, Profile, ThreadBody, UserBody},
  forum::{NewThread, Post, PostId, PostInput, ThreadChanges, ThreadDetail, ThreadId, ThreadSummary},
  store::ThreadQuery,
  user::Signup,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Error, EventStream, LocalCache, Result};

/// Async HTTP client for the Agora REST API.
///
/// Remembers the bearer token handed out by signup or login and forgets it
/// on logout or on any 401. Cheap to clone; clones share the token.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
  token:    Arc<RwLock<Option<String>>>,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      token: Arc::new(RwLock::new(None)),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}/api/v1{}", self.base_url, path) }

  /// The realtime endpoint, with the current token if there is one.
  pub fn cable_url(&self) -> String {
    let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
      format!("wss://{rest}")
    } else if let Some(rest) = self.base_url.strip_prefix("http://") {
      format!("ws://{rest}")
    } else {
      self.base_url.clone()
    };
    match self.token() {
      Some(token) => format!("{base}/api/v1/cable?token={token}"),
      None => format!("{base}/api/v1/cable"),
    }
  }

  pub fn token(&self) -> Option<String> {
    self.token.read().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn set_token(&self, token: Option<String>) {
    *self.token.write().unwrap_or_else(|p| p.into_inner()) = token;
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match self.token() {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  async fn send(&self, req: RequestBuilder) -> Result<Response> {
    let resp = self.auth(req).send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    match status {
      StatusCode::UNAUTHORIZED => {
        self.set_token(None);
        let message = serde_json::from_str::<ErrorBody>(&body)
          .map(|b| b.error)
          .unwrap_or(body);
        Err(Error::Unauthorized(message))
      }
      StatusCode::NOT_FOUND => Err(Error::NotFound),
      StatusCode::UNPROCESSABLE_ENTITY => match serde_json::from_str::<ErrorsBody>(&body) {
        Ok(b) => Err(Error::Validation(b.errors)),
        Err(_) => Err(Error::Status { status: status.as_u16(), body }),
      },
      _ => Err(Error::Status { status: status.as_u16(), body }),
    }
  }

  async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    Ok(self.send(req).await?.json().await?)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// `POST /users/signup`; remembers the returned token.
  pub async fn signup(&self, signup: &Signup) -> Result<AuthResponse> {
    let auth: AuthResponse = self
      .json(self.client.post(self.url("/users/signup")).json(&UserBody { user: signup }))
      .await?;
    self.set_token(Some(auth.token.clone()));
    Ok(auth)
  }

  /// `POST /users/login`; remembers the returned token.
  pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
    let body = UserBody { user: Login { email: email.into(), password: password.into() } };
    let auth: AuthResponse = self
      .json(self.client.post(self.url("/users/login")).json(&body))
      .await?;
    self.set_token(Some(auth.token.clone()));
    Ok(auth)
  }

  /// `DELETE /users/logout`; the token is forgotten even if the call fails.
  pub async fn logout(&self) -> Result<()> {
    let result = self.send(self.client.delete(self.url("/users/logout"))).await;
    self.set_token(None);
    result.map(|_| ())
  }

  /// `GET /current_user`
  pub async fn current_user(&self) -> Result<Profile> {
    self.json(self.client.get(self.url("/current_user"))).await
  }

  // ── Threads ───────────────────────────────────────────────────────────────

  /// `GET /threads[?limit=&offset=]`
  pub async fn list_threads(&self, query: &ThreadQuery) -> Result<Vec<ThreadSummary>> {
    let mut params = Vec::new();
    if let Some(limit) = query.limit {
      params.push(("limit", limit.to_string()));
    }
    if let Some(offset) = query.offset {
      params.push(("offset", offset.to_string()));
    }
    self.json(self.client.get(self.url("/threads")).query(&params)).await
  }

  /// `GET /threads/{id}`
  pub async fn get_thread(&self, id: ThreadId) -> Result<ThreadDetail> {
    self.json(self.client.get(self.url(&format!("/threads/{id}")))).await
  }

  /// `POST /threads`
  pub async fn create_thread(&self, input: &NewThread) -> Result<ThreadSummary> {
    self
      .json(self.client.post(self.url("/threads")).json(&ThreadBody { thread: input }))
      .await
  }

  /// `PATCH /threads/{id}`
  pub async fn update_thread(&self, id: ThreadId, changes: &ThreadChanges) -> Result<ThreadSummary> {
    self
      .json(
        self
          .client
          .patch(self.url(&format!("/threads/{id}")))
          .json(&ThreadBody { thread: changes }),
      )
      .await
  }

  /// `DELETE /threads/{id}`
  pub async fn delete_thread(&self, id: ThreadId) -> Result<()> {
    self.send(self.client.delete(self.url(&format!("/threads/{id}")))).await?;
    Ok(())
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  /// `POST /threads/{thread_id}/posts`
  pub async fn create_post(&self, thread_id: ThreadId, input: &PostInput) -> Result<Post> {
    self
      .json(
        self
          .client
          .post(self.url(&format!("/threads/{thread_id}/posts")))
          .json(&PostBody { post: input }),
      )
      .await
  }

  /// `PATCH /threads/{thread_id}/posts/{id}`
  pub async fn update_post(&self, thread_id: ThreadId, id: PostId, input: &PostInput) -> Result<Post> {
    self
      .json(
        self
          .client
          .patch(self.url(&format!("/threads/{thread_id}/posts/{id}")))
          .json(&PostBody { post: input }),
      )
      .await
  }

  /// `DELETE /threads/{thread_id}/posts/{id}`
  pub async fn delete_post(&self, thread_id: ThreadId, id: PostId) -> Result<()> {
    self
      .send(self.client.delete(self.url(&format!("/threads/{thread_id}/posts/{id}"))))
      .await?;
    Ok(())
  }

  // ── Cache refresh ─────────────────────────────────────────────────────────

  /// Fetch the full thread list into `cache`.
  pub async fn refresh_threads(&self, cache: &mut LocalCache) -> Result<()> {
    cache.load_threads(self.list_threads(&ThreadQuery::default()).await?);
    Ok(())
  }

  /// Fetch one thread with its posts into `cache`. A thread that no longer
  /// exists is forgotten.
  pub async fn refresh_thread(&self, cache: &mut LocalCache, id: ThreadId) -> Result<()> {
    match self.get_thread(id).await {
      Ok(detail) => {
        cache.load_thread(detail);
        Ok(())
      }
      Err(Error::NotFound) => {
        cache.forget_thread(id);
        Ok(())
      }
      Err(e) => Err(e),
    }
  }

  // ── Realtime ──────────────────────────────────────────────────────────────

  /// Open the realtime stream, authenticated with the current token if any.
  pub async fn event_stream(&self) -> Result<EventStream> {
    EventStream::connect(&self.cable_url()).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cable_url_follows_scheme_and_token() {
    let api = ApiClient::new("http://localhost:3000/").unwrap();
    assert_eq!(api.cable_url(), "ws://localhost:3000/api/v1/cable");

    api.set_token(Some("abc".into()));
    assert_eq!(api.cable_url(), "ws://localhost:3000/api/v1/cable?token=abc");

    let tls = ApiClient::new("https://forum.example.com").unwrap();
    assert_eq!(tls.cable_url(), "wss://forum.example.com/api/v1/cable");
  }

  #[test]
  fn clones_share_the_token() {
    let api = ApiClient::new("http://localhost:3000").unwrap();
    let other = api.clone();
    api.set_token(Some("t".into()));
    assert_eq!(other.token().as_deref(), Some("t"));
    other.set_token(None);
    assert!(api.token().is_none());
  }
}
