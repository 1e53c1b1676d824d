//! JSON bodies of the HTTP API, shared by the server and the client.
//!
//! Requests wrap their fields in a resource-named envelope:
//! `{"user": {...}}`, `{"thread": {...}}`, `{"post": {...}}`.

use serde::{Deserialize, Serialize};

use crate::user::{User, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBody<T> {
  pub user: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadBody<T> {
  pub thread: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostBody<T> {
  pub post: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Login {
  pub email:    String,
  pub password: String,
}

/// Returned by signup and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
  pub id:       UserId,
  pub email:    String,
  pub username: String,
  pub token:    String,
}

impl AuthResponse {
  pub fn new(user: &User, token: String) -> Self {
    Self { id: user.id, email: user.email.clone(), username: user.username.clone(), token }
  }
}

/// Returned by `GET /current_user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:       UserId,
  pub username: String,
  pub email:    String,
}

impl From<User> for Profile {
  fn from(u: User) -> Self { Self { id: u.id, username: u.username, email: u.email } }
}

/// `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: String,
}

/// `{"errors": [...]}`, one message per violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorsBody {
  pub errors: Vec<String>,
}
