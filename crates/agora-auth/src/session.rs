//! The authentication state machine for one request or one connection.
//!
//! ```text
//!              valid token                  token expires
//! Anonymous ───────────────▶ Authenticated ───────────────▶ Expired
//!     │                                                        ▲
//!     └────────────────────── expired token ───────────────────┘
//! ```
//!
//! `Anonymous` is initial. Any other rejection (bad signature, malformed,
//! revoked) leaves the session where it was. `Expired` is terminal: there is
//! no in-place renewal, the client must log in again and open a new session.

use agora_core::user::{User, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Error, Result, TokenFault, token::VerifiedToken};

/// The authenticated actor behind a request or connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
  pub id:       UserId,
  pub username: String,
}

impl From<&User> for Principal {
  fn from(u: &User) -> Self { Self { id: u.id, username: u.username.clone() } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
  Anonymous,
  Authenticated {
    principal:  Principal,
    expires_at: DateTime<Utc>,
  },
  Expired,
}

/// Holds the [`AuthState`] for the lifetime of one request or connection.
/// Never persisted: a new request starts a new, anonymous session.
#[derive(Debug, Clone)]
pub struct Session {
  state: AuthState,
}

impl Default for Session {
  fn default() -> Self { Self::new() }
}

impl Session {
  pub fn new() -> Self { Self { state: AuthState::Anonymous } }

  pub fn state(&self) -> &AuthState { &self.state }

  pub fn principal(&self) -> Option<&Principal> {
    match &self.state {
      AuthState::Authenticated { principal, .. } => Some(principal),
      _ => None,
    }
  }

  pub fn is_expired(&self) -> bool { matches!(self.state, AuthState::Expired) }

  /// Record a successful verification, caching `principal` for the rest of
  /// the session. Fails if the session already expired.
  pub fn authenticate(&mut self, token: &VerifiedToken, principal: Principal) -> Result<&Principal> {
    if self.is_expired() {
      return Err(TokenFault::Expired.into());
    }
    debug_assert_eq!(token.subject, principal.id);
    self.state = AuthState::Authenticated { principal, expires_at: token.expires_at };
    self.require()
  }

  /// Record a failed verification and return the error to surface.
  pub fn reject(&mut self, error: Error) -> Error {
    if error.is_expired() {
      self.state = AuthState::Expired;
    }
    error
  }

  /// Move an authenticated session to `Expired` once its token lapses.
  /// Returns `true` on the transition.
  pub fn check_expiry(&mut self, now: DateTime<Utc>) -> bool {
    match &self.state {
      AuthState::Authenticated { expires_at, .. } if now > *expires_at => {
        self.state = AuthState::Expired;
        true
      }
      _ => false,
    }
  }

  /// The principal, or the error a protected operation should fail with.
  pub fn require(&self) -> Result<&Principal> {
    match &self.state {
      AuthState::Authenticated { principal, .. } => Ok(principal),
      AuthState::Anonymous => Err(Error::MissingCredential),
      AuthState::Expired   => Err(TokenFault::Expired.into()),
    }
  }
}
