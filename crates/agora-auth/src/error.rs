//! Error types for `agora-auth`.

use thiserror::Error;

/// Why a presented token was rejected. Callers surface all of these the same
/// way (unauthorized); the distinction exists for logging and for the
/// session state machine, which treats expiry as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenFault {
  #[error("token is malformed")]
  Malformed,
  #[error("token signature does not match")]
  BadSignature,
  #[error("token has expired")]
  Expired,
  #[error("token has been revoked")]
  Revoked,
  /// The signature is valid but the subject no longer resolves to a user.
  #[error("token subject is unknown")]
  UnknownSubject,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("no credential presented")]
  MissingCredential,

  #[error("invalid token: {0}")]
  InvalidToken(TokenFault),

  /// The principal does not own the target resource.
  #[error("not authorized")]
  NotAuthorized,

  #[error("token signing failed: {0}")]
  Signing(#[source] jsonwebtoken::errors::Error),

  /// Issue time plus lifetime falls outside the representable calendar.
  #[error("token lifetime out of range")]
  LifetimeOutOfRange,

  #[error("password hashing failed: {0}")]
  PasswordHash(String),
}

impl Error {
  pub fn is_expired(&self) -> bool {
    matches!(self, Error::InvalidToken(TokenFault::Expired))
  }
}

impl From<TokenFault> for Error {
  fn from(f: TokenFault) -> Self { Error::InvalidToken(f) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
