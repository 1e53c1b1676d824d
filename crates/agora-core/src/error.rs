//! Error types for `agora-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// One message per violated rule; no partial write may follow.
  #[error("validation failed: {}", .0.join(", "))]
  ValidationFailed(Vec<String>),

  #[error("invalid topic name: {0:?}")]
  InvalidTopic(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
