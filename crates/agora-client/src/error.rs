//! Error type for `agora-client`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The server answered 401. Any remembered token has been discarded.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("resource not found")]
  NotFound,

  #[error("validation failed: {}", .0.join(", "))]
  Validation(Vec<String>),

  #[error("unexpected status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("websocket error: {0}")]
  WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

  #[error("protocol error: {0}")]
  Protocol(#[from] agora_core::Error),

  /// The server answered a command with an error frame.
  #[error("server rejected command: {0}")]
  Rejected(String),

  #[error("event stream closed")]
  Closed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
