//! API error type and [`axum::response::IntoResponse`] implementation.

use agora_auth::Error as AuthError;
use agora_core::api::{ErrorBody, ErrorsBody};
use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error("resource not found")]
  NotFound,

  #[error("validation failed: {}", .0.join(", "))]
  Validation(Vec<String>),

  #[error("invalid email or password")]
  BadCredentials,

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A read or commit in the store failed. Nothing was published.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    ApiError::Store(Box::new(e))
  }
}

/// Log a failed store call where it happened, then convert it.
pub(crate) fn store_failure<E>(operation: &'static str) -> impl FnOnce(E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  move |e| {
    tracing::error!(operation, error = %e, "store operation failed");
    ApiError::store(e)
  }
}

impl From<agora_core::Error> for ApiError {
  fn from(e: agora_core::Error) -> Self {
    match e {
      agora_core::Error::ValidationFailed(messages) => ApiError::Validation(messages),
      agora_core::Error::InvalidTopic(name) => ApiError::BadRequest(format!("invalid topic {name:?}")),
      other => ApiError::store(other),
    }
  }
}

impl From<tokio::task::JoinError> for ApiError {
  fn from(e: tokio::task::JoinError) -> Self { ApiError::store(e) }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

fn error_body(status: StatusCode, message: &str) -> Response {
  (status, Json(ErrorBody { error: message.to_string() })).into_response()
}

fn unauthorized(message: &str) -> Response {
  let mut res = error_body(StatusCode::UNAUTHORIZED, message);
  res
    .headers_mut()
    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
  res
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Auth(AuthError::MissingCredential) => unauthorized("No token provided"),
      ApiError::Auth(AuthError::InvalidToken(fault)) => {
        tracing::debug!(%fault, "token rejected");
        unauthorized("Invalid token")
      }
      // Not owning a resource looks exactly like it not existing.
      ApiError::Auth(AuthError::NotAuthorized) | ApiError::NotFound => {
        error_body(StatusCode::NOT_FOUND, "Resource not found")
      }
      ApiError::BadCredentials => unauthorized("Invalid email or password"),
      ApiError::Validation(errors) => {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorsBody { errors })).into_response()
      }
      ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, &message),
      ApiError::Auth(
        e @ (AuthError::Signing(_) | AuthError::PasswordHash(_) | AuthError::LifetimeOutOfRange),
      ) => {
        tracing::error!(error = %e, "authentication backend failure");
        error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      }
    }
  }
}
