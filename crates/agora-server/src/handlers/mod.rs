pub mod cable;
pub mod health;
pub mod posts;
pub mod threads;
pub mod users;

use axum::extract::FromRequest;

use crate::error::ApiError;

/// A JSON request body whose parse failures render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Body<T>(pub T);
