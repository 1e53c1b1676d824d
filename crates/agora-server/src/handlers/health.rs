//! Liveness check.

use axum::http::StatusCode;

pub async fn up() -> StatusCode { StatusCode::OK }
