//! Thread listing, detail and owner-only mutation.

use agora_core::{
  api::ThreadBody,
  forum::{NewThread, ThreadChanges, ThreadDetail, ThreadId, ThreadSummary},
  store::{ForumStore, ThreadQuery},
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::Body;
use crate::{AppState, auth::CurrentUser, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl From<Page> for ThreadQuery {
  fn from(p: Page) -> Self { ThreadQuery { limit: p.limit, offset: p.offset } }
}

pub async fn list<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  Query(page): Query<Page>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
  let threads = state.service().list_threads(&page.into()).await?;
  Ok(Json(threads))
}

pub async fn show<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ThreadDetail>, ApiError> {
  Ok(Json(state.service().show_thread(ThreadId(id)).await?))
}

pub async fn create<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Body(ThreadBody { thread }): Body<ThreadBody<NewThread>>,
) -> Result<Response, ApiError> {
  let thread = state.service().create_thread(&current.principal, thread).await?;
  Ok((StatusCode::CREATED, Json(thread)).into_response())
}

pub async fn update<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(id): Path<i64>,
  Body(ThreadBody { thread }): Body<ThreadBody<ThreadChanges>>,
) -> Result<Json<ThreadSummary>, ApiError> {
  let thread = state
    .service()
    .update_thread(&current.principal, ThreadId(id), thread)
    .await?;
  Ok(Json(thread))
}

pub async fn destroy<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
  state.service().delete_thread(&current.principal, ThreadId(id)).await?;
  Ok(StatusCode::NO_CONTENT)
}
