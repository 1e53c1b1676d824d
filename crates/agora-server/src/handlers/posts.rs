//! Replies within a thread. Every route requires a bearer token.

use agora_core::{
  api::PostBody,
  forum::{Post, PostId, PostInput, ThreadId},
  store::ForumStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};

use super::Body;
use crate::{AppState, auth::CurrentUser, error::ApiError};

pub async fn create<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(thread_id): Path<i64>,
  Body(PostBody { post }): Body<PostBody<PostInput>>,
) -> Result<Response, ApiError> {
  let post = state
    .service()
    .create_post(&current.principal, ThreadId(thread_id), post)
    .await?;
  Ok((StatusCode::CREATED, Json(post)).into_response())
}

pub async fn update<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path((thread_id, id)): Path<(i64, i64)>,
  Body(PostBody { post }): Body<PostBody<PostInput>>,
) -> Result<Json<Post>, ApiError> {
  let post = state
    .service()
    .update_post(&current.principal, ThreadId(thread_id), PostId(id), post)
    .await?;
  Ok(Json(post))
}

pub async fn destroy<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path((thread_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
  state
    .service()
    .delete_post(&current.principal, ThreadId(thread_id), PostId(id))
    .await?;
  Ok(StatusCode::NO_CONTENT)
}
