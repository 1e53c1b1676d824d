//! Registration, login, logout and the current-user profile.

use agora_auth::password::{hash_password, verify_password};
use agora_core::{
  api::{AuthResponse, Login, Profile, UserBody},
  store::ForumStore,
  user::{NewUser, Signup},
};
use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};

use super::Body;
use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, store_failure},
};

pub async fn signup<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  Body(UserBody { user: input }): Body<UserBody<Signup>>,
) -> Result<Response, ApiError> {
  let input = input.normalized();
  input.validate()?;
  let password_hash = hash_password(&input.password)?;

  let new_user = NewUser { email: input.email, username: input.username, password_hash };
  let user = match state
    .store
    .create_user(new_user)
    .await
    .map_err(store_failure("create_user"))?
  {
    Ok(user) => user,
    Err(taken) => return Err(ApiError::Validation(taken.messages())),
  };

  let issued = state.tokens.issue(user.id)?;
  tracing::info!(user = %user.id, username = %user.username, "user registered");
  Ok((StatusCode::CREATED, Json(AuthResponse::new(&user, issued.token))).into_response())
}

pub async fn login<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  Body(UserBody { user: input }): Body<UserBody<Login>>,
) -> Result<Json<AuthResponse>, ApiError> {
  let credentials = state
    .store
    .find_credentials(input.email.trim())
    .await
    .map_err(store_failure("find_credentials"))?;

  // Unknown email and wrong password are reported identically.
  let Some(credentials) = credentials else {
    return Err(ApiError::BadCredentials);
  };
  if !verify_password(&input.password, &credentials.password_hash) {
    tracing::debug!(user = %credentials.user.id, "password mismatch");
    return Err(ApiError::BadCredentials);
  }

  let issued = state.tokens.issue(credentials.user.id)?;
  Ok(Json(AuthResponse::new(&credentials.user, issued.token)))
}

pub async fn logout<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
) -> StatusCode {
  if !state.tokens.revoke(&current.token) {
    tracing::debug!(user = %current.principal.id, "revocation disabled; token stays valid until expiry");
  }
  StatusCode::OK
}

pub async fn current<S: ForumStore + 'static>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
) -> Result<Json<Profile>, ApiError> {
  let user = state
    .store
    .get_user(current.principal.id)
    .await
    .map_err(store_failure("get_user"))?
    .ok_or(ApiError::NotFound)?;
  Ok(Json(Profile::from(user)))
}
