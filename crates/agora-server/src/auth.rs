//! Bearer-token extractor and the shared authentication step behind it.

use agora_auth::{Error as AuthError, Principal, Session, TokenFault, VerifiedToken};
use agora_core::store::ForumStore;
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};

use crate::{
  AppState,
  error::{ApiError, store_failure},
};

/// The token part of an `Authorization: Bearer <token>` header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.trim().split_once(' ')?;
  let token = token.trim();
  (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Verify `token` and resolve its subject, driving `session` through its
/// state machine. On success the session is `Authenticated`.
pub async fn authenticate<S: ForumStore>(
  state: &AppState<S>,
  session: &mut Session,
  token: &str,
) -> Result<(Principal, VerifiedToken), ApiError> {
  let verified = match state.tokens.verify(token) {
    Ok(v) => v,
    Err(e) => return Err(session.reject(e).into()),
  };

  let user = state
    .store
    .get_user(verified.subject)
    .await
    .map_err(store_failure("get_user"))?;
  let Some(user) = user else {
    return Err(session.reject(TokenFault::UnknownSubject.into()).into());
  };

  let principal = session.authenticate(&verified, Principal::from(&user))?.clone();
  Ok((principal, verified))
}

/// Present in a handler means the request carried a valid bearer token for an
/// existing user. The principal lives for this request only.
pub struct CurrentUser {
  pub principal: Principal,
  pub token:     VerifiedToken,
}

impl<S: ForumStore + 'static> FromRequestParts<AppState<S>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or(AuthError::MissingCredential)?;
    let mut session = Session::new();
    let (principal, token) = authenticate(state, &mut session, token).await?;
    Ok(CurrentUser { principal, token })
  }
}
