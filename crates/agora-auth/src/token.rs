//! Token Service: stateless signed identity tokens.
//!
//! Tokens are compact JWS strings signed with HS256 under a single shared
//! secret. The claim set is `{sub, iat, exp, jti}`: identity and lifetime
//! only, no scopes. Verification reads no mutable server state unless a
//! [`Denylist`] has been attached for logout support.

use std::sync::Arc;

use agora_core::user::UserId;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, TokenFault, denylist::Denylist};

/// Default lifetime of an issued token.
pub const DEFAULT_TTL: TimeDelta = TimeDelta::hours(24);

/// The JWT claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  /// Decimal user id.
  pub sub: String,
  pub iat: i64,
  pub exp: i64,
  /// Revocation handle for the denylist.
  pub jti: Uuid,
}

/// A freshly signed token and the facts it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
  pub token:      String,
  pub subject:    UserId,
  pub token_id:   Uuid,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

/// The result of successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
  pub subject:    UserId,
  pub token_id:   Uuid,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl VerifiedToken {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { now > self.expires_at }
}

/// Issues and verifies tokens under one secret and one expiry window.
///
/// Cheap to clone; share one instance across the server.
#[derive(Clone)]
pub struct TokenService {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl:      TimeDelta,
  denylist: Option<Arc<dyn Denylist>>,
}

impl TokenService {
  pub const ALGORITHM: Algorithm = Algorithm::HS256;

  pub fn new(secret: &[u8], ttl: TimeDelta) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      ttl,
      denylist: None,
    }
  }

  /// Consult `denylist` on every verification and record revocations in it.
  pub fn with_denylist(mut self, denylist: Arc<dyn Denylist>) -> Self {
    self.denylist = Some(denylist);
    self
  }

  /// Sign a token for `subject` valid from now for the configured window.
  pub fn issue(&self, subject: UserId) -> Result<IssuedToken> {
    self.issue_at(subject, Utc::now())
  }

  /// Sign a token as if issued at `issued_at`.
  pub fn issue_at(&self, subject: UserId, issued_at: DateTime<Utc>) -> Result<IssuedToken> {
    let expires_at = issued_at
      .checked_add_signed(self.ttl)
      .ok_or(Error::LifetimeOutOfRange)?;
    let claims     = Claims {
      sub: subject.to_string(),
      iat: issued_at.timestamp(),
      exp: expires_at.timestamp(),
      jti: Uuid::new_v4(),
    };

    let token = jsonwebtoken::encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding)
      .map_err(Error::Signing)?;

    Ok(IssuedToken {
      token,
      subject,
      token_id: claims.jti,
      issued_at: timestamp(claims.iat)?,
      expires_at: timestamp(claims.exp)?,
    })
  }

  /// Verify `token` against the current time.
  pub fn verify(&self, token: &str) -> Result<VerifiedToken> {
    self.verify_at(token, Utc::now())
  }

  /// Verify signature and structure, then check expiry against `now`.
  ///
  /// Side-effect free: the denylist is read, never written.
  pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken> {
    let mut validation = Validation::new(Self::ALGORITHM);
    // Expiry is checked below against the caller's clock, with no leeway.
    validation.validate_exp = false;
    validation.leeway       = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
      .map_err(|e| Error::InvalidToken(classify(e.kind())))?;
    let claims = data.claims;

    let subject = claims
      .sub
      .parse::<i64>()
      .map(UserId)
      .map_err(|_| TokenFault::Malformed)?;

    let verified = VerifiedToken {
      subject,
      token_id:   claims.jti,
      issued_at:  timestamp(claims.iat)?,
      expires_at: timestamp(claims.exp)?,
    };

    if verified.is_expired_at(now) {
      return Err(TokenFault::Expired.into());
    }

    if let Some(denylist) = &self.denylist
      && denylist.is_revoked(verified.token_id, now)
    {
      return Err(TokenFault::Revoked.into());
    }

    Ok(verified)
  }

  /// Revoke a verified token until its natural expiry. Returns `false` when
  /// no denylist is attached, in which case the token stays valid.
  pub fn revoke(&self, token: &VerifiedToken) -> bool {
    match &self.denylist {
      Some(denylist) => {
        denylist.revoke(token.token_id, token.expires_at);
        tracing::debug!(token_id = %token.token_id, subject = %token.subject, "token revoked");
        true
      }
      None => false,
    }
  }
}

fn classify(kind: &ErrorKind) -> TokenFault {
  match kind {
    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenFault::BadSignature,
    ErrorKind::ExpiredSignature => TokenFault::Expired,
    _ => TokenFault::Malformed,
  }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0).ok_or(Error::InvalidToken(TokenFault::Malformed))
}
