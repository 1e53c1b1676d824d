//! Users: the owners of every thread and post.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, validate::Validator};

/// Numeric user identifier, assigned by the store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// A registered account. The password hash never leaves the store except
/// through [`UserCredentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         UserId,
  pub email:      String,
  pub username:   String,
  pub created_at: DateTime<Utc>,
}

/// The `{id, username}` pair embedded in every thread and post payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub id:       UserId,
  pub username: String,
}

/// A user together with the stored argon2 PHC string, returned only to the
/// login path.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub user:          User,
  pub password_hash: String,
}

/// Input to [`ForumStore::create_user`](crate::store::ForumStore::create_user).
/// The password is already hashed by the time it reaches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:         String,
  pub username:      String,
  pub password_hash: String,
}

/// Which unique columns an attempted registration collided with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Taken {
  pub email:    bool,
  pub username: bool,
}

impl Taken {
  pub fn any(&self) -> bool { self.email || self.username }

  /// Field-level messages in the same form as [`Validator`] produces.
  pub fn messages(&self) -> Vec<String> {
    let mut out = Vec::new();
    if self.email {
      out.push("Email has already been taken".to_string());
    }
    if self.username {
      out.push("Username has already been taken".to_string());
    }
    out
  }
}

// ─── Signup ──────────────────────────────────────────────────────────────────

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 128;

/// A signup request before the password has been hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
  pub email:                 String,
  pub username:              String,
  pub password:              String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password_confirmation: Option<String>,
}

impl Signup {
  /// Strip surrounding whitespace from the email and username. Validation and
  /// storage both see the trimmed values.
  pub fn normalized(mut self) -> Self {
    self.email = self.email.trim().to_string();
    self.username = self.username.trim().to_string();
    self
  }

  /// Check every field rule, reporting all violations at once.
  pub fn validate(&self) -> Result<()> {
    let mut v = Validator::default();

    v.presence("Email", &self.email);
    if !self.email.trim().is_empty() && !looks_like_email(&self.email) {
      v.push("Email is invalid");
    }

    v.presence("Username", &self.username);
    v.length("Username", &self.username, USERNAME_MIN, USERNAME_MAX);

    v.presence("Password", &self.password);
    v.length("Password", &self.password, PASSWORD_MIN, PASSWORD_MAX);

    if let Some(confirmation) = &self.password_confirmation
      && confirmation != &self.password
    {
      v.push("Password confirmation doesn't match Password");
    }

    v.finish()
  }
}

fn looks_like_email(s: &str) -> bool {
  match s.trim().split_once('@') {
    Some((local, domain)) => {
      !local.is_empty() && !domain.is_empty() && !domain.contains('@')
    }
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  fn signup(email: &str, username: &str, password: &str) -> Signup {
    Signup {
      email:                 email.into(),
      username:              username.into(),
      password:              password.into(),
      password_confirmation: Some(password.into()),
    }
  }

  #[test]
  fn valid_signup_passes() {
    assert!(signup("a@example.com", "alice", "secret1").validate().is_ok());
  }

  #[test]
  fn short_username_and_bad_email_are_both_reported() {
    let err = signup("nope", "al", "secret1").validate().unwrap_err();
    let Error::ValidationFailed(msgs) = err else { panic!("wrong error") };
    assert!(msgs.contains(&"Email is invalid".to_string()), "{msgs:?}");
    assert!(
      msgs.contains(&"Username is too short (minimum is 3 characters)".to_string()),
      "{msgs:?}"
    );
  }

  #[test]
  fn padding_does_not_count_towards_username_length() {
    let padded = signup(" a@example.com ", "  ab  ", "secret1").normalized();
    assert_eq!(padded.email, "a@example.com");
    assert_eq!(padded.username, "ab");
    let Error::ValidationFailed(msgs) = padded.validate().unwrap_err() else {
      panic!("wrong error")
    };
    assert_eq!(msgs, vec!["Username is too short (minimum is 3 characters)"]);
  }

  #[test]
  fn mismatched_confirmation_is_rejected() {
    let mut s = signup("a@example.com", "alice", "secret1");
    s.password_confirmation = Some("secret2".into());
    let Error::ValidationFailed(msgs) = s.validate().unwrap_err() else {
      panic!("wrong error")
    };
    assert_eq!(msgs, vec!["Password confirmation doesn't match Password"]);
  }

  #[test]
  fn taken_messages() {
    let taken = Taken { email: true, username: true };
    assert!(taken.any());
    assert_eq!(taken.messages().len(), 2);
    assert!(!Taken::default().any());
  }
}
