//! Field-level validation with all-or-nothing semantics.
//!
//! Rules are checked exhaustively and every violation is collected, so a
//! caller sees the full list of problems in one response. Lengths are counted
//! in characters, not bytes.

use crate::{Error, Result};

/// Accumulates human-readable messages of the form
/// `"Title is too short (minimum is 5 characters)"`.
#[derive(Debug, Default)]
pub struct Validator {
  errors: Vec<String>,
}

impl Validator {
  pub fn push(&mut self, message: impl Into<String>) { self.errors.push(message.into()); }

  /// Whitespace-only counts as blank.
  pub fn presence(&mut self, field: &str, value: &str) {
    if value.trim().is_empty() {
      self.push(format!("{field} can't be blank"));
    }
  }

  pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
    let n = value.chars().count();
    if n < min {
      self.push(format!("{field} is too short (minimum is {min} {})", plural(min)));
    } else if n > max {
      self.push(format!("{field} is too long (maximum is {max} {})", plural(max)));
    }
  }

  pub fn finish(self) -> Result<()> {
    if self.errors.is_empty() {
      Ok(())
    } else {
      Err(Error::ValidationFailed(self.errors))
    }
  }
}

fn plural(n: usize) -> &'static str {
  if n == 1 { "character" } else { "characters" }
}
