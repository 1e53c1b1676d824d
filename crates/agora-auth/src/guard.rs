//! Ownership Guard.
//!
//! A mutation is allowed iff the principal owns the resource. Callers must
//! surface a denial exactly like a missing resource so that guessing ids
//! reveals nothing about resources owned by others. Reads never come here.

use agora_core::forum::Owned;

use crate::{Error, Principal, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Allowed,
  Denied,
}

impl Decision {
  /// `Ok(())` when allowed, otherwise [`Error::NotAuthorized`].
  pub fn require(self) -> Result<()> {
    match self {
      Decision::Allowed => Ok(()),
      Decision::Denied  => Err(Error::NotAuthorized),
    }
  }
}

pub fn authorize<R: Owned + ?Sized>(principal: &Principal, resource: &R) -> Decision {
  if resource.owner_id() == principal.id {
    Decision::Allowed
  } else {
    tracing::debug!(
      principal = %principal.id,
      owner = %resource.owner_id(),
      "mutation denied: principal does not own resource"
    );
    Decision::Denied
  }
}
