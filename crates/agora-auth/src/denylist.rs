//! Token revocation.
//!
//! Logout cannot invalidate a self-verifying token by itself, so a denylist
//! keyed by token id is consulted during verification. Entries live exactly
//! as long as the token would have: once `exp` passes the token is rejected
//! on expiry anyway, and the next revocation purges the entry. Lookups never
//! modify the list.

use std::{collections::HashMap, sync::Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A store of revoked token ids.
pub trait Denylist: Send + Sync {
  fn revoke(&self, token_id: Uuid, expires_at: DateTime<Utc>);

  fn is_revoked(&self, token_id: Uuid, now: DateTime<Utc>) -> bool;
}

/// Process-local denylist. Sufficient for a single server instance.
#[derive(Debug, Default)]
pub struct MemoryDenylist {
  entries: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl MemoryDenylist {
  pub fn len(&self) -> usize { self.lock().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, DateTime<Utc>>> {
    // A poisoned map is still a valid map of ids to expiries.
    self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Denylist for MemoryDenylist {
  fn revoke(&self, token_id: Uuid, expires_at: DateTime<Utc>) {
    let now = Utc::now();
    let mut entries = self.lock();
    entries.retain(|_, exp| *exp >= now);
    entries.insert(token_id, expires_at);
  }

  fn is_revoked(&self, token_id: Uuid, now: DateTime<Utc>) -> bool {
    self.lock().get(&token_id).is_some_and(|exp| *exp >= now)
  }
}
