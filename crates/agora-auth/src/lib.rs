//! Authentication and ownership authorization for Agora.
//!
//! - [`token`] issues and verifies stateless signed bearer tokens.
//! - [`session`] is the per-request / per-connection authentication state
//!   machine built on top of verification.
//! - [`guard`] decides whether a principal may mutate a resource.
//! - [`denylist`] is the optional revocation collaborator used by logout.
//!
//! Tokens carry identity only. Every authorization decision goes through the
//! ownership guard.

pub mod denylist;
pub mod error;
pub mod guard;
pub mod password;
pub mod session;
pub mod token;

pub use error::{Error, Result, TokenFault};
pub use guard::{Decision, authorize};
pub use session::{AuthState, Principal, Session};
pub use token::{IssuedToken, TokenService, VerifiedToken};
