//! Token authority for the climgate engine gateway.
//!
//! Mints time-bounded API tokens on behalf of the root credential, verifies
//! them (signature, expiry, revocation) and maintains the revocation set.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod authority;
pub mod claims;
pub mod error;
pub mod revocation;

pub use authority::{RootSecret, TokenAuthority};
pub use claims::{Claims, IssuedToken, Role, API_SUBJECT};
pub use error::AuthError;
pub use revocation::{FileRevocations, MemoryRevocations, RevocationStore};
