//! Token claims and the values handed back when a token is minted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Subject carried by every minted (non-root) token.
pub const API_SUBJECT: &str = "api_token";

/// Trust tier a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The root authority.
    Root,
    /// A derived, expiring, revocable API credential.
    Api,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Root => f.write_str("root"),
            Role::Api => f.write_str("api"),
        }
    }
}

/// JWT claim set.
///
/// `jti` is optional on the wire so that tokens without one decode and can be
/// rejected as revoked rather than as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject.
    pub sub: String,
    /// Trust tier.
    pub role: Role,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Unique token id, the revocation handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded, signed token.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Unique id to pass to revocation.
    pub jti: String,
}
