//! Error types for the auth crate.

/// Errors raised while minting, verifying or revoking tokens.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// A root-only operation was attempted without the root secret.
    #[error("root token required")]
    Forbidden,

    /// The request carried an unusable parameter (e.g. a non-positive ttl).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed encoding, bad signature or wrong signing key.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// The token's expiry is at or before the current time.
    #[error("token expired")]
    TokenExpired,

    /// The token's id is revoked, or the token carries no id at all.
    #[error("token revoked")]
    TokenRevoked,

    /// Encoding a freshly minted token failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// The revocation store could not persist or load an entry.
    #[error("revocation store error: {0}")]
    Store(#[from] std::io::Error),
}

impl AuthError {
    /// Returns `true` for the kinds surfaced to callers as "unauthorized".
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::TokenInvalid(_) | AuthError::TokenExpired | AuthError::TokenRevoked
        )
    }
}
