//! The token authority: mints, verifies and revokes API tokens.
//!
//! Two trust tiers exist. The root secret is a raw shared secret compared in
//! constant time; it never expires and is never revoked. Everything else is
//! an HS256-signed token minted on the root's behalf, bounded by its expiry
//! and individually revocable through its `jti`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::claims::{Claims, IssuedToken, Role, API_SUBJECT};
use crate::revocation::RevocationStore;
use crate::AuthError;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// The configured root credential.
///
/// `Debug` never prints the secret.
#[derive(Clone)]
pub struct RootSecret(String);

impl RootSecret {
    /// Wrap a root secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Constant-time equality against a presented credential.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        bool::from(self.0.as_bytes().ct_eq(presented.as_bytes()))
    }
}

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootSecret(..)")
    }
}

/// Mints, verifies and revokes tokens.
///
/// Minting is stateless: nothing about an issued token is remembered except
/// through the revocation store.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    root: RootSecret,
    revocations: Arc<dyn RevocationStore>,
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("root", &self.root)
            .field("revoked", &self.revocations.len())
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Create an authority signing with `signing_secret`.
    #[must_use]
    pub fn new(
        signing_secret: &[u8],
        root: RootSecret,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_secret),
            decoding_key: DecodingKey::from_secret(signing_secret),
            root,
            revocations,
        }
    }

    /// Check a presented credential against the root secret.
    ///
    /// # Errors
    /// Returns [`AuthError::Forbidden`] on mismatch.
    pub fn require_root(&self, presented: &str) -> Result<(), AuthError> {
        if self.root.matches(presented) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Mint an API token valid for `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns [`AuthError::Forbidden`] if the caller is not root,
    /// [`AuthError::InvalidRequest`] if `ttl_seconds` is not positive, and
    /// [`AuthError::Signing`] if encoding fails.
    pub fn issue(&self, caller_is_root: bool, ttl_seconds: i64) -> Result<IssuedToken, AuthError> {
        self.issue_at(caller_is_root, ttl_seconds, Utc::now())
    }

    /// [`issue`](Self::issue) against an explicit clock.
    ///
    /// # Errors
    /// Same as [`issue`](Self::issue).
    pub fn issue_at(
        &self,
        caller_is_root: bool,
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if !caller_is_root {
            return Err(AuthError::Forbidden);
        }
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidRequest(format!(
                "expires_in must be a positive number of seconds, got {ttl_seconds}"
            )));
        }

        let iat = now.timestamp();
        let exp = iat.checked_add(ttl_seconds).ok_or_else(|| {
            AuthError::InvalidRequest(format!("expires_in {ttl_seconds} overflows the clock"))
        })?;
        let jti = Uuid::new_v4().simple().to_string();

        let claims = Claims {
            sub: API_SUBJECT.to_owned(),
            role: Role::Api,
            iat,
            exp,
            jti: Some(jti.clone()),
        };
        let access_token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        tracing::info!(%jti, exp, "api token issued");

        Ok(IssuedToken { access_token, expires_in: ttl_seconds, jti })
    }

    /// Verify a presented token now.
    ///
    /// # Errors
    /// Returns [`AuthError::TokenInvalid`], [`AuthError::TokenExpired`] or
    /// [`AuthError::TokenRevoked`].
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock.
    ///
    /// Expiry is checked before revocation, so a token past `exp` is always
    /// reported as expired.
    ///
    /// # Errors
    /// Returns [`AuthError::TokenInvalid`] on bad encoding or signature,
    /// [`AuthError::TokenExpired`] if `exp <= now`, and
    /// [`AuthError::TokenRevoked`] if the `jti` is missing, empty or revoked.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is enforced below with an inclusive bound and no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        match claims.jti.as_deref() {
            Some(jti) if !jti.is_empty() && !self.revocations.is_revoked(jti) => Ok(claims),
            _ => Err(AuthError::TokenRevoked),
        }
    }

    /// Revoke a token id. Revoking an already revoked or never issued id is
    /// not an error.
    ///
    /// # Errors
    /// Returns [`AuthError::Forbidden`] if the caller is not root, or
    /// [`AuthError::Store`] if the revocation cannot be persisted.
    pub async fn revoke(&self, caller_is_root: bool, jti: &str) -> Result<(), AuthError> {
        if !caller_is_root {
            return Err(AuthError::Forbidden);
        }
        let inserted = self.revocations.revoke(jti).await?;
        tracing::info!(%jti, inserted, "token revoked");
        Ok(())
    }

    /// Number of revoked token ids.
    #[must_use]
    pub fn revoked_count(&self) -> usize {
        self.revocations.len()
    }
}
