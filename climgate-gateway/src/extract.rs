//! Bearer credential extractors.
//!
//! [`RootCaller`] guards the token management routes and [`ApiCaller`] the
//! engine routes. A missing or malformed `Authorization` header is reported
//! as forbidden on root routes and unauthorized on API routes.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use climgate_auth::{AuthError, Claims};

use crate::{error::GatewayError, state::AppState};

/// Caller proven to hold the root secret.
#[derive(Debug, Clone, Copy)]
pub struct RootCaller;

/// Caller holding a valid, unexpired, unrevoked API token.
#[derive(Debug, Clone)]
pub struct ApiCaller(pub Claims);

impl FromRequestParts<AppState> for RootCaller {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(AuthError::Forbidden)?;
        state.authority.require_root(token)?;
        Ok(RootCaller)
    }
}

impl FromRequestParts<AppState> for ApiCaller {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(GatewayError::MissingBearer)?;
        let claims = state.authority.verify(token)?;
        Ok(ApiCaller(claims))
    }
}

/// The token from an `Authorization: Bearer <token>` header.
fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
