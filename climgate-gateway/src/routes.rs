//! Axum route handlers for the climgate gateway API.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use climgate_core::{Location, Mode, ReferenceDataset};
use climgate_executor::JobRequest;

use crate::{
    admission::admit,
    error::GatewayError,
    extract::{ApiCaller, RootCaller},
    state::AppState,
};

/// Response header carrying the SHA-256 of the returned CSV.
pub const OUTPUT_HASH_HEADER: HeaderName = HeaderName::from_static("x-output-sha256");

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateTokenBody {
    #[serde(default, alias = "expires_in")]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub jti: String,
}

#[derive(Debug, Deserialize)]
pub struct RevokeTokenBody {
    #[serde(alias = "jti")]
    pub unique_id: String,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: String,
}

/// Body of `POST /{variant}/query`.
#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub locations: Vec<Location>,
    #[serde(default, alias = "normal")]
    pub reference_dataset: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl QueryBody {
    /// Validate the body into an executor request.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidRequest`] for an empty batch and
    /// [`GatewayError::Core`] for an out-of-range location or a bad dataset
    /// name.
    pub fn into_job(self) -> Result<JobRequest, GatewayError> {
        if self.locations.is_empty() {
            return Err(GatewayError::InvalidRequest("locations must not be empty".to_owned()));
        }
        for location in &self.locations {
            location.validate()?;
        }
        let reference_dataset = match self.reference_dataset {
            Some(name) => ReferenceDataset::new(name)?,
            None => ReferenceDataset::default(),
        };
        Ok(JobRequest {
            mode: self.mode.unwrap_or_default(),
            reference_dataset,
            locations: self.locations,
        })
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router.
///
/// Token and engine routes pass through the admission gate and the HTTP trace
/// layer. `/health` is never traced and is gated only when
/// [`AppState::health_gated`] is set.
pub fn create_router(state: AppState) -> Router {
    let gate = from_fn_with_state(state.clone(), admit);

    let api = Router::new()
        .route("/token/create", post(create_token))
        .route("/token/revoke", post(revoke_token))
        .route("/{variant}/query", post(query))
        .layer(gate.clone())
        .layer(TraceLayer::new_for_http());

    let mut probe = Router::new().route("/health", get(health));
    if state.health_gated {
        probe = probe.layer(gate);
    }

    api.merge(probe).with_state(state).layer(CorsLayer::permissive())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`: liveness probe reporting admission headroom.
pub async fn health(State(state): State<AppState>) -> Response {
    // A gated probe holds one of the slots it is reporting on.
    let own = usize::from(state.health_gated);
    let in_flight = state.gate.in_flight().saturating_sub(own);
    let capacity = state.gate.capacity();

    if in_flight < capacity {
        let body = serde_json::json!({"status": "ok", "in_flight": in_flight, "capacity": capacity});
        (StatusCode::OK, Json(body)).into_response()
    } else {
        let body = serde_json::json!({"status": "busy", "in_flight": in_flight, "capacity": capacity});
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// `POST /token/create`: mint an API token.
///
/// # Errors
/// Returns [`GatewayError::Auth`] if the caller is not root or the ttl is not
/// positive, and [`GatewayError::InvalidRequest`] for a malformed body.
pub async fn create_token(
    State(state): State<AppState>,
    _root: RootCaller,
    body: Bytes,
) -> Result<Json<TokenResponse>, GatewayError> {
    let body: CreateTokenBody = if body.iter().all(u8::is_ascii_whitespace) {
        CreateTokenBody::default()
    } else {
        parse_body(&body)?
    };
    let ttl = body.expires_in_seconds.unwrap_or(state.default_ttl_secs);

    let issued = state.authority.issue(true, ttl)?;
    tracing::info!(jti = %issued.jti, expires_in = issued.expires_in, "token issued");

    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: "bearer",
        expires_in: issued.expires_in,
        jti: issued.jti,
    }))
}

/// `POST /token/revoke`: revoke a token by id.
///
/// # Errors
/// Returns [`GatewayError::Auth`] if the caller is not root or the revocation
/// cannot be stored, and [`GatewayError::InvalidRequest`] for a malformed
/// body.
pub async fn revoke_token(
    State(state): State<AppState>,
    _root: RootCaller,
    body: Bytes,
) -> Result<Json<RevokeResponse>, GatewayError> {
    let body: RevokeTokenBody = parse_body(&body)?;
    let unique_id = body.unique_id.trim();
    if unique_id.is_empty() {
        return Err(GatewayError::InvalidRequest("unique_id must not be empty".to_owned()));
    }

    state.authority.revoke(true, unique_id).await?;
    Ok(Json(RevokeResponse { revoked: unique_id.to_owned() }))
}

/// `POST /{variant}/query`: run the engine for a batch of locations.
///
/// # Errors
/// Returns [`GatewayError::InvalidRequest`] / [`GatewayError::Core`] for a bad
/// body and [`GatewayError::Executor`] when the job fails.
pub async fn query(
    State(state): State<AppState>,
    ApiCaller(claims): ApiCaller,
    Path(variant): Path<String>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let started = Instant::now();
    let job = parse_body::<QueryBody>(&body)?.into_job()?;

    tracing::debug!(
        jti = claims.jti.as_deref().unwrap_or_default(),
        %variant,
        locations = job.locations.len(),
        "query accepted"
    );

    let output = state.runner.execute(&variant, &job).await?;

    tracing::info!(
        job_id = %output.job_id,
        %variant,
        locations = job.locations.len(),
        output_hash = %output.output_hash,
        elapsed_ms = started.elapsed().as_millis(),
        "query served"
    );

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", output.file_name()),
        ),
        (OUTPUT_HASH_HEADER, output.output_hash.to_string()),
    ];
    Ok((StatusCode::OK, headers, output.bytes).into_response())
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed request body: {e}")))
}
