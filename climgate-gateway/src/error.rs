//! Error types for the gateway crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::Level;

use climgate_auth::AuthError;
use climgate_core::CoreError;
use climgate_executor::ExecutorError;

/// Errors that can occur during gateway request handling.
///
/// This is the only place internal errors become HTTP statuses. Server-side
/// detail (paths, engine stderr) is logged and never sent to the caller.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Token minting, verification or revocation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No usable `Authorization: Bearer` header on an API route.
    #[error("missing bearer token")]
    MissingBearer,

    /// The admission gate is full.
    #[error("server busy")]
    Busy,

    /// An error propagated from the executor layer.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// A domain value in the request failed validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request body is malformed or contains invalid values.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// HTTP status and caller-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            GatewayError::Auth(AuthError::Forbidden) => {
                (StatusCode::FORBIDDEN, "root token required".to_owned())
            }
            GatewayError::Auth(e) if e.is_unauthorized() => {
                (StatusCode::UNAUTHORIZED, "unauthorized".to_owned())
            }
            GatewayError::Auth(AuthError::InvalidRequest(msg)) | GatewayError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            GatewayError::MissingBearer => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            GatewayError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "server busy".to_owned()),
            GatewayError::Core(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            GatewayError::Executor(ExecutorError::UnknownVariant(_)) => {
                (StatusCode::NOT_FOUND, "unknown variant".to_owned())
            }
            GatewayError::Executor(ExecutorError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "engine timed out".to_owned())
            }
            GatewayError::Executor(ExecutorError::EngineFailed { .. }) => {
                (StatusCode::BAD_GATEWAY, "engine failed".to_owned())
            }
            GatewayError::Auth(_) | GatewayError::Executor(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
            }
        }
    }

    /// Level the rejection is logged at. Engine failures are already logged
    /// with their stderr by the job runner.
    fn log_level(&self, status: StatusCode) -> Level {
        match self {
            GatewayError::Executor(ExecutorError::EngineFailed { .. }) => Level::DEBUG,
            _ if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE => Level::ERROR,
            _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => Level::WARN,
            _ => Level::DEBUG,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let level = self.log_level(status);
        if level == Level::ERROR {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else if level == Level::WARN {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        (status, Json(json!({"error": message}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use climgate_core::JobId;

    use super::*;

    fn status(err: GatewayError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(status(AuthError::Forbidden.into()), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::TokenExpired.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::TokenRevoked.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AuthError::TokenInvalid("bad signature".to_owned()).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status(GatewayError::MissingBearer), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AuthError::InvalidRequest("ttl must be positive".to_owned()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthError::Signing("key".to_owned()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn executor_errors_map_by_kind() {
        let job_id = JobId::new();
        assert_eq!(
            status(ExecutorError::UnknownVariant("eu".to_owned()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ExecutorError::Timeout { job_id, timeout: Duration::from_secs(10) }.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status(
                ExecutorError::EngineFailed { job_id, code: Some(1), stderr: String::new() }.into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(ExecutorError::OutputMissing { path: PathBuf::from("out.csv") }.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(
                ExecutorError::SpawnFailed {
                    program: PathBuf::from("engine.exe"),
                    reason: "not found".to_owned(),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Executor resource errors must map to 500"
        );
    }

    #[test]
    fn busy_and_validation_errors() {
        assert_eq!(status(GatewayError::Busy), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(GatewayError::InvalidRequest("missing field".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CoreError::InvalidReferenceDataset("../x".to_owned()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn engine_failure_body_hides_stderr() {
        let err = GatewayError::from(ExecutorError::EngineFailed {
            job_id: JobId::new(),
            code: Some(2),
            stderr: r"C:\ClimateNA_v7.50\secret.nrm not found".to_owned(),
        });
        let resp = err.into_response();
        let bytes = match axum::body::to_bytes(resp.into_body(), 1024).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        let body: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => panic!("invalid JSON: {e}"),
        };
        assert_eq!(body, json!({"error": "engine failed"}));
    }

    #[test]
    fn gateway_error_display_includes_message() {
        let err = GatewayError::InvalidRequest("locations must be an array".to_owned());
        let msg = err.to_string();
        assert!(msg.contains("locations must be an array"), "Display must include the message");
    }

    #[test]
    fn engine_failure_is_not_logged_again_at_error() {
        let engine = GatewayError::from(ExecutorError::EngineFailed {
            job_id: JobId::new(),
            code: Some(1),
            stderr: "boom".to_owned(),
        });
        let (status, _) = engine.status_and_message();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(engine.log_level(status), Level::DEBUG);

        let spawn = GatewayError::from(ExecutorError::SpawnFailed {
            program: PathBuf::from("engine.exe"),
            reason: "not found".to_owned(),
        });
        let (status, _) = spawn.status_and_message();
        assert_eq!(spawn.log_level(status), Level::ERROR);

        let busy = GatewayError::Busy;
        let (status, _) = busy.status_and_message();
        assert_eq!(busy.log_level(status), Level::DEBUG);
    }
}
