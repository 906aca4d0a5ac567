//! Shared request state.

use std::sync::Arc;

use climgate_auth::{RevocationStore, RootSecret, TokenAuthority};
use climgate_executor::{EngineBackend, JobRunner};

use crate::{admission::AdmissionGate, config::GatewayConfig};

/// Engine backend shared by every request.
pub type SharedEngine = Arc<dyn EngineBackend>;

/// Service objects handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Token issue, verify and revoke.
    pub authority: Arc<TokenAuthority>,
    /// Concurrency limiter for engine jobs.
    pub gate: Arc<AdmissionGate>,
    /// Engine job runner.
    pub runner: Arc<JobRunner<SharedEngine>>,
    /// Token lifetime when `/token/create` does not specify one.
    pub default_ttl_secs: i64,
    /// Whether `/health` passes through the admission gate.
    pub health_gated: bool,
}

impl AppState {
    /// Assemble the service objects described by `config`.
    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        revocations: Arc<dyn RevocationStore>,
        engine: SharedEngine,
    ) -> Self {
        let authority = TokenAuthority::new(
            config.jwt_secret.as_bytes(),
            RootSecret::new(config.root_token.clone()),
            revocations,
        );

        let mut runner =
            JobRunner::new(engine, config.engines.clone()).with_timeouts(config.timeouts);
        if let Some(dir) = &config.scratch_dir {
            runner = runner.with_scratch_dir(dir.clone());
        }

        Self {
            authority: Arc::new(authority),
            gate: Arc::new(AdmissionGate::new(config.max_concurrent)),
            runner: Arc::new(runner),
            default_ttl_secs: config.default_ttl_secs,
            health_gated: config.health_gated,
        }
    }
}
