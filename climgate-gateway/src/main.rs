//! Entry point for the `climgate-gateway` HTTP server.

use std::path::Path;
use std::sync::Arc;

use climgate_auth::{FileRevocations, MemoryRevocations, RevocationStore};
use climgate_executor::ProcessEngine;
use climgate_gateway::{create_router, AppState, GatewayConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Variables from a `.env` in the working directory fill in what the
    // service environment leaves unset.
    let config = match GatewayConfig::from_env_and_file(Path::new(".env")) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Some(dir) = &config.scratch_dir {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!(path = %dir.display(), error = %e, "failed to create scratch directory");
            std::process::exit(1);
        }
    }

    let revocations: Arc<dyn RevocationStore> = match &config.revocation_file {
        Some(path) => match FileRevocations::open(path.clone()).await {
            Ok(store) => {
                info!(path = %path.display(), revoked = store.len(), "loaded revocation file");
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to open revocation file");
                std::process::exit(1);
            }
        },
        None => {
            info!("revocations are in memory and will not survive a restart");
            Arc::new(MemoryRevocations::new())
        }
    };

    let state = AppState::from_config(&config, revocations, Arc::new(ProcessEngine::new()));
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(
        addr = %config.listen_addr,
        max_concurrent = config.max_concurrent,
        variants = ?config.engines.variants().collect::<Vec<_>>(),
        "climgate-gateway listening"
    );

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
    info!("climgate-gateway stopped");
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received, draining requests");
}
