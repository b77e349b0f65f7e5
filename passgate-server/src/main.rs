//! Passgate Server - REST API for WebAuthn relying parties
//!
//! Exposes passgate-core ceremonies via HTTP endpoints:
//! - POST /webauthn/register/{start,finish}
//! - POST /webauthn/authenticate/{start,finish}
//! - GET /health, GET /ready

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use passgate_server::{
    create_router_with_state, Config, RelyingPartySettings, WebAuthnState, WebAuthnStorage,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("passgate_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    let settings = RelyingPartySettings::from_env();

    let storage = WebAuthnStorage::from_config(&config)
        .await
        .context("failed to initialise account storage")?;
    let state = Arc::new(
        WebAuthnState::new(&settings, storage).context("invalid relying party settings")?,
    );

    tracing::info!(
        rp_id = %settings.rp_id,
        origin = %settings.origin,
        storage = state.storage().backend_name(),
        allow_none_attestation = settings.allow_none_attestation,
        strict_counter = settings.strict_counter,
        "Relying party configured"
    );

    spawn_challenge_sweeper(Arc::clone(&state), config.challenge_sweep_secs);

    let app = create_router_with_state(&config, state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drop challenges that expired without being consumed
fn spawn_challenge_sweeper(state: Arc<WebAuthnState>, every_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
        loop {
            interval.tick().await;
            match state.storage().cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired challenges removed"),
                Err(e) => tracing::warn!(error = %e, "Challenge sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
