//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::webauthn::WebAuthnState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status: always "healthy" while the process serves requests
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Account storage backend ("postgres" or "memory")
    pub storage: &'static str,
    /// Whether credentials survive a restart
    pub persistent: bool,
}

/// GET /health - Health check endpoint
///
/// Liveness only; does not touch the database.
pub async fn health(State(state): State<Arc<WebAuthnState>>) -> Json<HealthResponse> {
    let storage = state.storage();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "passgate-server",
        storage: storage.backend_name(),
        persistent: storage.is_persistent(),
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Returns 503 while the account store cannot be reached.
pub async fn ready(
    State(state): State<Arc<WebAuthnState>>,
) -> (StatusCode, Json<ReadyResponse>) {
    match state.storage().check_health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    message: Some("account storage unavailable"),
                }),
            )
        }
    }
}
