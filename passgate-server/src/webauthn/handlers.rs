//! WebAuthn HTTP endpoint handlers
//!
//! Implements the registration and authentication flows over a
//! [`CeremonyService`] backed by [`WebAuthnStorage`].

use axum::{extract::State, Json};
use passgate_core::encoding::{b64url_decode, b64url_encode};
use passgate_core::{CeremonyService, RelyingParty, UserEntity};
use std::sync::Arc;

use super::storage::WebAuthnStorage;
use super::types::{
    AuthenticationResponse, CredentialSummary, FinishAuthenticationRequest,
    FinishRegistrationRequest, StartAuthenticationRequest, StartAuthenticationResponse,
    StartRegistrationRequest, StartRegistrationResponse,
};
use super::RelyingPartySettings;
use crate::error::ApiError;

const DEFAULT_USER_NAME: &str = "passgate-user";

/// Ceremony service plus the origin responses must come from
pub struct WebAuthnState {
    pub service: CeremonyService<WebAuthnStorage>,
    pub origin: String,
}

impl WebAuthnState {
    pub fn new(settings: &RelyingPartySettings, storage: WebAuthnStorage) -> Result<Self, ApiError> {
        let config = settings
            .relying_party_config()
            .map_err(|e| ApiError::internal(format!("Invalid relying party settings: {e}")))?;

        Ok(Self {
            service: CeremonyService::new(RelyingParty::new(config), storage),
            origin: settings.origin.clone(),
        })
    }

    /// Create with in-memory storage (for testing)
    pub fn in_memory(settings: &RelyingPartySettings) -> Result<Self, ApiError> {
        Self::new(settings, WebAuthnStorage::in_memory())
    }

    pub fn storage(&self) -> &WebAuthnStorage {
        self.service.store()
    }
}

impl std::fmt::Debug for WebAuthnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebAuthnState")
            .field("relying_party", self.service.relying_party())
            .field("storage", self.service.store())
            .field("origin", &self.origin)
            .finish()
    }
}

/// POST /webauthn/register/start
///
/// Start registration of a credential for a new user handle.
/// Returns creation options whose challenge the authenticator must sign.
pub async fn start_registration(
    State(state): State<Arc<WebAuthnState>>,
    Json(req): Json<StartRegistrationRequest>,
) -> Result<Json<StartRegistrationResponse>, ApiError> {
    let user_id = uuid::Uuid::new_v4();
    let name = req
        .user_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());
    let display_name = req.display_name.unwrap_or_else(|| name.clone());

    let start = state
        .service
        .create_registration_challenge(
            UserEntity {
                id: user_id.as_bytes().to_vec(),
                name,
                display_name,
            },
            req.factor,
        )
        .await?;

    tracing::info!(user_id = %user_id, "WebAuthn registration started");

    Ok(Json(StartRegistrationResponse {
        user_id: b64url_encode(user_id.as_bytes()),
        public_key: start.options,
    }))
}

/// POST /webauthn/register/finish
///
/// Verify the authenticator's attestation against the factor chosen at
/// start and store the credential.
pub async fn finish_registration(
    State(state): State<Arc<WebAuthnState>>,
    Json(req): Json<FinishRegistrationRequest>,
) -> Result<Json<CredentialSummary>, ApiError> {
    let registered = state
        .service
        .finish_registration(&req.response, &state.origin)
        .await?;

    Ok(Json(CredentialSummary::from(registered)))
}

/// POST /webauthn/authenticate/start
///
/// Start authentication for a user with at least one registered credential.
pub async fn start_authentication(
    State(state): State<Arc<WebAuthnState>>,
    Json(req): Json<StartAuthenticationRequest>,
) -> Result<Json<StartAuthenticationResponse>, ApiError> {
    let user_id = b64url_decode(&req.user_id)
        .map_err(|e| ApiError::bad_request(format!("user_id is not base64url: {e}")))?;

    let start = state
        .service
        .create_assertion_challenge(&user_id, req.factor)
        .await?;

    tracing::info!(
        credentials = start.options.allow_credentials.len(),
        "WebAuthn authentication started"
    );

    Ok(Json(StartAuthenticationResponse {
        public_key: start.options,
    }))
}

/// POST /webauthn/authenticate/finish
///
/// Verify the assertion and advance the stored signature counter.
pub async fn finish_authentication(
    State(state): State<Arc<WebAuthnState>>,
    Json(req): Json<FinishAuthenticationRequest>,
) -> Result<Json<AuthenticationResponse>, ApiError> {
    let result = state
        .service
        .finish_assertion(&req.response, &state.origin)
        .await?;

    Ok(Json(AuthenticationResponse::from(result)))
}
