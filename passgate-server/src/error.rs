//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passgate_core::FidoError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Ceremony failure from the verification engine
    #[error("WebAuthn error: {0}")]
    Fido(#[from] FidoError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fido(e) => match e {
                // Malformed client input → 400
                FidoError::InputShape(_) | FidoError::Decode(_) => StatusCode::BAD_REQUEST,

                // Challenge missing, reused or stale → 400
                FidoError::ChallengeExpiredOrConsumed => StatusCode::BAD_REQUEST,

                // Ceremony checks that did not hold → 401
                FidoError::ClientDataType { .. }
                | FidoError::ChallengeMismatch
                | FidoError::OriginMismatch { .. }
                | FidoError::RelyingPartyHashMismatch
                | FidoError::FlagPolicyViolation(_)
                | FidoError::SignatureVerificationFailed => StatusCode::UNAUTHORIZED,

                // Authenticator or key the relying party will not accept → 422
                FidoError::UnsupportedAttestationFormat(_)
                | FidoError::NoneAttestationNotAllowed
                | FidoError::InvalidPublicKey(_) => StatusCode::UNPROCESSABLE_ENTITY,

                // Possible cloned authenticator → 403
                FidoError::CounterReplay { .. } => StatusCode::FORBIDDEN,
                FidoError::CounterConflict => StatusCode::CONFLICT,
                FidoError::CredentialNotFound => StatusCode::NOT_FOUND,

                // Storage backend failures → 503
                FidoError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,

                // Internal processing failures → 500
                FidoError::Entropy(_) | FidoError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Fido(e) => e.code(),
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Fido(FidoError::Store(_)) => "Account storage unavailable".to_string(),
            Self::Fido(FidoError::Entropy(_)) => "Challenge generation failed".to_string(),
            Self::Fido(FidoError::Config(_)) => "Server misconfigured".to_string(),
            Self::Fido(e) => e.to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Fido(_) => "webauthn",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::Fido(FidoError::CounterReplay { stored, received }) => {
                tracing::error!(
                    status = %status,
                    code = code,
                    stored = *stored,
                    received = *received,
                    "Signature counter replay: possible cloned authenticator"
                );
            }
            _ if status.is_server_error() => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
            _ => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
