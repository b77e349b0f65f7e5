//! WebAuthn request/response types
//!
//! Defines the data structures for WebAuthn API communication. Binary
//! values travel as unpadded base64url strings.

use passgate_core::encoding::b64url_encode;
use passgate_core::{
    AssertionResponse, AssertionResult, AttestationFormat, AttestationType, CoseAlgorithm,
    ExpectedFactor, PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions,
    Registered, RegistrationResponse,
};
use serde::{Deserialize, Serialize};

/// Request to start registration of a new user's credential
#[derive(Debug, Default, Deserialize)]
pub struct StartRegistrationRequest {
    /// Account name (default: "passgate-user")
    pub user_name: Option<String>,
    /// Display name (default: the account name)
    pub display_name: Option<String>,
    /// Factor the finish step must prove; also drives the `userVerification` hint
    #[serde(default)]
    pub factor: ExpectedFactor,
}

/// Response containing the registration challenge
#[derive(Debug, Serialize)]
pub struct StartRegistrationResponse {
    /// User handle assigned to this registration (base64url)
    pub user_id: String,
    /// Options for `navigator.credentials.create({ publicKey })`
    pub public_key: PublicKeyCredentialCreationOptions,
}

/// Request to complete registration
#[derive(Debug, Deserialize)]
pub struct FinishRegistrationRequest {
    pub response: RegistrationResponse,
}

/// Summary of a newly registered credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub credential_id: String,
    pub user_id: String,
    pub algorithm: CoseAlgorithm,
    pub attestation_format: AttestationFormat,
    pub attestation_type: AttestationType,
    pub aaguid: uuid::Uuid,
    pub sign_count: u32,
    pub user_verified: bool,
    pub backup_eligible: bool,
}

impl From<Registered> for CredentialSummary {
    fn from(registered: Registered) -> Self {
        let credential = registered.credential;
        Self {
            credential_id: b64url_encode(&credential.id),
            user_id: b64url_encode(&registered.user_id),
            algorithm: credential.algorithm,
            attestation_format: credential.attestation_format,
            attestation_type: credential.attestation_type,
            aaguid: credential.aaguid,
            sign_count: credential.sign_count,
            user_verified: credential.user_verified,
            backup_eligible: credential.backup_eligible,
        }
    }
}

/// Request to start authentication
#[derive(Debug, Deserialize)]
pub struct StartAuthenticationRequest {
    /// User handle returned at registration (base64url)
    pub user_id: String,
    /// Factor the finish step must prove
    #[serde(default)]
    pub factor: ExpectedFactor,
}

/// Response containing the authentication challenge
#[derive(Debug, Serialize)]
pub struct StartAuthenticationResponse {
    /// Options for `navigator.credentials.get({ publicKey })`
    pub public_key: PublicKeyCredentialRequestOptions,
}

/// Request to complete authentication
///
/// The expected factor is the one bound to the challenge at start.
#[derive(Debug, Deserialize)]
pub struct FinishAuthenticationRequest {
    pub response: AssertionResponse,
}

/// Result of a verified assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub credential_id: String,
    pub sign_count: u32,
    pub user_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

impl From<AssertionResult> for AuthenticationResponse {
    fn from(result: AssertionResult) -> Self {
        Self {
            credential_id: b64url_encode(&result.credential_id),
            sign_count: result.new_sign_count,
            user_verified: result.user_verified,
            user_handle: result.user_handle.map(b64url_encode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_registration_defaults() {
        let req: StartRegistrationRequest = serde_json::from_str("{}").unwrap();
        assert!(req.user_name.is_none());
        assert_eq!(req.factor, ExpectedFactor::Either);

        let req: StartRegistrationRequest =
            serde_json::from_str(r#"{"user_name":"alice","factor":"first"}"#).unwrap();
        assert_eq!(req.user_name.as_deref(), Some("alice"));
        assert_eq!(req.factor, ExpectedFactor::First);
    }

    #[test]
    fn test_authentication_response_encoding() {
        let response = AuthenticationResponse::from(AssertionResult {
            credential_id: vec![0xff, 0xee],
            new_sign_count: 9,
            user_verified: true,
            user_handle: Some(b"u1".to_vec()),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["credential_id"], "_-4");
        assert_eq!(json["sign_count"], 9);
        assert_eq!(json["user_handle"], "dTE");
    }
}
