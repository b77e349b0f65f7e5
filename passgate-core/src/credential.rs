//! Registered credentials and verification results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attestation::AttestationType;
use crate::decode::{AttestationFormat, CosePublicKey};
use crate::encoding::{base64url_bytes, base64url_bytes_opt};
use crate::options::{CredentialDescriptor, PUBLIC_KEY_TYPE};
use crate::signature::CoseAlgorithm;

/// A vetted credential, produced by registration and persisted by the
/// account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub public_key: CosePublicKey,
    pub algorithm: CoseAlgorithm,
    pub sign_count: u32,
    pub aaguid: Uuid,
    pub attestation_format: AttestationFormat,
    pub attestation_type: AttestationType,
    /// UV flag at registration
    pub user_verified: bool,
    /// BE flag at registration (multi-device credential)
    pub backup_eligible: bool,
}

impl Credential {
    pub fn descriptor(&self) -> CredentialDescriptor {
        CredentialDescriptor::public_key(self.id.clone())
    }

    pub fn is_public_key(&self) -> bool {
        self.credential_type == PUBLIC_KEY_TYPE
    }
}

/// Successful assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    #[serde(with = "base64url_bytes")]
    pub credential_id: Vec<u8>,
    /// Counter to persist for the credential
    pub new_sign_count: u32,
    pub user_verified: bool,
    #[serde(default, with = "base64url_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Vec<u8>>,
}
