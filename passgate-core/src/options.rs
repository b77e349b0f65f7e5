//! Credential creation and request options sent to the client.
//!
//! These serialize to the camelCase JSON shape browsers expect for
//! `navigator.credentials.create()` / `.get()`, with binary fields as
//! base64url strings.

use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::config::{AttestationPolicy, RelyingPartyConfig};
use crate::encoding::{b64url_encode, base64url_bytes};
use crate::signature::CoseAlgorithm;

pub const PUBLIC_KEY_TYPE: &str = "public-key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Opaque user handle
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialParameter {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub alg: CoseAlgorithm,
}

/// Reference to a credential (allow/exclude lists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub credential_type: String,
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

impl CredentialDescriptor {
    pub fn public_key(id: Vec<u8>) -> Self {
        Self {
            credential_type: PUBLIC_KEY_TYPE.to_string(),
            id,
            transports: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyance {
    None,
    Indirect,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub require_resident_key: bool,
    pub user_verification: UserVerificationRequirement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub challenge: String,
    pub pub_key_cred_params: Vec<CredentialParameter>,
    /// Milliseconds
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub authenticator_selection: AuthenticatorSelection,
    pub attestation: AttestationConveyance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    pub challenge: String,
    pub timeout: u64,
    pub rp_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: UserVerificationRequirement,
}

pub fn creation_options(
    challenge: &Challenge,
    config: &RelyingPartyConfig,
    user: UserEntity,
    exclude_credentials: Vec<CredentialDescriptor>,
    user_verification: UserVerificationRequirement,
) -> PublicKeyCredentialCreationOptions {
    let attestation = match config.attestation_policy {
        AttestationPolicy::RequireStatement => AttestationConveyance::Direct,
        AttestationPolicy::AllowNone => AttestationConveyance::None,
    };

    PublicKeyCredentialCreationOptions {
        rp: RelyingPartyEntity {
            id: config.id.clone(),
            name: config.name.clone(),
            icon: config.icon.clone(),
        },
        user,
        challenge: b64url_encode(&challenge.value),
        pub_key_cred_params: config
            .algorithms
            .iter()
            .map(|alg| CredentialParameter {
                credential_type: PUBLIC_KEY_TYPE.to_string(),
                alg: *alg,
            })
            .collect(),
        timeout: config.timeout_ms(),
        exclude_credentials,
        authenticator_selection: AuthenticatorSelection {
            require_resident_key: false,
            user_verification,
        },
        attestation,
    }
}

pub fn request_options(
    challenge: &Challenge,
    config: &RelyingPartyConfig,
    allow_credentials: Vec<CredentialDescriptor>,
    user_verification: UserVerificationRequirement,
) -> PublicKeyCredentialRequestOptions {
    PublicKeyCredentialRequestOptions {
        challenge: b64url_encode(&challenge.value),
        timeout: config.timeout_ms(),
        rp_id: config.id.clone(),
        allow_credentials,
        user_verification,
    }
}
