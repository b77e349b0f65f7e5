//! Client responses as posted by the browser (`PublicKeyCredential` JSON).

use serde::{Deserialize, Serialize};

use crate::encoding::{b64url_decode, base64url_bytes, base64url_bytes_opt};
use crate::error::{FidoError, Result};
use crate::options::PUBLIC_KEY_TYPE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON", with = "base64url_bytes")]
    pub client_data_json: Vec<u8>,
    #[serde(rename = "attestationObject", with = "base64url_bytes")]
    pub attestation_object: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON", with = "base64url_bytes")]
    pub client_data_json: Vec<u8>,
    #[serde(with = "base64url_bytes")]
    pub authenticator_data: Vec<u8>,
    #[serde(with = "base64url_bytes")]
    pub signature: Vec<u8>,
    #[serde(default, with = "base64url_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Vec<u8>>,
}

/// Response to `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    #[serde(with = "base64url_bytes")]
    pub raw_id: Vec<u8>,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: AuthenticatorAttestationResponse,
}

/// Response to `navigator.credentials.get()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub id: String,
    #[serde(with = "base64url_bytes")]
    pub raw_id: Vec<u8>,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: AuthenticatorAssertionResponse,
}

fn check_credential_shape(id: &str, raw_id: &[u8], credential_type: &str) -> Result<()> {
    if credential_type != PUBLIC_KEY_TYPE {
        return Err(FidoError::InputShape(format!(
            "credential type must be \"public-key\", got {credential_type:?}"
        )));
    }
    if id.is_empty() || raw_id.is_empty() {
        return Err(FidoError::InputShape("credential id is empty".into()));
    }
    let decoded = b64url_decode(id)
        .map_err(|_| FidoError::InputShape("credential id is not base64url".into()))?;
    if decoded != raw_id {
        return Err(FidoError::InputShape("id does not encode rawId".into()));
    }
    Ok(())
}

impl RegistrationResponse {
    /// Structural checks made before any decoding.
    pub fn validate_shape(&self) -> Result<()> {
        check_credential_shape(&self.id, &self.raw_id, &self.credential_type)?;
        if self.response.client_data_json.is_empty() {
            return Err(FidoError::InputShape("clientDataJSON is empty".into()));
        }
        if self.response.attestation_object.is_empty() {
            return Err(FidoError::InputShape("attestationObject is empty".into()));
        }
        Ok(())
    }
}

impl AssertionResponse {
    pub fn validate_shape(&self) -> Result<()> {
        check_credential_shape(&self.id, &self.raw_id, &self.credential_type)?;
        if self.response.client_data_json.is_empty() {
            return Err(FidoError::InputShape("clientDataJSON is empty".into()));
        }
        if self.response.authenticator_data.is_empty() {
            return Err(FidoError::InputShape("authenticatorData is empty".into()));
        }
        if self.response.signature.is_empty() {
            return Err(FidoError::InputShape("signature is empty".into()));
        }
        Ok(())
    }
}
