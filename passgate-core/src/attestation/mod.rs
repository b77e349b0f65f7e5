//! Attestation statement verification.
//!
//! ## Architecture
//!
//! - [`AttestationStatement`] - closed sum over the formats, parsed from `attStmt`
//! - `packed` - self attestation and x5c basic attestation
//! - `fido_u2f` - legacy U2F attestation
//!
//! Formats that are recognised but not verifiable here (`tpm`,
//! `android-key`, `android-safetynet`, `apple`) and unknown formats both end
//! in [`FidoError::UnsupportedAttestationFormat`]. Chain-of-trust evaluation
//! for x5c certificates (metadata service, trust anchors) is left to the
//! caller, which receives the attestation type on the credential.

mod fido_u2f;
mod packed;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use x509_parser::certificate::X509Certificate;

use crate::config::AttestationPolicy;
use crate::decode::{AttestationFormat, AttestedCredentialData};
use crate::error::{DecodeError, FidoError, Result};
use crate::signature::CoseAlgorithm;

pub use fido_u2f::FidoU2fStatement;
pub use packed::PackedStatement;

/// How much provenance the attestation proved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    /// `"none"`: nothing proved
    None,
    /// Signed by the credential key itself
    SelfAttestation,
    /// Signed by an attestation certificate key
    Basic,
}

impl std::fmt::Display for AttestationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::SelfAttestation => "self",
            Self::Basic => "basic",
        })
    }
}

/// A parsed attestation statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    None,
    Packed(PackedStatement),
    FidoU2f(FidoU2fStatement),
    /// Recognised or unknown formats without a verifier
    Unsupported(AttestationFormat),
}

/// What an attestation signature is checked against.
pub struct AttestationInput<'a> {
    /// Raw authenticator data bytes
    pub auth_data: &'a [u8],
    pub rp_id_hash: &'a [u8; 32],
    pub client_data_hash: &'a [u8; 32],
    pub credential: &'a AttestedCredentialData,
}

impl AttestationInput<'_> {
    /// `authData ‖ clientDataHash`, the message packed attestation signs.
    fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.auth_data.len() + 32);
        data.extend_from_slice(self.auth_data);
        data.extend_from_slice(self.client_data_hash);
        data
    }
}

impl AttestationStatement {
    /// Parse `attStmt` for `format`. Unsupported formats are not inspected.
    pub fn parse(format: &AttestationFormat, statement: &[(Value, Value)]) -> Result<Self> {
        match format {
            AttestationFormat::None => {
                if !statement.is_empty() {
                    return Err(DecodeError::AttestationStatement(
                        "\"none\" statement must be empty".into(),
                    )
                    .into());
                }
                Ok(Self::None)
            }
            AttestationFormat::Packed => Ok(Self::Packed(PackedStatement::parse(statement)?)),
            AttestationFormat::FidoU2f => Ok(Self::FidoU2f(FidoU2fStatement::parse(statement)?)),
            other => Ok(Self::Unsupported(other.clone())),
        }
    }

    /// Verify the statement and report the attestation type it proves.
    pub fn verify(
        &self,
        input: &AttestationInput<'_>,
        policy: AttestationPolicy,
    ) -> Result<AttestationType> {
        match self {
            Self::None => match policy {
                AttestationPolicy::AllowNone => Ok(AttestationType::None),
                AttestationPolicy::RequireStatement => Err(FidoError::NoneAttestationNotAllowed),
            },
            Self::Packed(statement) => statement.verify(input),
            Self::FidoU2f(statement) => statement.verify(input),
            Self::Unsupported(format) => {
                Err(FidoError::UnsupportedAttestationFormat(format.to_string()))
            }
        }
    }
}

fn field<'a>(statement: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    statement
        .iter()
        .find(|(key, _)| key.as_text() == Some(name))
        .map(|(_, value)| value)
}

fn bytes_field(statement: &[(Value, Value)], name: &'static str) -> Result<Vec<u8>> {
    field(statement, name)
        .ok_or(DecodeError::MissingField(name))?
        .as_bytes()
        .cloned()
        .ok_or_else(|| DecodeError::InvalidFieldType(name).into())
}

fn alg_field(statement: &[(Value, Value)]) -> Result<CoseAlgorithm> {
    let alg = field(statement, "alg")
        .ok_or(DecodeError::MissingField("alg"))?
        .as_integer()
        .map(i128::from)
        .ok_or(DecodeError::InvalidFieldType("alg"))?;
    i64::try_from(alg)
        .ok()
        .and_then(|id| CoseAlgorithm::try_from(id).ok())
        .ok_or_else(|| {
            DecodeError::AttestationStatement(format!("unsupported attestation alg {alg}")).into()
        })
}

/// `x5c`: a non-empty array of DER certificates, leaf first.
fn x5c_field(statement: &[(Value, Value)]) -> Result<Option<Vec<Vec<u8>>>> {
    let Some(value) = field(statement, "x5c") else {
        return Ok(None);
    };
    let certs = value
        .as_array()
        .ok_or(DecodeError::InvalidFieldType("x5c"))?
        .iter()
        .map(|cert| {
            cert.as_bytes()
                .cloned()
                .ok_or(DecodeError::InvalidFieldType("x5c"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(DecodeError::AttestationStatement("empty x5c".into()).into());
    }
    Ok(Some(certs))
}

fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (rest, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| DecodeError::AttestationStatement(format!("attestation certificate: {e}")))?;
    if !rest.is_empty() {
        return Err(DecodeError::AttestationStatement(
            "trailing bytes after attestation certificate".into(),
        )
        .into());
    }
    Ok(cert)
}
