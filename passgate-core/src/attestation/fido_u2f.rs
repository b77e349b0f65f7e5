//! `fido-u2f` attestation (WebAuthn §8.6).

use ciborium::value::Value;

use super::{bytes_field, parse_certificate, x5c_field, AttestationInput, AttestationType};
use crate::decode::CoseKey;
use crate::error::{DecodeError, FidoError, Result};
use crate::signature::{verify_signature_spki, CoseAlgorithm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidoU2fStatement {
    pub sig: Vec<u8>,
    pub certificate: Vec<u8>,
}

impl FidoU2fStatement {
    pub(super) fn parse(statement: &[(Value, Value)]) -> Result<Self> {
        let mut chain = x5c_field(statement)?.ok_or(DecodeError::MissingField("x5c"))?;
        if chain.len() != 1 {
            return Err(DecodeError::AttestationStatement(format!(
                "fido-u2f requires exactly one certificate, got {}",
                chain.len()
            ))
            .into());
        }
        Ok(Self {
            sig: bytes_field(statement, "sig")?,
            certificate: chain.remove(0),
        })
    }

    pub(super) fn verify(&self, input: &AttestationInput<'_>) -> Result<AttestationType> {
        let CoseKey::Ec2P256 { x, y } = input.credential.public_key().key() else {
            return Err(FidoError::InvalidPublicKey(
                "fido-u2f credential key must be P-256".into(),
            ));
        };

        let cert = parse_certificate(&self.certificate)?;

        let credential_id = input.credential.credential_id();
        let mut verification_data = Vec::with_capacity(1 + 32 + 32 + credential_id.len() + 65);
        verification_data.push(0x00);
        verification_data.extend_from_slice(input.rp_id_hash);
        verification_data.extend_from_slice(input.client_data_hash);
        verification_data.extend_from_slice(credential_id);
        verification_data.push(0x04);
        verification_data.extend_from_slice(x);
        verification_data.extend_from_slice(y);

        if !verify_signature_spki(
            &self.sig,
            CoseAlgorithm::Es256,
            cert.public_key().raw,
            &verification_data,
        )? {
            return Err(FidoError::SignatureVerificationFailed);
        }

        tracing::debug!(subject = %cert.subject(), "fido-u2f attestation verified");
        Ok(AttestationType::Basic)
    }
}
