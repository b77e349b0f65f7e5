//! `packed` attestation (WebAuthn §8.2).

use ciborium::value::Value;
use x509_parser::certificate::X509Certificate;
use x509_parser::x509::X509Version;

use super::{
    alg_field, bytes_field, field, parse_certificate, x5c_field, AttestationInput, AttestationType,
};
use crate::error::{FidoError, Result};
use crate::signature::{verify_signature, verify_signature_spki, CoseAlgorithm};

/// id-fido-gen-ce-aaguid
const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

const ATTESTATION_OU: &str = "Authenticator Attestation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStatement {
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    /// Leaf first; absent for self attestation
    pub x5c: Option<Vec<Vec<u8>>>,
}

impl PackedStatement {
    pub(super) fn parse(statement: &[(Value, Value)]) -> Result<Self> {
        if field(statement, "ecdaaKeyId").is_some() {
            return Err(FidoError::UnsupportedAttestationFormat("packed (ECDAA)".into()));
        }
        Ok(Self {
            alg: alg_field(statement)?,
            sig: bytes_field(statement, "sig")?,
            x5c: x5c_field(statement)?,
        })
    }

    pub(super) fn verify(&self, input: &AttestationInput<'_>) -> Result<AttestationType> {
        let signed_data = input.signed_data();

        match &self.x5c {
            None => {
                let key = input.credential.public_key();
                if key.algorithm() != self.alg {
                    return Err(FidoError::InvalidPublicKey(format!(
                        "self attestation alg {} differs from credential alg {}",
                        self.alg,
                        key.algorithm()
                    )));
                }
                if !verify_signature(&self.sig, self.alg, key, &signed_data)? {
                    return Err(FidoError::SignatureVerificationFailed);
                }
                tracing::debug!(alg = self.alg.name(), "Packed self attestation verified");
                Ok(AttestationType::SelfAttestation)
            }
            Some(chain) => {
                let leaf = parse_certificate(&chain[0])?;
                check_certificate(&leaf, input.credential.aaguid())?;

                if !verify_signature_spki(&self.sig, self.alg, leaf.public_key().raw, &signed_data)? {
                    return Err(FidoError::SignatureVerificationFailed);
                }
                tracing::debug!(
                    alg = self.alg.name(),
                    chain_len = chain.len(),
                    subject = %leaf.subject(),
                    "Packed basic attestation verified"
                );
                Ok(AttestationType::Basic)
            }
        }
    }
}

/// Attestation certificate requirements (WebAuthn §8.2.1).
fn check_certificate(cert: &X509Certificate<'_>, aaguid: &[u8; 16]) -> Result<()> {
    let invalid = |reason: &str| FidoError::InvalidPublicKey(format!("attestation certificate {reason}"));

    if cert.version() != X509Version::V3 {
        return Err(invalid("is not X.509 v3"));
    }
    if !cert.validity().is_valid() {
        return Err(invalid("is expired or not yet valid"));
    }

    let ou_matches = cert
        .subject()
        .iter_organizational_unit()
        .any(|ou| ou.as_str().ok() == Some(ATTESTATION_OU));
    if !ou_matches {
        return Err(invalid("subject OU must be \"Authenticator Attestation\""));
    }

    match cert.basic_constraints() {
        Ok(Some(constraints)) if constraints.value.ca => return Err(invalid("is a CA certificate")),
        Ok(_) => {}
        Err(e) => return Err(invalid(&format!("has bad basic constraints: {e}"))),
    }

    if let Some(ext) = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == OID_FIDO_GEN_CE_AAGUID)
    {
        // OCTET STRING wrapping the 16-byte AAGUID
        let embedded = match ext.value {
            [0x04, 0x10, rest @ ..] if rest.len() == 16 => rest,
            _ => return Err(invalid("has a malformed AAGUID extension")),
        };
        if embedded != aaguid {
            return Err(invalid("AAGUID does not match authenticator data"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestationStatement;
    use crate::decode::{AttestationFormat, AttestedCredentialData};
    use crate::testing::{TestKey, TEST_ATTESTATION_AAGUID, TEST_ATTESTATION_CA_DER, TEST_ATTESTATION_CERT_DER};

    fn input_parts(key: &TestKey, aaguid: [u8; 16]) -> (Vec<u8>, AttestedCredentialData) {
        let credential =
            AttestedCredentialData::new(aaguid, vec![0xC0; 32], key.public_key()).unwrap();
        (vec![0xAA; 37], credential)
    }

    fn statement(alg: CoseAlgorithm, sig: Vec<u8>, x5c: Option<Vec<u8>>) -> Vec<(Value, Value)> {
        let mut stmt = vec![
            (Value::Text("alg".into()), Value::Integer(alg.id().into())),
            (Value::Text("sig".into()), Value::Bytes(sig)),
        ];
        if let Some(cert) = x5c {
            stmt.push((Value::Text("x5c".into()), Value::Array(vec![Value::Bytes(cert)])));
        }
        stmt
    }

    fn signed(auth_data: &[u8], hash: &[u8; 32]) -> Vec<u8> {
        [auth_data, hash.as_slice()].concat()
    }

    #[test]
    fn test_self_attestation() {
        let key = TestKey::es256();
        let (auth_data, credential) = input_parts(&key, [0; 16]);
        let hash = [7u8; 32];
        let input = AttestationInput {
            auth_data: &auth_data,
            rp_id_hash: &[0; 32],
            client_data_hash: &hash,
            credential: &credential,
        };

        let sig = key.sign(&signed(&auth_data, &hash));
        let stmt = statement(CoseAlgorithm::Es256, sig, None);
        let parsed = AttestationStatement::parse(&AttestationFormat::Packed, &stmt).unwrap();
        assert_eq!(
            parsed.verify(&input, Default::default()).unwrap(),
            AttestationType::SelfAttestation
        );
    }

    #[test]
    fn test_self_attestation_alg_mismatch() {
        let key = TestKey::ed25519();
        let (auth_data, credential) = input_parts(&key, [0; 16]);
        let hash = [7u8; 32];
        let input = AttestationInput {
            auth_data: &auth_data,
            rp_id_hash: &[0; 32],
            client_data_hash: &hash,
            credential: &credential,
        };

        let sig = key.sign(&signed(&auth_data, &hash));
        let stmt = statement(CoseAlgorithm::Es256, sig, None);
        let parsed = PackedStatement::parse(&stmt).unwrap();
        assert!(matches!(
            parsed.verify(&input),
            Err(FidoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_self_attestation_bad_signature() {
        let key = TestKey::es256();
        let (auth_data, credential) = input_parts(&key, [0; 16]);
        let input = AttestationInput {
            auth_data: &auth_data,
            rp_id_hash: &[0; 32],
            client_data_hash: &[7; 32],
            credential: &credential,
        };

        let sig = key.sign(b"something else");
        let parsed = PackedStatement::parse(&statement(CoseAlgorithm::Es256, sig, None)).unwrap();
        assert!(matches!(
            parsed.verify(&input),
            Err(FidoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_basic_attestation_with_certificate() {
        let credential_key = TestKey::es256();
        let attestation_key = TestKey::attestation();
        let (auth_data, credential) = input_parts(&credential_key, TEST_ATTESTATION_AAGUID);
        let hash = [3u8; 32];
        let input = AttestationInput {
            auth_data: &auth_data,
            rp_id_hash: &[0; 32],
            client_data_hash: &hash,
            credential: &credential,
        };

        let sig = attestation_key.sign(&signed(&auth_data, &hash));
        let stmt = statement(
            CoseAlgorithm::Es256,
            sig.clone(),
            Some(TEST_ATTESTATION_CERT_DER.to_vec()),
        );
        let parsed = PackedStatement::parse(&stmt).unwrap();
        assert_eq!(parsed.verify(&input).unwrap(), AttestationType::Basic);

        // Signed by the credential key instead of the certificate key.
        let wrong = credential_key.sign(&signed(&auth_data, &hash));
        let parsed = PackedStatement::parse(&statement(
            CoseAlgorithm::Es256,
            wrong,
            Some(TEST_ATTESTATION_CERT_DER.to_vec()),
        ))
        .unwrap();
        assert!(matches!(
            parsed.verify(&input),
            Err(FidoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_basic_attestation_aaguid_mismatch() {
        let credential_key = TestKey::es256();
        let attestation_key = TestKey::attestation();
        let (auth_data, credential) = input_parts(&credential_key, [0x01; 16]);
        let hash = [3u8; 32];
        let input = AttestationInput {
            auth_data: &auth_data,
            rp_id_hash: &[0; 32],
            client_data_hash: &hash,
            credential: &credential,
        };

        let sig = attestation_key.sign(&signed(&auth_data, &hash));
        let parsed = PackedStatement::parse(&statement(
            CoseAlgorithm::Es256,
            sig,
            Some(TEST_ATTESTATION_CERT_DER.to_vec()),
        ))
        .unwrap();
        assert!(matches!(
            parsed.verify(&input),
            Err(FidoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_ca_certificate_rejected() {
        let credential_key = TestKey::es256();
        let attestation_key = TestKey::attestation();
        let (auth_data, credential) = input_parts(&credential_key, TEST_ATTESTATION_AAGUID);
        let hash = [3u8; 32];
        let input = AttestationInput {
            auth_data: &auth_data,
            rp_id_hash: &[0; 32],
            client_data_hash: &hash,
            credential: &credential,
        };

        let sig = attestation_key.sign(&signed(&auth_data, &hash));
        let parsed = PackedStatement::parse(&statement(
            CoseAlgorithm::Es256,
            sig,
            Some(TEST_ATTESTATION_CA_DER.to_vec()),
        ))
        .unwrap();
        assert!(parsed.verify(&input).is_err());
    }

    #[test]
    fn test_ecdaa_unsupported() {
        let mut stmt = statement(CoseAlgorithm::Es256, vec![1], None);
        stmt.push((Value::Text("ecdaaKeyId".into()), Value::Bytes(vec![1])));
        assert!(matches!(
            PackedStatement::parse(&stmt),
            Err(FidoError::UnsupportedAttestationFormat(_))
        ));
    }

    #[test]
    fn test_missing_sig() {
        let stmt = vec![(Value::Text("alg".into()), Value::Integer((-7).into()))];
        assert!(matches!(
            PackedStatement::parse(&stmt),
            Err(FidoError::Decode(_))
        ));
    }
}
