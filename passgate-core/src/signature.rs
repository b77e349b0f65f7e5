//! Signature verification across the supported COSE algorithms.
//!
//! The algorithm always comes from the caller: the stored credential at
//! assertion time, or the attested credential key at registration. A key
//! whose type does not match the requested algorithm is rejected as invalid
//! key material instead of being coerced, so an attacker cannot pick the
//! algorithm a signature is checked under.

use p256::ecdsa::signature::Verifier as _;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::decode::cose::{CoseKey, CosePublicKey};
use crate::error::{FidoError, Result};

/// COSE algorithm identifiers (IANA "COSE Algorithms" registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CoseAlgorithm {
    /// ECDSA P-256 with SHA-256
    Es256,
    /// Ed25519
    EdDsa,
    /// RSASSA-PSS with SHA-256
    Ps256,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
}

impl CoseAlgorithm {
    /// The registry value.
    pub const fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Ps256 => -37,
            Self::Rs256 => -257,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::EdDsa => "EdDSA",
            Self::Ps256 => "PS256",
            Self::Rs256 => "RS256",
        }
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = UnknownAlgorithm;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            -7 => Ok(Self::Es256),
            -8 => Ok(Self::EdDsa),
            -37 => Ok(Self::Ps256),
            -257 => Ok(Self::Rs256),
            other => Err(UnknownAlgorithm(other)),
        }
    }
}

impl From<CoseAlgorithm> for i64 {
    fn from(alg: CoseAlgorithm) -> Self {
        alg.id()
    }
}

impl std::fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

/// A COSE algorithm value this crate does not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported COSE algorithm {0}")]
pub struct UnknownAlgorithm(pub i64);

/// A parsed key ready for verification.
enum VerifyingKey {
    P256(p256::ecdsa::VerifyingKey),
    Rsa(rsa::RsaPublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl VerifyingKey {
    fn from_cose(key: &CosePublicKey) -> Result<Self> {
        match key.key() {
            CoseKey::Ec2P256 { x, y } => {
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(x);
                sec1.extend_from_slice(y);
                p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                    .map(Self::P256)
                    .map_err(|_| FidoError::InvalidPublicKey("P-256 point not on curve".into()))
            }
            CoseKey::Rsa { n, e } => rsa::RsaPublicKey::new(
                rsa::BigUint::from_bytes_be(n),
                rsa::BigUint::from_bytes_be(e),
            )
            .map(Self::Rsa)
            .map_err(|e| FidoError::InvalidPublicKey(format!("RSA key rejected: {e}"))),
            CoseKey::Ed25519 { x } => ed25519_dalek::VerifyingKey::from_bytes(x)
                .map(Self::Ed25519)
                .map_err(|_| FidoError::InvalidPublicKey("invalid Ed25519 point".into())),
        }
    }

    fn from_spki(algorithm: CoseAlgorithm, der: &[u8]) -> Result<Self> {
        match algorithm {
            CoseAlgorithm::Es256 => {
                use p256::pkcs8::DecodePublicKey;
                p256::ecdsa::VerifyingKey::from_public_key_der(der)
                    .map(Self::P256)
                    .map_err(|e| {
                        FidoError::InvalidPublicKey(format!("certificate key is not P-256: {e}"))
                    })
            }
            CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256 => {
                use rsa::pkcs8::DecodePublicKey;
                rsa::RsaPublicKey::from_public_key_der(der)
                    .map(Self::Rsa)
                    .map_err(|e| {
                        FidoError::InvalidPublicKey(format!("certificate key is not RSA: {e}"))
                    })
            }
            CoseAlgorithm::EdDsa => Err(FidoError::InvalidPublicKey(
                "EdDSA certificate keys are not supported".into(),
            )),
        }
    }

    fn supports(&self, algorithm: CoseAlgorithm) -> bool {
        matches!(
            (self, algorithm),
            (Self::P256(_), CoseAlgorithm::Es256)
                | (Self::Rsa(_), CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256)
                | (Self::Ed25519(_), CoseAlgorithm::EdDsa)
        )
    }

    fn verify(&self, algorithm: CoseAlgorithm, signature: &[u8], signed_data: &[u8]) -> bool {
        match (self, algorithm) {
            (Self::P256(key), CoseAlgorithm::Es256) => {
                match p256::ecdsa::DerSignature::from_bytes(signature) {
                    Ok(sig) => key.verify(signed_data, &sig).is_ok(),
                    Err(_) => false,
                }
            }
            (Self::Rsa(key), CoseAlgorithm::Rs256) => {
                let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                match rsa::pkcs1v15::Signature::try_from(signature) {
                    Ok(sig) => verifier.verify(signed_data, &sig).is_ok(),
                    Err(_) => false,
                }
            }
            (Self::Rsa(key), CoseAlgorithm::Ps256) => {
                let verifier = rsa::pss::VerifyingKey::<Sha256>::new(key.clone());
                match rsa::pss::Signature::try_from(signature) {
                    Ok(sig) => verifier.verify(signed_data, &sig).is_ok(),
                    Err(_) => false,
                }
            }
            (Self::Ed25519(key), CoseAlgorithm::EdDsa) => {
                match ed25519_dalek::Signature::from_slice(signature) {
                    Ok(sig) => key.verify_strict(signed_data, &sig).is_ok(),
                    Err(_) => false,
                }
            }
            _ => false,
        }
    }
}

/// Verify `signature` over `signed_data` with a COSE public key.
///
/// Returns `Ok(false)` for a signature that does not verify, including
/// malformed signature bytes. Returns an error only when the key itself is
/// unusable: the wrong type for `algorithm`, a declared algorithm different
/// from `algorithm`, or invalid key material.
pub fn verify_signature(
    signature: &[u8],
    algorithm: CoseAlgorithm,
    public_key: &CosePublicKey,
    signed_data: &[u8],
) -> Result<bool> {
    if public_key.algorithm() != algorithm {
        return Err(FidoError::InvalidPublicKey(format!(
            "key is bound to {}, not {}",
            public_key.algorithm(),
            algorithm
        )));
    }

    let key = VerifyingKey::from_cose(public_key)?;
    if !key.supports(algorithm) {
        return Err(FidoError::InvalidPublicKey(format!(
            "key type cannot verify {algorithm}"
        )));
    }

    let valid = key.verify(algorithm, signature, signed_data);
    tracing::trace!(algorithm = algorithm.name(), valid, "Signature checked");
    Ok(valid)
}

/// Verify `signature` with a DER SubjectPublicKeyInfo (an attestation
/// certificate's key).
pub fn verify_signature_spki(
    signature: &[u8],
    algorithm: CoseAlgorithm,
    spki_der: &[u8],
    signed_data: &[u8],
) -> Result<bool> {
    let key = VerifyingKey::from_spki(algorithm, spki_der)?;
    Ok(key.verify(algorithm, signature, signed_data))
}
