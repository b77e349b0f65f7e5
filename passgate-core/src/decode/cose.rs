//! COSE_Key decoding (RFC 9052 §7) for credential public keys.

use std::io::Cursor;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecodeError;
use crate::signature::CoseAlgorithm;

const LABEL_KTY: i128 = 1;
const LABEL_ALG: i128 = 3;
const LABEL_CRV_OR_N: i128 = -1;
const LABEL_X_OR_E: i128 = -2;
const LABEL_Y: i128 = -3;

const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;

const CRV_P256: i128 = 1;
const CRV_ED25519: i128 = 6;

/// Key material, by key type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    /// kty 2, crv 1: uncompressed P-256 point
    Ec2P256 { x: [u8; 32], y: [u8; 32] },
    /// kty 3: big-endian modulus and exponent
    Rsa { n: Vec<u8>, e: Vec<u8> },
    /// kty 1, crv 6
    Ed25519 { x: [u8; 32] },
}

impl CoseKey {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Ec2P256 { .. } => "EC2/P-256",
            Self::Rsa { .. } => "RSA",
            Self::Ed25519 { .. } => "OKP/Ed25519",
        }
    }
}

/// A credential public key together with the algorithm it is bound to.
///
/// The original CBOR encoding is retained so the key can be stored and
/// re-decoded without loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosePublicKey {
    algorithm: CoseAlgorithm,
    key: CoseKey,
    raw: Vec<u8>,
}

impl CosePublicKey {
    pub fn algorithm(&self) -> CoseAlgorithm {
        self.algorithm
    }

    pub fn key(&self) -> &CoseKey {
        &self.key
    }

    /// The CBOR encoding this key was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Build an ES256 key from affine coordinates.
    pub fn es256(x: [u8; 32], y: [u8; 32]) -> Result<Self, DecodeError> {
        let raw = encode(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(CoseAlgorithm::Es256.id().into())),
            (int(LABEL_CRV_OR_N), int(CRV_P256)),
            (int(LABEL_X_OR_E), Value::Bytes(x.to_vec())),
            (int(LABEL_Y), Value::Bytes(y.to_vec())),
        ])?;
        Ok(Self {
            algorithm: CoseAlgorithm::Es256,
            key: CoseKey::Ec2P256 { x, y },
            raw,
        })
    }

    /// Build an RSA key for RS256 or PS256.
    pub fn rsa(algorithm: CoseAlgorithm, n: Vec<u8>, e: Vec<u8>) -> Result<Self, DecodeError> {
        if !matches!(algorithm, CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256) {
            return Err(DecodeError::CoseKey(format!(
                "{algorithm} is not an RSA algorithm"
            )));
        }
        let raw = encode(vec![
            (int(LABEL_KTY), int(KTY_RSA)),
            (int(LABEL_ALG), int(algorithm.id().into())),
            (int(LABEL_CRV_OR_N), Value::Bytes(n.clone())),
            (int(LABEL_X_OR_E), Value::Bytes(e.clone())),
        ])?;
        Ok(Self {
            algorithm,
            key: CoseKey::Rsa { n, e },
            raw,
        })
    }

    pub fn ed25519(x: [u8; 32]) -> Result<Self, DecodeError> {
        let raw = encode(vec![
            (int(LABEL_KTY), int(KTY_OKP)),
            (int(LABEL_ALG), int(CoseAlgorithm::EdDsa.id().into())),
            (int(LABEL_CRV_OR_N), int(CRV_ED25519)),
            (int(LABEL_X_OR_E), Value::Bytes(x.to_vec())),
        ])?;
        Ok(Self {
            algorithm: CoseAlgorithm::EdDsa,
            key: CoseKey::Ed25519 { x },
            raw,
        })
    }

    /// Decode a complete COSE key; trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (key, consumed) = decode_cose_key_prefix(bytes)?;
        if consumed != bytes.len() {
            return Err(DecodeError::CoseKey(format!(
                "{} bytes after key",
                bytes.len() - consumed
            )));
        }
        Ok(key)
    }
}

/// Decode one COSE key from the front of `bytes`.
///
/// Returns the key and the number of bytes it occupied. Used for the
/// attested credential block, where the key is self-delimiting and is
/// followed directly by the extensions map.
pub(crate) fn decode_cose_key_prefix(bytes: &[u8]) -> Result<(CosePublicKey, usize), DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| DecodeError::cbor("credential public key", e))?;
    let consumed = cursor.position() as usize;
    if consumed == 0 || consumed > bytes.len() {
        return Err(DecodeError::CoseKey("empty key".into()));
    }

    let entries = value
        .as_map()
        .ok_or(DecodeError::InvalidFieldType("credential public key"))?;
    let fields = Labels::collect(entries)?;

    let kty = fields.integer(LABEL_KTY, "kty")?;
    let alg_id = fields.integer(LABEL_ALG, "alg")?;
    let algorithm = i64::try_from(alg_id)
        .ok()
        .and_then(|id| CoseAlgorithm::try_from(id).ok())
        .ok_or_else(|| DecodeError::CoseKey(format!("unsupported alg {alg_id}")))?;

    let key = match kty {
        KTY_EC2 => {
            let crv = fields.integer(LABEL_CRV_OR_N, "crv")?;
            if crv != CRV_P256 {
                return Err(DecodeError::CoseKey(format!("unsupported EC2 curve {crv}")));
            }
            CoseKey::Ec2P256 {
                x: fields.fixed(LABEL_X_OR_E, "x")?,
                y: fields.fixed(LABEL_Y, "y")?,
            }
        }
        KTY_RSA => {
            let n = fields.bytes(LABEL_CRV_OR_N, "n")?;
            let e = fields.bytes(LABEL_X_OR_E, "e")?;
            if n.is_empty() || e.is_empty() {
                return Err(DecodeError::CoseKey("empty RSA parameter".into()));
            }
            CoseKey::Rsa {
                n: n.to_vec(),
                e: e.to_vec(),
            }
        }
        KTY_OKP => {
            let crv = fields.integer(LABEL_CRV_OR_N, "crv")?;
            if crv != CRV_ED25519 {
                return Err(DecodeError::CoseKey(format!("unsupported OKP curve {crv}")));
            }
            CoseKey::Ed25519 {
                x: fields.fixed(LABEL_X_OR_E, "x")?,
            }
        }
        other => return Err(DecodeError::CoseKey(format!("unsupported kty {other}"))),
    };

    let consistent = matches!(
        (&key, algorithm),
        (CoseKey::Ec2P256 { .. }, CoseAlgorithm::Es256)
            | (CoseKey::Rsa { .. }, CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256)
            | (CoseKey::Ed25519 { .. }, CoseAlgorithm::EdDsa)
    );
    if !consistent {
        return Err(DecodeError::CoseKey(format!(
            "alg {algorithm} does not fit a {} key",
            key.type_name()
        )));
    }

    Ok((
        CosePublicKey {
            algorithm,
            key,
            raw: bytes[..consumed].to_vec(),
        },
        consumed,
    ))
}

/// Integer-labelled COSE parameters with duplicates rejected.
struct Labels<'a>(Vec<(i128, &'a Value)>);

impl<'a> Labels<'a> {
    fn collect(entries: &'a [(Value, Value)]) -> Result<Self, DecodeError> {
        let mut labels: Vec<(i128, &Value)> = Vec::with_capacity(entries.len());
        for (label, value) in entries {
            // Text labels are legal COSE but carry nothing we read.
            let Some(label) = label.as_integer().map(i128::from) else {
                continue;
            };
            if labels.iter().any(|(seen, _)| *seen == label) {
                return Err(DecodeError::CoseKey(format!("duplicate label {label}")));
            }
            labels.push((label, value));
        }
        Ok(Self(labels))
    }

    fn get(&self, label: i128, name: &'static str) -> Result<&'a Value, DecodeError> {
        self.0
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
            .ok_or(DecodeError::MissingField(name))
    }

    fn integer(&self, label: i128, name: &'static str) -> Result<i128, DecodeError> {
        self.get(label, name)?
            .as_integer()
            .map(i128::from)
            .ok_or(DecodeError::InvalidFieldType(name))
    }

    fn bytes(&self, label: i128, name: &'static str) -> Result<&'a [u8], DecodeError> {
        self.get(label, name)?
            .as_bytes()
            .map(Vec::as_slice)
            .ok_or(DecodeError::InvalidFieldType(name))
    }

    fn fixed(&self, label: i128, name: &'static str) -> Result<[u8; 32], DecodeError> {
        let bytes = self.bytes(label, name)?;
        bytes.try_into().map_err(|_| {
            DecodeError::CoseKey(format!("{name} must be 32 bytes, got {}", bytes.len()))
        })
    }
}

fn int(value: i128) -> Value {
    // Every label and identifier used here fits an i64.
    Value::Integer((value as i64).into())
}

fn encode(entries: Vec<(Value, Value)>) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(&Value::Map(entries), &mut out)
        .map_err(|e| DecodeError::cbor("COSE key encoding", e))?;
    Ok(out)
}

impl Serialize for CosePublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(&self.raw))
    }
}

impl<'de> Deserialize<'de> for CosePublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Self::from_bytes(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cbor(entries: Vec<(Value, Value)>) -> Vec<u8> {
        encode(entries).unwrap()
    }

    #[test]
    fn test_es256_roundtrip() {
        let key = CosePublicKey::es256([7u8; 32], [9u8; 32]).unwrap();
        let decoded = CosePublicKey::from_bytes(key.as_bytes()).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.algorithm(), CoseAlgorithm::Es256);
    }

    #[test]
    fn test_prefix_reports_consumed_length() {
        let key = CosePublicKey::ed25519([3u8; 32]).unwrap();
        let mut bytes = key.as_bytes().to_vec();
        let key_len = bytes.len();
        bytes.extend_from_slice(&[0xa0]); // an empty map after the key

        let (decoded, consumed) = decode_cose_key_prefix(&bytes).unwrap();
        assert_eq!(consumed, key_len);
        assert_eq!(decoded, key);

        assert!(CosePublicKey::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_missing_alg_rejected() {
        let bytes = cbor(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_CRV_OR_N), int(CRV_P256)),
            (int(LABEL_X_OR_E), Value::Bytes(vec![0; 32])),
            (int(LABEL_Y), Value::Bytes(vec![0; 32])),
        ]);
        assert_eq!(
            CosePublicKey::from_bytes(&bytes),
            Err(DecodeError::MissingField("alg"))
        );
    }

    #[test]
    fn test_alg_inconsistent_with_kty_rejected() {
        let bytes = cbor(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(-257)),
            (int(LABEL_CRV_OR_N), int(CRV_P256)),
            (int(LABEL_X_OR_E), Value::Bytes(vec![0; 32])),
            (int(LABEL_Y), Value::Bytes(vec![0; 32])),
        ]);
        assert!(matches!(
            CosePublicKey::from_bytes(&bytes),
            Err(DecodeError::CoseKey(_))
        ));
    }

    #[test]
    fn test_short_coordinate_rejected() {
        let bytes = cbor(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(-7)),
            (int(LABEL_CRV_OR_N), int(CRV_P256)),
            (int(LABEL_X_OR_E), Value::Bytes(vec![0; 31])),
            (int(LABEL_Y), Value::Bytes(vec![0; 32])),
        ]);
        assert!(matches!(
            CosePublicKey::from_bytes(&bytes),
            Err(DecodeError::CoseKey(_))
        ));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let bytes = cbor(vec![
            (int(LABEL_KTY), int(KTY_OKP)),
            (int(LABEL_ALG), int(-8)),
            (int(LABEL_CRV_OR_N), int(CRV_ED25519)),
            (int(LABEL_X_OR_E), Value::Bytes(vec![0; 32])),
            (int(LABEL_X_OR_E), Value::Bytes(vec![1; 32])),
        ]);
        assert!(matches!(
            CosePublicKey::from_bytes(&bytes),
            Err(DecodeError::CoseKey(_))
        ));
    }

    #[test]
    fn test_unknown_kty_and_curve_rejected() {
        let bytes = cbor(vec![(int(LABEL_KTY), int(4)), (int(LABEL_ALG), int(-7))]);
        assert!(CosePublicKey::from_bytes(&bytes).is_err());

        let bytes = cbor(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(-7)),
            (int(LABEL_CRV_OR_N), int(2)),
            (int(LABEL_X_OR_E), Value::Bytes(vec![0; 48])),
            (int(LABEL_Y), Value::Bytes(vec![0; 48])),
        ]);
        assert!(CosePublicKey::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_not_a_map_rejected() {
        let bytes = [0x01];
        assert_eq!(
            CosePublicKey::from_bytes(&bytes),
            Err(DecodeError::InvalidFieldType("credential public key"))
        );
        assert!(matches!(
            CosePublicKey::from_bytes(&[]),
            Err(DecodeError::Cbor { .. })
        ));
    }

    #[test]
    fn test_serde_as_base64url() {
        let key = CosePublicKey::rsa(CoseAlgorithm::Rs256, vec![0xc1; 256], vec![1, 0, 1]).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert!(!json.contains('='));
        let back: CosePublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_rsa_constructor_rejects_non_rsa_alg() {
        assert!(CosePublicKey::rsa(CoseAlgorithm::Es256, vec![1], vec![1]).is_err());
    }
}
