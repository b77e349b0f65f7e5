//! Attestation object envelope: `{ "fmt": tstr, "attStmt": map, "authData": bstr }`.

use std::io::Cursor;

use ciborium::value::Value;

use super::authenticator_data::{decode_authenticator_data, AuthenticatorData};
use crate::error::DecodeError;

/// Attestation statement formats (WebAuthn §8).
///
/// Formats outside the registry are preserved verbatim in [`Other`] and
/// rejected later by the attestation verifier, never at decode time.
///
/// [`Other`]: AttestationFormat::Other
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttestationFormat {
    Packed,
    FidoU2f,
    None,
    Tpm,
    AndroidKey,
    AndroidSafetyNet,
    Apple,
    Other(String),
}

impl AttestationFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Packed => "packed",
            Self::FidoU2f => "fido-u2f",
            Self::None => "none",
            Self::Tpm => "tpm",
            Self::AndroidKey => "android-key",
            Self::AndroidSafetyNet => "android-safetynet",
            Self::Apple => "apple",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for AttestationFormat {
    fn from(name: &str) -> Self {
        match name {
            "packed" => Self::Packed,
            "fido-u2f" => Self::FidoU2f,
            "none" => Self::None,
            "tpm" => Self::Tpm,
            "android-key" => Self::AndroidKey,
            "android-safetynet" => Self::AndroidSafetyNet,
            "apple" => Self::Apple,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for AttestationFormat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for AttestationFormat {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// Decoded attestation object.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub format: AttestationFormat,
    /// `attStmt` entries, uninterpreted
    pub statement: Vec<(Value, Value)>,
    pub auth_data: AuthenticatorData,
    /// The exact `authData` bytes, which attestation signatures cover
    pub raw_auth_data: Vec<u8>,
}

/// Decode an attestation object and the authenticator data inside it.
///
/// Only structural problems fail here; whether the format is supported is
/// decided by the attestation verifier.
pub fn decode_attestation_object(bytes: &[u8]) -> Result<AttestationObject, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| DecodeError::cbor("attestation object", e))?;
    let consumed = cursor.position() as usize;
    if consumed < bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - consumed));
    }

    let Value::Map(entries) = value else {
        return Err(DecodeError::InvalidFieldType("attestation object"));
    };

    let mut fmt = None;
    let mut att_stmt = None;
    let mut auth_data = None;
    for (key, value) in entries {
        let Value::Text(name) = key else {
            continue;
        };
        let slot_taken = match name.as_str() {
            "fmt" => fmt.replace(value).is_some(),
            "attStmt" => att_stmt.replace(value).is_some(),
            "authData" => auth_data.replace(value).is_some(),
            _ => false,
        };
        if slot_taken {
            return Err(DecodeError::cbor("attestation object", format!("duplicate key {name}")));
        }
    }

    let format = match fmt.ok_or(DecodeError::MissingField("fmt"))? {
        Value::Text(name) => AttestationFormat::from(name.as_str()),
        _ => return Err(DecodeError::InvalidFieldType("fmt")),
    };
    let statement = match att_stmt.ok_or(DecodeError::MissingField("attStmt"))? {
        Value::Map(entries) => entries,
        _ => return Err(DecodeError::InvalidFieldType("attStmt")),
    };
    let raw_auth_data = match auth_data.ok_or(DecodeError::MissingField("authData"))? {
        Value::Bytes(bytes) => bytes,
        _ => return Err(DecodeError::InvalidFieldType("authData")),
    };

    let auth_data = decode_authenticator_data(&raw_auth_data)?;

    tracing::debug!(
        format = %format,
        statement_entries = statement.len(),
        auth_data_len = raw_auth_data.len(),
        "Decoded attestation object"
    );

    Ok(AttestationObject {
        format,
        statement,
        auth_data,
        raw_auth_data,
    })
}

/// Encode an attestation object. The inverse of [`decode_attestation_object`].
pub fn encode_attestation_object(
    format: &AttestationFormat,
    statement: Vec<(Value, Value)>,
    raw_auth_data: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let value = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text(format.as_str().to_string())),
        (Value::Text("attStmt".into()), Value::Map(statement)),
        (Value::Text("authData".into()), Value::Bytes(raw_auth_data.to_vec())),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&value, &mut out)
        .map_err(|e| DecodeError::cbor("attestation object encoding", e))?;
    Ok(out)
}
