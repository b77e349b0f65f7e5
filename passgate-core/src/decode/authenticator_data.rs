//! Authenticator data (WebAuthn §6.1).
//!
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, BE)
//!   [ aaguid (16) | credIdLen (2, BE) | credId | COSE key ]   when AT
//!   [ extensions: one CBOR map ]                                when ED
//! ```

use std::io::Cursor;

use ciborium::value::Value;

use super::cose::{decode_cose_key_prefix, CosePublicKey};
use crate::error::DecodeError;

/// Length of the fixed header.
pub const HEADER_LEN: usize = 37;

const AAGUID_LEN: usize = 16;

/// The flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKED_UP: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    pub const fn user_present(self) -> bool {
        self.contains(Self::USER_PRESENT)
    }

    pub const fn user_verified(self) -> bool {
        self.contains(Self::USER_VERIFIED)
    }

    pub const fn backup_eligible(self) -> bool {
        self.contains(Self::BACKUP_ELIGIBLE)
    }

    pub const fn backed_up(self) -> bool {
        self.contains(Self::BACKED_UP)
    }

    pub const fn has_attested_credential(self) -> bool {
        self.contains(Self::ATTESTED_CREDENTIAL_DATA)
    }

    pub const fn has_extensions(self) -> bool {
        self.contains(Self::EXTENSION_DATA)
    }
}

impl std::fmt::Display for AuthenticatorFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Self::USER_PRESENT, "UP"),
            (Self::USER_VERIFIED, "UV"),
            (Self::BACKUP_ELIGIBLE, "BE"),
            (Self::BACKED_UP, "BS"),
            (Self::ATTESTED_CREDENTIAL_DATA, "AT"),
            (Self::EXTENSION_DATA, "ED"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(mask, _)| self.contains(*mask))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "0x{:02x} [{}]", self.0, set.join("|"))
    }
}

/// The credential block present at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    aaguid: [u8; 16],
    credential_id: Vec<u8>,
    public_key: CosePublicKey,
}

impl AttestedCredentialData {
    /// Fails when the credential ID does not fit the 16-bit length prefix.
    pub fn new(
        aaguid: [u8; 16],
        credential_id: Vec<u8>,
        public_key: CosePublicKey,
    ) -> Result<Self, DecodeError> {
        if credential_id.len() > u16::MAX as usize {
            return Err(DecodeError::InvalidFieldType("credentialId"));
        }
        Ok(Self {
            aaguid,
            credential_id,
            public_key,
        })
    }

    pub fn aaguid(&self) -> &[u8; 16] {
        &self.aaguid
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    pub fn public_key(&self) -> &CosePublicKey {
        &self.public_key
    }
}

/// Decoded authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorFlags,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredentialData>,
    /// Raw CBOR of the extensions map
    pub extensions: Option<Vec<u8>>,
}

impl AuthenticatorData {
    /// Encode back to the wire layout. Flags are written as stored; callers
    /// building data by hand are responsible for keeping AT/ED consistent.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(self.flags.bits());
        out.extend_from_slice(&self.sign_count.to_be_bytes());

        if let Some(attested) = &self.attested_credential {
            out.extend_from_slice(&attested.aaguid);
            // Bounded by AttestedCredentialData::new.
            out.extend_from_slice(&(attested.credential_id.len() as u16).to_be_bytes());
            out.extend_from_slice(&attested.credential_id);
            out.extend_from_slice(attested.public_key.as_bytes());
        }
        if let Some(extensions) = &self.extensions {
            out.extend_from_slice(extensions);
        }
        out
    }
}

/// Bounds-checked reader over the input slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        let available = self.bytes.len() - self.pos;
        if len > available {
            return Err(DecodeError::Truncated {
                context,
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

/// Decode authenticator data.
///
/// Never reads past declared lengths. Fails when the AT or ED flag
/// disagrees with what follows the header, and when bytes remain after the
/// last declared section.
pub fn decode_authenticator_data(bytes: &[u8]) -> Result<AuthenticatorData, DecodeError> {
    let mut reader = Reader { bytes, pos: 0 };

    let header = reader.take(HEADER_LEN, "authenticator data header")?;
    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&header[..32]);
    let flags = AuthenticatorFlags::from_bits(header[32]);
    let sign_count = u32::from_be_bytes([header[33], header[34], header[35], header[36]]);

    let attested_credential = if flags.has_attested_credential() {
        if reader.rest().is_empty() {
            return Err(DecodeError::MissingAttestedCredential);
        }
        let aaguid_bytes = reader.take(AAGUID_LEN, "aaguid")?;
        let mut aaguid = [0u8; 16];
        aaguid.copy_from_slice(aaguid_bytes);

        let len_bytes = reader.take(2, "credential id length")?;
        let id_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let credential_id = reader.take(id_len, "credential id")?.to_vec();

        if reader.rest().is_empty() {
            return Err(DecodeError::Truncated {
                context: "credential public key",
                needed: 1,
                available: 0,
            });
        }
        let (public_key, consumed) = decode_cose_key_prefix(reader.rest())?;
        reader.take(consumed, "credential public key")?;

        Some(AttestedCredentialData {
            aaguid,
            credential_id,
            public_key,
        })
    } else {
        None
    };

    let extensions = if flags.has_extensions() {
        let rest = reader.rest();
        if rest.is_empty() {
            return Err(DecodeError::MissingExtensions);
        }
        let mut cursor = Cursor::new(rest);
        let value: Value = ciborium::de::from_reader(&mut cursor)
            .map_err(|e| DecodeError::cbor("extensions", e))?;
        if !value.is_map() {
            return Err(DecodeError::InvalidFieldType("extensions"));
        }
        let consumed = cursor.position() as usize;
        Some(reader.take(consumed, "extensions")?.to_vec())
    } else {
        None
    };

    let trailing = reader.rest().len();
    if trailing > 0 {
        return Err(DecodeError::TrailingBytes(trailing));
    }

    Ok(AuthenticatorData {
        rp_id_hash,
        flags,
        sign_count,
        attested_credential,
        extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(flags: u8, count: u32) -> Vec<u8> {
        let mut out = vec![0xAB; 32];
        out.push(flags);
        out.extend_from_slice(&count.to_be_bytes());
        out
    }

    fn attested_sample() -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash: [0x11; 32],
            flags: AuthenticatorFlags::from_bits(
                AuthenticatorFlags::USER_PRESENT | AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA,
            ),
            sign_count: 0,
            attested_credential: Some(
                AttestedCredentialData::new(
                    [0x22; 16],
                    vec![1, 2, 3, 4],
                    CosePublicKey::es256([5; 32], [6; 32]).unwrap(),
                )
                .unwrap(),
            ),
            extensions: None,
        }
    }

    #[test]
    fn test_header_only() {
        let bytes = header(0x05, 0x0102_0304);
        let data = decode_authenticator_data(&bytes).unwrap();
        assert_eq!(data.rp_id_hash, [0xAB; 32]);
        assert!(data.flags.user_present());
        assert!(data.flags.user_verified());
        assert_eq!(data.sign_count, 0x0102_0304);
        assert!(data.attested_credential.is_none());
        assert_eq!(data.to_bytes(), bytes);
    }

    #[test]
    fn test_attested_roundtrip() {
        let data = attested_sample();
        let decoded = decode_authenticator_data(&data.to_bytes()).unwrap();
        assert_eq!(decoded, data);
        let attested = decoded.attested_credential.unwrap();
        assert_eq!(attested.credential_id(), &[1, 2, 3, 4]);
        assert_eq!(attested.aaguid(), &[0x22; 16]);
    }

    #[test]
    fn test_attested_with_extensions() {
        let mut data = attested_sample();
        data.flags = AuthenticatorFlags::from_bits(data.flags.bits() | AuthenticatorFlags::EXTENSION_DATA);
        // {"credProtect": 2}
        let mut ext = Vec::new();
        ciborium::ser::into_writer(
            &Value::Map(vec![(Value::Text("credProtect".into()), Value::Integer(2.into()))]),
            &mut ext,
        )
        .unwrap();
        data.extensions = Some(ext);

        let decoded = decode_authenticator_data(&data.to_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = header(0x01, 1);
        assert!(matches!(
            decode_authenticator_data(&bytes[..36]),
            Err(DecodeError::Truncated { needed: 37, available: 36, .. })
        ));
        assert!(decode_authenticator_data(&[]).is_err());
    }

    #[test]
    fn test_at_flag_without_data() {
        let bytes = header(0x41, 0);
        assert_eq!(
            decode_authenticator_data(&bytes),
            Err(DecodeError::MissingAttestedCredential)
        );
    }

    #[test]
    fn test_data_without_at_flag() {
        let mut bytes = attested_sample().to_bytes();
        bytes[32] = AuthenticatorFlags::USER_PRESENT;
        assert!(matches!(
            decode_authenticator_data(&bytes),
            Err(DecodeError::TrailingBytes(_))
        ));
    }

    #[test]
    fn test_ed_flag_without_extensions() {
        let bytes = header(0x81, 0);
        assert_eq!(
            decode_authenticator_data(&bytes),
            Err(DecodeError::MissingExtensions)
        );
    }

    #[test]
    fn test_credential_id_length_overrun() {
        let mut bytes = header(0x41, 0);
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&0xFFFFu16.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            decode_authenticator_data(&bytes),
            Err(DecodeError::Truncated { context: "credential id", .. })
        ));
    }

    #[test]
    fn test_every_strict_prefix_fails() {
        let bytes = attested_sample().to_bytes();
        for len in 0..bytes.len() {
            assert!(
                decode_authenticator_data(&bytes[..len]).is_err(),
                "prefix of length {len} decoded"
            );
        }
    }

    #[test]
    fn test_trailing_byte_rejected() {
        let mut bytes = header(0x01, 0);
        bytes.push(0);
        assert_eq!(
            decode_authenticator_data(&bytes),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_flags_display() {
        let flags = AuthenticatorFlags::from_bits(0x45);
        assert_eq!(flags.to_string(), "0x45 [UP|UV|AT]");
    }
}
