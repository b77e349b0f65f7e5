//! base64url helpers for wire-format byte fields.
//!
//! Output is always unpadded. Input is accepted with or without padding
//! since browsers and libraries disagree.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn b64url_encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64URL.encode(bytes)
}

pub fn b64url_decode(encoded: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64URL.decode(encoded)
}

/// `#[serde(with = "base64url_bytes")]` for `Vec<u8>` fields.
pub mod base64url_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::b64url_encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::b64url_decode(s).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "base64url_bytes_opt")]` for `Option<Vec<u8>>` fields.
pub mod base64url_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&super::b64url_encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::b64url_decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_unpadded_url_safe() {
        assert_eq!(b64url_encode([0xfb, 0xff]), "-_8");
    }

    #[test]
    fn test_decode_accepts_padding() {
        assert_eq!(b64url_decode("-_8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(b64url_decode("-_8=").unwrap(), vec![0xfb, 0xff]);
        assert!(b64url_decode("+/8").is_err());
    }
}
