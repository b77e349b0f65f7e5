//! Collected client data (`clientDataJSON`) parsing and binding checks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::encoding::b64url_decode;
use crate::error::{FidoError, Result};

/// Which ceremony a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyType {
    Create,
    Get,
}

impl CeremonyType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBinding {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The JSON members the verifiers read. Unknown members are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    #[serde(rename = "type")]
    pub ceremony_type: String,
    /// base64url challenge as echoed by the client
    pub challenge: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<TokenBinding>,
}

/// Parsed client data plus the SHA-256 of the exact bytes received.
#[derive(Debug, Clone)]
pub struct CollectedClientData {
    pub data: ClientData,
    pub hash: [u8; 32],
}

impl CollectedClientData {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let data: ClientData = serde_json::from_slice(raw)
            .map_err(|e| FidoError::InputShape(format!("clientDataJSON: {e}")))?;
        Ok(Self {
            data,
            hash: Sha256::digest(raw).into(),
        })
    }

    /// The challenge bytes the client claims to be answering.
    pub fn challenge(&self) -> Result<Vec<u8>> {
        b64url_decode(&self.data.challenge).map_err(|_| FidoError::ChallengeMismatch)
    }

    /// Check ceremony type, challenge and origin, in that order.
    pub fn verify(
        &self,
        ceremony: CeremonyType,
        expected_challenge: &[u8],
        expected_origin: &str,
    ) -> Result<()> {
        if self.data.ceremony_type != ceremony.as_str() {
            return Err(FidoError::ClientDataType {
                expected: ceremony.as_str(),
                actual: self.data.ceremony_type.clone(),
            });
        }

        if self.challenge()? != expected_challenge {
            return Err(FidoError::ChallengeMismatch);
        }

        verify_origin(&self.data.origin, expected_origin)?;

        if self.data.cross_origin == Some(true) {
            tracing::debug!(origin = %self.data.origin, "Response was produced in a cross-origin frame");
        }
        Ok(())
    }
}

/// The client's origin must equal the expected origin byte for byte.
///
/// Only the expected side is normalised, to the ASCII serialisation of its
/// origin.
pub fn verify_origin(actual: &str, expected: &str) -> Result<()> {
    let expected_url = Url::parse(expected)
        .map_err(|e| FidoError::InputShape(format!("expected origin {expected:?}: {e}")))?;
    let expected_origin = expected_url.origin();
    if !expected_origin.is_tuple() {
        return Err(FidoError::InputShape(format!(
            "expected origin {expected:?} is opaque"
        )));
    }

    if actual != expected_origin.ascii_serialization() {
        return Err(FidoError::OriginMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// The origin's host must be the RP ID, or a subdomain of it when allowed.
pub fn verify_origin_host(origin: &str, rp_id: &str, allow_subdomains: bool) -> Result<()> {
    let mismatch = || FidoError::OriginMismatch {
        expected: rp_id.to_string(),
        actual: origin.to_string(),
    };
    let url = Url::parse(origin).map_err(|_| mismatch())?;
    let host = url.host_str().ok_or_else(mismatch)?.to_ascii_lowercase();

    if host == rp_id {
        return Ok(());
    }
    if allow_subdomains
        && host.len() > rp_id.len()
        && host.ends_with(rp_id)
        && host.as_bytes()[host.len() - rp_id.len() - 1] == b'.'
    {
        return Ok(());
    }
    Err(mismatch())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::b64url_encode;

    fn client_json(ty: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
        serde_json::json!({
            "type": ty,
            "challenge": b64url_encode(challenge),
            "origin": origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_parse_and_hash() {
        let raw = client_json("webauthn.create", b"0123456789abcdef", "https://example.com");
        let parsed = CollectedClientData::parse(&raw).unwrap();
        assert_eq!(parsed.data.ceremony_type, "webauthn.create");
        assert_eq!(parsed.data.cross_origin, Some(false));
        let expected: [u8; 32] = Sha256::digest(&raw).into();
        assert_eq!(parsed.hash, expected);
    }

    #[test]
    fn test_malformed_json_is_input_shape() {
        assert!(matches!(
            CollectedClientData::parse(b"{not json"),
            Err(FidoError::InputShape(_))
        ));
        assert!(matches!(
            CollectedClientData::parse(br#"{"type":"webauthn.get"}"#),
            Err(FidoError::InputShape(_))
        ));
    }

    #[test]
    fn test_verify_gates_in_order() {
        let challenge = b"0123456789abcdef";
        let raw = client_json("webauthn.get", challenge, "https://example.com");
        let parsed = CollectedClientData::parse(&raw).unwrap();

        parsed
            .verify(CeremonyType::Get, challenge, "https://example.com")
            .unwrap();
        assert!(matches!(
            parsed.verify(CeremonyType::Create, challenge, "https://example.com"),
            Err(FidoError::ClientDataType { expected: "webauthn.create", .. })
        ));
        assert!(matches!(
            parsed.verify(CeremonyType::Get, b"fedcba9876543210", "https://example.com"),
            Err(FidoError::ChallengeMismatch)
        ));
        assert!(matches!(
            parsed.verify(CeremonyType::Get, challenge, "https://other.example"),
            Err(FidoError::OriginMismatch { .. })
        ));
    }

    #[test]
    fn test_origin_scheme_and_port_matter() {
        assert!(verify_origin("https://example.com", "https://example.com").is_ok());
        assert!(matches!(
            verify_origin("http://example.com", "https://example.com"),
            Err(FidoError::OriginMismatch { .. })
        ));
        assert!(matches!(
            verify_origin("https://example.com:8443", "https://example.com"),
            Err(FidoError::OriginMismatch { .. })
        ));
        assert!(verify_origin("not a url", "https://example.com").is_err());
    }

    #[test]
    fn test_origin_compared_exactly() {
        for actual in [
            "https://example.com:443",
            "https://example.com/",
            "https://example.com/evil/path?x=1",
            "https://user:pw@example.com",
            "HTTPS://EXAMPLE.COM",
            "https://example.com ",
        ] {
            assert!(
                matches!(
                    verify_origin(actual, "https://example.com"),
                    Err(FidoError::OriginMismatch { .. })
                ),
                "{actual} accepted"
            );
        }
    }

    #[test]
    fn test_expected_origin_normalised() {
        assert!(verify_origin("https://example.com", "https://example.com/").is_ok());
        assert!(verify_origin("https://example.com", "https://example.com:443").is_ok());
        assert!(verify_origin("http://localhost:3001", "http://localhost:3001").is_ok());
        assert!(matches!(
            verify_origin("https://example.com", "not a url"),
            Err(FidoError::InputShape(_))
        ));
    }

    #[test]
    fn test_origin_host_against_rp_id() {
        assert!(verify_origin_host("https://example.com", "example.com", false).is_ok());
        assert!(verify_origin_host("https://login.example.com", "example.com", false).is_err());
        assert!(verify_origin_host("https://login.example.com", "example.com", true).is_ok());
        assert!(verify_origin_host("https://badexample.com", "example.com", true).is_err());
        assert!(verify_origin_host("https://example.com.evil.net", "example.com", true).is_err());
    }
}
