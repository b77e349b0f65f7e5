//! One-time challenges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RelyingPartyConfig;
use crate::encoding::{b64url_encode, base64url_bytes, base64url_bytes_opt};
use crate::entropy::EntropySource;
use crate::error::{FidoError, Result};
use crate::policy::ExpectedFactor;

/// A random challenge bound to a single ceremony.
///
/// Stores hand it out once through `consume_challenge`; after that, or
/// after `expires_at`, it is dead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(with = "base64url_bytes")]
    pub value: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// User handle the ceremony is for, when known
    #[serde(default, with = "base64url_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Vec<u8>>,
    /// Factor the response must prove, fixed when the ceremony starts
    #[serde(default)]
    pub factor: ExpectedFactor,
}

impl Challenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The challenge as it appears in client data.
    pub fn encoded(&self) -> String {
        b64url_encode(&self.value)
    }
}

/// Draw a fresh challenge of `config.challenge_size` bytes.
pub fn create_challenge(
    config: &RelyingPartyConfig,
    entropy: &dyn EntropySource,
    user_id: Option<Vec<u8>>,
) -> Result<Challenge> {
    create_challenge_at(config, entropy, user_id, Utc::now())
}

/// [`create_challenge`] with an explicit issue time.
pub fn create_challenge_at(
    config: &RelyingPartyConfig,
    entropy: &dyn EntropySource,
    user_id: Option<Vec<u8>>,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    let mut value = vec![0u8; config.challenge_size];
    entropy.fill(&mut value)?;

    let timeout = chrono::Duration::from_std(config.timeout)
        .map_err(|_| FidoError::InputShape("challenge timeout out of range".into()))?;
    let expires_at = now
        .checked_add_signed(timeout)
        .ok_or_else(|| FidoError::InputShape("challenge timeout out of range".into()))?;

    tracing::debug!(
        size = value.len(),
        source = %entropy.source_id(),
        expires_at = %expires_at,
        "Issued challenge"
    );

    Ok(Challenge {
        value,
        issued_at: now,
        expires_at,
        user_id,
        factor: ExpectedFactor::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{EntropySourceKind, OsEntropy, SeededEntropy};
    use std::time::Duration;

    struct FailingEntropy;

    impl EntropySource for FailingEntropy {
        fn fill(&self, _buf: &mut [u8]) -> Result<()> {
            Err(FidoError::Entropy("device unavailable".into()))
        }

        fn source_id(&self) -> EntropySourceKind {
            EntropySourceKind::Os
        }
    }

    fn config(size: usize) -> RelyingPartyConfig {
        RelyingPartyConfig::builder("example.com")
            .challenge_size(size)
            .build()
            .unwrap()
    }

    #[test]
    fn test_challenge_length_matches_config() {
        for size in [16, 32, 64, 128] {
            let challenge = create_challenge(&config(size), &OsEntropy, None).unwrap();
            assert_eq!(challenge.value.len(), size);
        }
    }

    #[test]
    fn test_successive_challenges_differ() {
        let config = config(64);
        let a = create_challenge(&config, &OsEntropy, None).unwrap();
        let b = create_challenge(&config, &OsEntropy, None).unwrap();
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_distribution_not_degenerate() {
        let config = config(64);
        let mut seen = [false; 256];
        for _ in 0..64 {
            let challenge = create_challenge(&config, &OsEntropy, None).unwrap();
            for byte in challenge.value {
                seen[byte as usize] = true;
            }
        }
        // 4096 uniform bytes cover nearly every value.
        let distinct = seen.iter().filter(|s| **s).count();
        assert!(distinct > 200, "only {distinct} distinct byte values");
    }

    #[test]
    fn test_expiry_window() {
        let config = RelyingPartyConfig::builder("example.com")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        let now = Utc::now();
        let challenge = create_challenge_at(&config, &SeededEntropy::default(), None, now).unwrap();

        assert_eq!(challenge.expires_at - challenge.issued_at, chrono::Duration::seconds(30));
        assert!(!challenge.is_expired(now));
        assert!(!challenge.is_expired(now + chrono::Duration::seconds(29)));
        assert!(challenge.is_expired(now + chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_entropy_failure_propagates() {
        let result = create_challenge(&config(32), &FailingEntropy, None);
        assert!(matches!(result, Err(FidoError::Entropy(_))));
    }

    #[test]
    fn test_serde_roundtrip_keeps_user_and_factor() {
        let mut challenge =
            create_challenge(&config(16), &SeededEntropy::default(), Some(vec![1, 2, 3])).unwrap();
        assert_eq!(challenge.factor, ExpectedFactor::Either);
        challenge.factor = ExpectedFactor::First;

        let json = serde_json::to_string(&challenge).unwrap();
        let back: Challenge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, challenge);
        assert_eq!(back.factor, ExpectedFactor::First);
    }
}
