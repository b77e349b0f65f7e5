//! Relying party configuration.
//!
//! A [`RelyingPartyConfig`] is immutable once built. Policy choices that
//! WebAuthn leaves to the relying party (accepting `"none"` attestation,
//! tolerating authenticators that never report a counter) are explicit
//! fields rather than hardcoded behaviour.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signature::CoseAlgorithm;

/// Default challenge length in bytes.
pub const DEFAULT_CHALLENGE_SIZE: usize = 64;

/// Smallest challenge length the builder accepts.
pub const MIN_CHALLENGE_SIZE: usize = 16;

/// Default response timeout (1 minute).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("relying party ID must not be empty")]
    EmptyId,
    #[error("relying party ID must be a bare domain, got {0:?}")]
    InvalidId(String),
    #[error("challenge size {size} is below the minimum of {min} bytes")]
    ChallengeTooShort { size: usize, min: usize },
    #[error("timeout must be non-zero")]
    ZeroTimeout,
    #[error("at least one signature algorithm must be advertised")]
    NoAlgorithms,
}

/// Whether the `"none"` attestation format is accepted at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationPolicy {
    /// Reject `"none"`; the authenticator must prove its key with a statement.
    #[default]
    RequireStatement,
    /// Accept `"none"` (no provenance proof at all).
    AllowNone,
}

/// How to treat authenticators whose signature counter is always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterPolicy {
    /// A stored counter of zero skips the anti-replay check. Counter-less
    /// authenticators work, but get no clone detection.
    #[default]
    TolerateZero,
    /// A stored zero counter still requires the response counter to grow.
    Strict,
}

/// Relying party identity and verification policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    /// RP ID (a registrable domain such as `example.com`)
    pub id: String,
    /// Human-readable RP name
    pub name: String,
    /// Optional icon URL sent with creation options
    pub icon: Option<String>,
    /// Challenge length in bytes
    pub challenge_size: usize,
    /// How long a challenge stays valid
    pub timeout: Duration,
    /// Accept origins on subdomains of the RP ID
    pub allow_subdomains: bool,
    pub attestation_policy: AttestationPolicy,
    pub counter_policy: CounterPolicy,
    /// Algorithms advertised in creation options, in preference order
    pub algorithms: Vec<CoseAlgorithm>,
}

impl RelyingPartyConfig {
    /// Start building a configuration for the given RP ID.
    pub fn builder(id: impl Into<String>) -> RelyingPartyConfigBuilder {
        RelyingPartyConfigBuilder::new(id)
    }

    /// Timeout in milliseconds, as sent to the client.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Builder for [`RelyingPartyConfig`]
#[derive(Debug, Clone)]
pub struct RelyingPartyConfigBuilder {
    id: String,
    name: Option<String>,
    icon: Option<String>,
    challenge_size: usize,
    timeout: Duration,
    allow_subdomains: bool,
    attestation_policy: AttestationPolicy,
    counter_policy: CounterPolicy,
    algorithms: Vec<CoseAlgorithm>,
}

impl RelyingPartyConfigBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            icon: None,
            challenge_size: DEFAULT_CHALLENGE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            allow_subdomains: false,
            attestation_policy: AttestationPolicy::default(),
            counter_policy: CounterPolicy::default(),
            algorithms: vec![
                CoseAlgorithm::Es256,
                CoseAlgorithm::EdDsa,
                CoseAlgorithm::Ps256,
                CoseAlgorithm::Rs256,
            ],
        }
    }

    /// Display name (defaults to the RP ID)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn challenge_size(mut self, size: usize) -> Self {
        self.challenge_size = size;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn allow_subdomains(mut self, allow: bool) -> Self {
        self.allow_subdomains = allow;
        self
    }

    pub fn attestation_policy(mut self, policy: AttestationPolicy) -> Self {
        self.attestation_policy = policy;
        self
    }

    pub fn counter_policy(mut self, policy: CounterPolicy) -> Self {
        self.counter_policy = policy;
        self
    }

    pub fn algorithms(mut self, algorithms: Vec<CoseAlgorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<RelyingPartyConfig, ConfigError> {
        let id = self.id.trim().to_ascii_lowercase();
        if id.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if id.contains("://") || id.contains('/') || id.contains(':') {
            return Err(ConfigError::InvalidId(self.id));
        }
        if self.challenge_size < MIN_CHALLENGE_SIZE {
            return Err(ConfigError::ChallengeTooShort {
                size: self.challenge_size,
                min: MIN_CHALLENGE_SIZE,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }

        Ok(RelyingPartyConfig {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            icon: self.icon,
            challenge_size: self.challenge_size,
            timeout: self.timeout,
            allow_subdomains: self.allow_subdomains,
            attestation_policy: self.attestation_policy,
            counter_policy: self.counter_policy,
            algorithms: self.algorithms,
        })
    }
}
