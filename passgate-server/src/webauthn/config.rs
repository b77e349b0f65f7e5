//! WebAuthn Relying Party configuration
//!
//! Maps environment variables onto the core [`RelyingPartyConfig`].

use std::time::Duration;

use passgate_core::{AttestationPolicy, ConfigError, CounterPolicy, RelyingPartyConfig};
use url::Url;

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid origin URL: {0}")]
    InvalidOrigin(String),
    #[error("Origin host {host:?} is not covered by RP ID {rp_id:?}")]
    OriginOutsideRpId { host: String, rp_id: String },
    #[error("Relying party configuration error: {0}")]
    RelyingParty(#[from] ConfigError),
}

/// Relying party identity and policy as deployed.
#[derive(Debug, Clone)]
pub struct RelyingPartySettings {
    /// Relying Party ID (typically the domain name)
    pub rp_id: String,
    /// The single origin ceremonies are accepted from
    pub origin: String,
    pub rp_name: String,
    pub rp_icon: Option<String>,
    pub challenge_size: usize,
    pub timeout_secs: u64,
    pub allow_subdomains: bool,
    /// Accept `"none"` attestation (default: true for tests, false from env)
    pub allow_none_attestation: bool,
    /// Enforce counter growth even when the stored counter is zero
    pub strict_counter: bool,
}

impl Default for RelyingPartySettings {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            origin: "http://localhost:3001".to_string(),
            rp_name: "Passgate".to_string(),
            rp_icon: None,
            challenge_size: passgate_core::config::DEFAULT_CHALLENGE_SIZE,
            timeout_secs: 60,
            allow_subdomains: false,
            allow_none_attestation: true,
            strict_counter: false,
        }
    }
}

impl RelyingPartySettings {
    /// Create settings from environment variables
    ///
    /// Environment variables:
    /// - `WEBAUTHN_RP_ID` - Relying Party ID (default: "localhost")
    /// - `WEBAUTHN_RP_ORIGIN` - RP origin URL (default: "http://localhost:3001")
    /// - `WEBAUTHN_RP_NAME` - RP display name (default: "Passgate")
    /// - `WEBAUTHN_RP_ICON` - optional icon URL
    /// - `WEBAUTHN_CHALLENGE_SIZE` - challenge bytes (default: 64)
    /// - `WEBAUTHN_TIMEOUT_SECS` - challenge lifetime (default: 60)
    /// - `WEBAUTHN_ALLOW_SUBDOMAINS` - accept subdomain origins (default: false)
    /// - `WEBAUTHN_ALLOW_NONE_ATTESTATION` - accept "none" (default: false)
    /// - `WEBAUTHN_STRICT_COUNTER` - no zero-counter tolerance (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| {
            std::env::var(name)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        Self {
            rp_id: std::env::var("WEBAUTHN_RP_ID").unwrap_or(defaults.rp_id),
            origin: std::env::var("WEBAUTHN_RP_ORIGIN").unwrap_or(defaults.origin),
            rp_name: std::env::var("WEBAUTHN_RP_NAME").unwrap_or(defaults.rp_name),
            rp_icon: std::env::var("WEBAUTHN_RP_ICON").ok(),
            challenge_size: std::env::var("WEBAUTHN_CHALLENGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.challenge_size),
            timeout_secs: std::env::var("WEBAUTHN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            allow_subdomains: flag("WEBAUTHN_ALLOW_SUBDOMAINS", false),
            allow_none_attestation: flag("WEBAUTHN_ALLOW_NONE_ATTESTATION", false),
            strict_counter: flag("WEBAUTHN_STRICT_COUNTER", false),
        }
    }

    /// Validate the origin against the RP ID and build the core config.
    pub fn relying_party_config(&self) -> Result<RelyingPartyConfig, SettingsError> {
        let origin =
            Url::parse(&self.origin).map_err(|e| SettingsError::InvalidOrigin(e.to_string()))?;
        let host = origin
            .host_str()
            .ok_or_else(|| SettingsError::InvalidOrigin(self.origin.clone()))?
            .to_ascii_lowercase();
        let rp_id = self.rp_id.to_ascii_lowercase();
        if host != rp_id && !(self.allow_subdomains && host.ends_with(&format!(".{rp_id}"))) {
            return Err(SettingsError::OriginOutsideRpId { host, rp_id });
        }

        let mut builder = RelyingPartyConfig::builder(&self.rp_id)
            .name(&self.rp_name)
            .challenge_size(self.challenge_size)
            .timeout(Duration::from_secs(self.timeout_secs))
            .allow_subdomains(self.allow_subdomains)
            .attestation_policy(if self.allow_none_attestation {
                AttestationPolicy::AllowNone
            } else {
                AttestationPolicy::RequireStatement
            })
            .counter_policy(if self.strict_counter {
                CounterPolicy::Strict
            } else {
                CounterPolicy::TolerateZero
            });
        if let Some(icon) = &self.rp_icon {
            builder = builder.icon(icon);
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_build() {
        let config = RelyingPartySettings::default()
            .relying_party_config()
            .unwrap();
        assert_eq!(config.id, "localhost");
        assert_eq!(config.name, "Passgate");
        assert_eq!(config.attestation_policy, AttestationPolicy::AllowNone);
        assert_eq!(config.counter_policy, CounterPolicy::TolerateZero);
    }

    #[test]
    fn test_origin_must_match_rp_id() {
        let settings = RelyingPartySettings {
            rp_id: "example.com".into(),
            origin: "https://login.example.com".into(),
            ..Default::default()
        };
        assert!(matches!(
            settings.relying_party_config(),
            Err(SettingsError::OriginOutsideRpId { .. })
        ));

        let settings = RelyingPartySettings {
            allow_subdomains: true,
            ..settings
        };
        assert!(settings.relying_party_config().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let settings = RelyingPartySettings {
            origin: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            settings.relying_party_config(),
            Err(SettingsError::InvalidOrigin(_))
        ));

        let settings = RelyingPartySettings {
            challenge_size: 8,
            ..Default::default()
        };
        assert!(matches!(
            settings.relying_party_config(),
            Err(SettingsError::RelyingParty(ConfigError::ChallengeTooShort { .. }))
        ));
    }

    #[test]
    fn test_strict_policies() {
        let config = RelyingPartySettings {
            allow_none_attestation: false,
            strict_counter: true,
            ..Default::default()
        }
        .relying_party_config()
        .unwrap();
        assert_eq!(config.attestation_policy, AttestationPolicy::RequireStatement);
        assert_eq!(config.counter_policy, CounterPolicy::Strict);
    }
}
