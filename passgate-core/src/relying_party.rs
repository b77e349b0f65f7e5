//! Relying party facade: configuration plus an entropy source.

use std::sync::Arc;

use crate::assertion::verify_assertion;
use crate::challenge::{create_challenge, Challenge};
use crate::config::RelyingPartyConfig;
use crate::credential::{AssertionResult, Credential};
use crate::entropy::{EntropySource, OsEntropy};
use crate::error::Result;
use crate::options::{
    creation_options, request_options, CredentialDescriptor, PublicKeyCredentialCreationOptions,
    PublicKeyCredentialRequestOptions, UserEntity,
};
use crate::policy::ExpectedFactor;
use crate::registration::verify_registration;
use crate::response::{AssertionResponse, RegistrationResponse};

/// Everything needed to run both ceremonies for one relying party.
///
/// Cheap to clone; the entropy source is shared.
#[derive(Clone)]
pub struct RelyingParty {
    config: RelyingPartyConfig,
    entropy: Arc<dyn EntropySource>,
}

impl RelyingParty {
    /// Relying party drawing challenges from the OS CSPRNG.
    pub fn new(config: RelyingPartyConfig) -> Self {
        Self::with_entropy(config, Arc::new(OsEntropy))
    }

    pub fn with_entropy(config: RelyingPartyConfig, entropy: Arc<dyn EntropySource>) -> Self {
        tracing::info!(
            rp_id = %config.id,
            entropy = %entropy.source_id(),
            attestation_policy = ?config.attestation_policy,
            counter_policy = ?config.counter_policy,
            "Relying party configured"
        );
        Self { config, entropy }
    }

    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    pub fn create_challenge(&self, user_id: Option<Vec<u8>>) -> Result<Challenge> {
        create_challenge(&self.config, self.entropy.as_ref(), user_id)
    }

    pub fn creation_options(
        &self,
        challenge: &Challenge,
        user: UserEntity,
        exclude_credentials: Vec<CredentialDescriptor>,
        factor: ExpectedFactor,
    ) -> PublicKeyCredentialCreationOptions {
        creation_options(
            challenge,
            &self.config,
            user,
            exclude_credentials,
            factor.user_verification(),
        )
    }

    pub fn request_options(
        &self,
        challenge: &Challenge,
        allow_credentials: Vec<CredentialDescriptor>,
        factor: ExpectedFactor,
    ) -> PublicKeyCredentialRequestOptions {
        request_options(
            challenge,
            &self.config,
            allow_credentials,
            factor.user_verification(),
        )
    }

    pub fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected_challenge: &Challenge,
        expected_origin: &str,
        expected_factor: ExpectedFactor,
    ) -> Result<Credential> {
        verify_registration(
            &self.config,
            response,
            expected_challenge,
            expected_origin,
            expected_factor,
        )
    }

    pub fn verify_assertion(
        &self,
        response: &AssertionResponse,
        expected_challenge: &Challenge,
        stored: &Credential,
        expected_origin: &str,
        expected_factor: ExpectedFactor,
    ) -> Result<AssertionResult> {
        verify_assertion(
            &self.config,
            response,
            expected_challenge,
            stored,
            expected_origin,
            expected_factor,
        )
    }
}

impl std::fmt::Debug for RelyingParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelyingParty")
            .field("config", &self.config)
            .field("entropy", &self.entropy.source_id())
            .finish()
    }
}
