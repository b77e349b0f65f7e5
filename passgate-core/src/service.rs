//! Ceremony orchestration over an [`AccountStore`].
//!
//! ## Architecture
//!
//! ```text
//! start  -> RelyingParty::create_challenge -> store_challenge -> options
//! finish -> consume_challenge -> verify_* -> store_credential / atomic_update_counter
//! ```
//!
//! The challenge is looked up by the value echoed in client data and
//! consumed before verification, so a response is checked at most once even
//! if it fails.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::challenge::Challenge;
use crate::client_data::CollectedClientData;
use crate::credential::{AssertionResult, Credential};
use crate::encoding::b64url_encode;
use crate::error::{FidoError, Result};
use crate::options::{
    PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions, UserEntity,
};
use crate::policy::ExpectedFactor;
use crate::relying_party::RelyingParty;
use crate::response::{AssertionResponse, RegistrationResponse};
use crate::store::{AccountStore, CounterUpdate};

/// A registration ceremony in progress.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStart {
    pub challenge: Challenge,
    pub options: PublicKeyCredentialCreationOptions,
}

/// An authentication ceremony in progress.
#[derive(Debug, Clone, Serialize)]
pub struct AssertionStart {
    pub challenge: Challenge,
    pub options: PublicKeyCredentialRequestOptions,
}

/// A verified registration and the user it belongs to.
#[derive(Debug, Clone)]
pub struct Registered {
    pub user_id: Vec<u8>,
    pub credential: Credential,
}

pub struct CeremonyService<S> {
    relying_party: RelyingParty,
    store: S,
}

impl<S: AccountStore> CeremonyService<S> {
    pub fn new(relying_party: RelyingParty, store: S) -> Self {
        Self {
            relying_party,
            store,
        }
    }

    pub fn relying_party(&self) -> &RelyingParty {
        &self.relying_party
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(level = "debug", skip_all, fields(user = %user.name))]
    pub async fn create_registration_challenge(
        &self,
        user: UserEntity,
        factor: ExpectedFactor,
    ) -> Result<RegistrationStart> {
        let existing = self.store.lookup_credentials_by_user(&user.id).await?;
        let mut challenge = self.relying_party.create_challenge(Some(user.id.clone()))?;
        challenge.factor = factor;
        self.store.store_challenge(challenge.clone()).await?;

        let options = self
            .relying_party
            .creation_options(&challenge, user, existing, factor);
        Ok(RegistrationStart { challenge, options })
    }

    #[instrument(level = "debug", skip_all, fields(credential_id = %response.id))]
    pub async fn finish_registration(
        &self,
        response: &RegistrationResponse,
        origin: &str,
    ) -> Result<Registered> {
        response.validate_shape()?;
        let challenge = self
            .consume(&response.response.client_data_json)
            .await?;
        let user_id = challenge
            .user_id
            .clone()
            .ok_or_else(|| FidoError::InputShape("registration challenge has no user".into()))?;

        let credential =
            self.relying_party
                .verify_registration(response, &challenge, origin, challenge.factor)?;

        if self
            .store
            .lookup_credential_by_id(&credential.id)
            .await?
            .is_some()
        {
            warn!("Credential ID is already registered");
            return Err(FidoError::InputShape("credential is already registered".into()));
        }
        self.store
            .store_credential(&user_id, credential.clone())
            .await?;

        info!(
            user_id = %b64url_encode(&user_id),
            format = %credential.attestation_format,
            attestation_type = %credential.attestation_type,
            "Credential registered"
        );
        Ok(Registered {
            user_id,
            credential,
        })
    }

    #[instrument(level = "debug", skip_all)]
    pub async fn create_assertion_challenge(
        &self,
        user_id: &[u8],
        factor: ExpectedFactor,
    ) -> Result<AssertionStart> {
        let allow = self.store.lookup_credentials_by_user(user_id).await?;
        if allow.is_empty() {
            return Err(FidoError::CredentialNotFound);
        }

        let mut challenge = self.relying_party.create_challenge(Some(user_id.to_vec()))?;
        challenge.factor = factor;
        self.store.store_challenge(challenge.clone()).await?;

        let options = self
            .relying_party
            .request_options(&challenge, allow, factor);
        Ok(AssertionStart { challenge, options })
    }

    #[instrument(level = "debug", skip_all, fields(credential_id = %response.id))]
    pub async fn finish_assertion(
        &self,
        response: &AssertionResponse,
        origin: &str,
    ) -> Result<AssertionResult> {
        response.validate_shape()?;
        let challenge = self
            .consume(&response.response.client_data_json)
            .await?;

        let stored = self
            .store
            .lookup_credential_by_id(&response.raw_id)
            .await?
            .ok_or(FidoError::CredentialNotFound)?;

        if let Some(user_id) = &challenge.user_id {
            let owned = self.store.lookup_credentials_by_user(user_id).await?;
            if !owned.iter().any(|d| d.id == stored.id) {
                return Err(FidoError::CredentialNotFound);
            }
        }

        let result = self
            .relying_party
            .verify_assertion(response, &challenge, &stored, origin, challenge.factor)?;

        match self
            .store
            .atomic_update_counter(&stored.id, stored.sign_count, result.new_sign_count)
            .await?
        {
            CounterUpdate::Updated => {}
            CounterUpdate::Conflict => {
                warn!(
                    expected = stored.sign_count,
                    new = result.new_sign_count,
                    "Concurrent assertion advanced the counter first"
                );
                return Err(FidoError::CounterConflict);
            }
        }

        info!(sign_count = result.new_sign_count, "Assertion verified");
        Ok(result)
    }

    async fn consume(&self, client_data_json: &[u8]) -> Result<Challenge> {
        let client_data = CollectedClientData::parse(client_data_json)?;
        let value = client_data.challenge()?;
        self.store
            .consume_challenge(&value)
            .await?
            .ok_or(FidoError::ChallengeExpiredOrConsumed)
    }
}
