//! Account store contract.
//!
//! The verifiers are pure; persistence and its atomicity live behind this
//! trait. Two operations carry the concurrency guarantees:
//!
//! - `consume_challenge` is remove-and-return, so a challenge verifies at
//!   most one response even under concurrent submissions
//! - `atomic_update_counter` is a compare-and-set on the stored counter,
//!   so two assertions racing on one credential cannot both advance it

use async_trait::async_trait;

use crate::challenge::Challenge;
use crate::credential::Credential;
use crate::error::Result;
use crate::options::CredentialDescriptor;

/// Outcome of a counter compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    /// Stored counter matched `expected_old` and now holds the new value
    Updated,
    /// Stored counter no longer matched; nothing written
    Conflict,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Credentials registered for a user, for allow/exclude lists.
    async fn lookup_credentials_by_user(&self, user_id: &[u8]) -> Result<Vec<CredentialDescriptor>>;

    async fn lookup_credential_by_id(&self, credential_id: &[u8]) -> Result<Option<Credential>>;

    /// Set the counter to `new` only if it still equals `expected_old`.
    async fn atomic_update_counter(
        &self,
        credential_id: &[u8],
        expected_old: u32,
        new: u32,
    ) -> Result<CounterUpdate>;

    async fn store_challenge(&self, challenge: Challenge) -> Result<()>;

    /// Remove and return the challenge with this value. Expired challenges
    /// are removed and reported as `None`.
    async fn consume_challenge(&self, value: &[u8]) -> Result<Option<Challenge>>;

    async fn store_credential(&self, user_id: &[u8], credential: Credential) -> Result<()>;
}
