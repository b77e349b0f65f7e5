//! In-memory account store
//!
//! Credentials live for the lifetime of the process. DashMap shards give
//! per-entry locking, which is what the counter compare-and-set and the
//! challenge remove-and-return rely on.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use passgate_core::{
    AccountStore, Challenge, Credential, CounterUpdate, CredentialDescriptor, FidoError,
    Result as FidoResult,
};

/// Credential entry with its owner
#[derive(Debug, Clone)]
struct CredentialEntry {
    user_id: Vec<u8>,
    credential: Credential,
}

/// Thread-safe in-memory storage for credentials and challenges
#[derive(Default)]
pub struct MemoryAccountStore {
    /// credential id -> entry
    credentials: DashMap<Vec<u8>, CredentialEntry>,
    /// challenge value -> challenge
    challenges: DashMap<Vec<u8>, Challenge>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired challenges (called periodically)
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.challenges.len();
        self.challenges.retain(|_, challenge| !challenge.is_expired(now));
        before.saturating_sub(self.challenges.len())
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn lookup_credentials_by_user(
        &self,
        user_id: &[u8],
    ) -> FidoResult<Vec<CredentialDescriptor>> {
        let mut descriptors: Vec<_> = self
            .credentials
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.credential.descriptor())
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptors)
    }

    async fn lookup_credential_by_id(&self, credential_id: &[u8]) -> FidoResult<Option<Credential>> {
        Ok(self
            .credentials
            .get(credential_id)
            .map(|entry| entry.credential.clone()))
    }

    async fn atomic_update_counter(
        &self,
        credential_id: &[u8],
        expected_old: u32,
        new: u32,
    ) -> FidoResult<CounterUpdate> {
        // get_mut holds the shard write lock for the compare and the set.
        match self.credentials.get_mut(credential_id) {
            Some(mut entry) if entry.credential.sign_count == expected_old => {
                entry.credential.sign_count = new;
                Ok(CounterUpdate::Updated)
            }
            _ => Ok(CounterUpdate::Conflict),
        }
    }

    async fn store_challenge(&self, challenge: Challenge) -> FidoResult<()> {
        self.challenges.insert(challenge.value.clone(), challenge);
        Ok(())
    }

    async fn consume_challenge(&self, value: &[u8]) -> FidoResult<Option<Challenge>> {
        let Some((_, challenge)) = self.challenges.remove(value) else {
            return Ok(None);
        };
        if challenge.is_expired(Utc::now()) {
            tracing::debug!("Consumed challenge had expired");
            return Ok(None);
        }
        Ok(Some(challenge))
    }

    async fn store_credential(&self, user_id: &[u8], credential: Credential) -> FidoResult<()> {
        match self.credentials.entry(credential.id.clone()) {
            Entry::Occupied(_) => Err(FidoError::Store(
                "credential ID is already registered".into(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(CredentialEntry {
                    user_id: user_id.to_vec(),
                    credential,
                });
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for MemoryAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAccountStore")
            .field("credentials", &self.credentials.len())
            .field("challenges", &self.challenges.len())
            .finish()
    }
}
