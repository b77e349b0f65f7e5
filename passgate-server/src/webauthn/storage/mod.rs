//! WebAuthn storage module
//!
//! Provides storage for:
//! - **Challenges**: one-time, removed on first use, expired by timestamp
//! - **Credentials**: public keys and signature counters per user
//!
//! If `DATABASE_URL` is not set, falls back to in-memory storage
//! (useful for development, but credentials will be lost on restart).

mod memory;
mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PostgresAccountStore;

use async_trait::async_trait;
use passgate_core::{
    AccountStore, Challenge, Credential, CounterUpdate, CredentialDescriptor,
    Result as FidoResult,
};

use crate::config::Config;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),
}

/// Account storage backend
pub enum WebAuthnStorage {
    /// PostgreSQL storage (production)
    Postgres(PostgresAccountStore),
    /// In-memory storage (development fallback)
    Memory(MemoryAccountStore),
}

impl WebAuthnStorage {
    /// Create storage with PostgreSQL backend
    pub async fn with_postgres(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, StorageError> {
        let store = PostgresAccountStore::connect(database_url, max_connections).await?;
        store.migrate().await?;
        Ok(Self::Postgres(store))
    }

    /// Create storage with in-memory backend (development only)
    pub fn in_memory() -> Self {
        Self::Memory(MemoryAccountStore::new())
    }

    /// Create storage from server configuration
    ///
    /// Uses PostgreSQL if `database_url` is set, otherwise falls back to in-memory.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        match &config.database_url {
            Some(url) => {
                tracing::info!("Using PostgreSQL account storage");
                Self::with_postgres(url, config.database_max_connections).await
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL not set, using in-memory storage - credentials will be lost on restart!"
                );
                Ok(Self::in_memory())
            }
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StorageError> {
        match self {
            Self::Postgres(pg) => pg.check_health().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// Remove expired challenges, returning how many were dropped
    pub async fn cleanup_expired(&self) -> Result<u64, StorageError> {
        match self {
            Self::Postgres(pg) => pg.cleanup_expired().await,
            Self::Memory(memory) => Ok(memory.cleanup_expired() as u64),
        }
    }
}

#[async_trait]
impl AccountStore for WebAuthnStorage {
    async fn lookup_credentials_by_user(
        &self,
        user_id: &[u8],
    ) -> FidoResult<Vec<CredentialDescriptor>> {
        match self {
            Self::Postgres(pg) => pg.lookup_credentials_by_user(user_id).await,
            Self::Memory(memory) => memory.lookup_credentials_by_user(user_id).await,
        }
    }

    async fn lookup_credential_by_id(&self, credential_id: &[u8]) -> FidoResult<Option<Credential>> {
        match self {
            Self::Postgres(pg) => pg.lookup_credential_by_id(credential_id).await,
            Self::Memory(memory) => memory.lookup_credential_by_id(credential_id).await,
        }
    }

    async fn atomic_update_counter(
        &self,
        credential_id: &[u8],
        expected_old: u32,
        new: u32,
    ) -> FidoResult<CounterUpdate> {
        match self {
            Self::Postgres(pg) => {
                pg.atomic_update_counter(credential_id, expected_old, new)
                    .await
            }
            Self::Memory(memory) => {
                memory
                    .atomic_update_counter(credential_id, expected_old, new)
                    .await
            }
        }
    }

    async fn store_challenge(&self, challenge: Challenge) -> FidoResult<()> {
        match self {
            Self::Postgres(pg) => pg.store_challenge(challenge).await,
            Self::Memory(memory) => memory.store_challenge(challenge).await,
        }
    }

    async fn consume_challenge(&self, value: &[u8]) -> FidoResult<Option<Challenge>> {
        match self {
            Self::Postgres(pg) => pg.consume_challenge(value).await,
            Self::Memory(memory) => memory.consume_challenge(value).await,
        }
    }

    async fn store_credential(&self, user_id: &[u8], credential: Credential) -> FidoResult<()> {
        match self {
            Self::Postgres(pg) => pg.store_credential(user_id, credential).await,
            Self::Memory(memory) => memory.store_credential(user_id, credential).await,
        }
    }
}

impl std::fmt::Debug for WebAuthnStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres(pg) => std::fmt::Debug::fmt(pg, f),
            Self::Memory(memory) => std::fmt::Debug::fmt(memory, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_storage() {
        let storage = WebAuthnStorage::in_memory();
        assert!(!storage.is_persistent());
        assert_eq!(storage.backend_name(), "memory");
        assert!(storage.check_health().await.is_ok());
        assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_from_default_config_is_memory() {
        let storage = WebAuthnStorage::from_config(&Config::default()).await.unwrap();
        assert!(!storage.is_persistent());
    }
}
