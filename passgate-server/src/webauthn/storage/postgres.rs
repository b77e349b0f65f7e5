//! PostgreSQL account store
//!
//! The `sign_count` column is the source of truth for the counter; the
//! compare-and-set is a single `UPDATE … WHERE sign_count = $old`, and
//! challenge consumption is a single `DELETE … RETURNING`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passgate_core::{
    AccountStore, Challenge, Credential, CounterUpdate, CredentialDescriptor, ExpectedFactor,
    FidoError, Result as FidoResult,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::StorageError;

fn store_error(e: sqlx::Error) -> FidoError {
    FidoError::Store(e.to_string())
}

/// PostgreSQL-backed account storage
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Connect with a bounded pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!(max_connections, "Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Check database connection health
    pub async fn check_health(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Delete expired challenges
    pub async fn cleanup_expired(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM webauthn_challenges WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// Database row for credentials
#[derive(sqlx::FromRow)]
struct CredentialRow {
    credential: serde_json::Value,
    sign_count: i64,
}

impl CredentialRow {
    fn into_credential(self) -> FidoResult<Credential> {
        let mut credential: Credential = serde_json::from_value(self.credential)
            .map_err(|e| FidoError::Store(format!("stored credential is corrupt: {e}")))?;
        credential.sign_count = u32::try_from(self.sign_count)
            .map_err(|_| FidoError::Store(format!("sign count {} out of range", self.sign_count)))?;
        Ok(credential)
    }
}

/// Database row for challenges
#[derive(sqlx::FromRow)]
struct ChallengeRow {
    challenge: Vec<u8>,
    user_id: Option<Vec<u8>>,
    factor: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ChallengeRow {
    fn into_challenge(self) -> FidoResult<Challenge> {
        let factor = self
            .factor
            .parse::<ExpectedFactor>()
            .map_err(|e| FidoError::Store(format!("stored challenge is corrupt: {e}")))?;
        Ok(Challenge {
            value: self.challenge,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            user_id: self.user_id,
            factor,
        })
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn lookup_credentials_by_user(
        &self,
        user_id: &[u8],
    ) -> FidoResult<Vec<CredentialDescriptor>> {
        let ids: Vec<Vec<u8>> = sqlx::query_scalar(
            r#"
            SELECT credential_id FROM webauthn_credentials
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(ids.into_iter().map(CredentialDescriptor::public_key).collect())
    }

    async fn lookup_credential_by_id(&self, credential_id: &[u8]) -> FidoResult<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT credential, sign_count
            FROM webauthn_credentials
            WHERE credential_id = $1
            "#,
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(CredentialRow::into_credential).transpose()
    }

    async fn atomic_update_counter(
        &self,
        credential_id: &[u8],
        expected_old: u32,
        new: u32,
    ) -> FidoResult<CounterUpdate> {
        let result = sqlx::query(
            r#"
            UPDATE webauthn_credentials
            SET sign_count = $3, last_used_at = NOW()
            WHERE credential_id = $1 AND sign_count = $2
            "#,
        )
        .bind(credential_id)
        .bind(i64::from(expected_old))
        .bind(i64::from(new))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(if result.rows_affected() == 1 {
            CounterUpdate::Updated
        } else {
            CounterUpdate::Conflict
        })
    }

    async fn store_challenge(&self, challenge: Challenge) -> FidoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webauthn_challenges (challenge, user_id, factor, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&challenge.value)
        .bind(&challenge.user_id)
        .bind(challenge.factor.to_string())
        .bind(challenge.issued_at)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn consume_challenge(&self, value: &[u8]) -> FidoResult<Option<Challenge>> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            r#"
            DELETE FROM webauthn_challenges
            WHERE challenge = $1
            RETURNING challenge, user_id, factor, issued_at, expires_at
            "#,
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row
            .map(ChallengeRow::into_challenge)
            .transpose()?
            .filter(|challenge| !challenge.is_expired(Utc::now())))
    }

    async fn store_credential(&self, user_id: &[u8], credential: Credential) -> FidoResult<()> {
        let json = serde_json::to_value(&credential)
            .map_err(|e| FidoError::Store(format!("credential serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO webauthn_credentials (credential_id, user_id, credential, sign_count)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&credential.id)
        .bind(user_id)
        .bind(&json)
        .bind(i64::from(credential.sign_count))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::info!("Credential stored in database");
        Ok(())
    }
}

impl std::fmt::Debug for PostgresAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAccountStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}
