//! Registration (attestation) verification.
//!
//! Gates run in a fixed order and the first failure ends the ceremony:
//!
//! 1. response shape and challenge freshness
//! 2. client data: type `webauthn.create`, challenge, origin
//! 3. attestation object decode, RP ID hash, origin host vs RP ID
//! 4. flags: AT plus the expected factor
//! 5. attestation statement for the format
//! 6. credential ID binding, then the credential is emitted

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::attestation::{AttestationInput, AttestationStatement};
use crate::challenge::Challenge;
use crate::client_data::{verify_origin_host, CeremonyType, CollectedClientData};
use crate::config::RelyingPartyConfig;
use crate::credential::Credential;
use crate::decode::decode_attestation_object;
use crate::error::{FidoError, Result};
use crate::options::PUBLIC_KEY_TYPE;
use crate::policy::ExpectedFactor;
use crate::response::RegistrationResponse;

/// Verify a registration response and return the new credential.
#[instrument(level = "debug", skip_all, fields(rp_id = %config.id, factor = %expected_factor))]
pub fn verify_registration(
    config: &RelyingPartyConfig,
    response: &RegistrationResponse,
    expected_challenge: &Challenge,
    expected_origin: &str,
    expected_factor: ExpectedFactor,
) -> Result<Credential> {
    response.validate_shape()?;
    if expected_challenge.is_expired(Utc::now()) {
        return Err(FidoError::ChallengeExpiredOrConsumed);
    }

    let client_data = CollectedClientData::parse(&response.response.client_data_json)?;
    client_data.verify(CeremonyType::Create, &expected_challenge.value, expected_origin)?;
    debug!("Client data bound to challenge and origin");

    let object = decode_attestation_object(&response.response.attestation_object)?;
    let auth_data = &object.auth_data;

    let rp_id_hash: [u8; 32] = Sha256::digest(config.id.as_bytes()).into();
    if auth_data.rp_id_hash != rp_id_hash {
        return Err(FidoError::RelyingPartyHashMismatch);
    }
    verify_origin_host(&client_data.data.origin, &config.id, config.allow_subdomains)?;

    let attested = auth_data.attested_credential.as_ref().ok_or_else(|| {
        FidoError::FlagPolicyViolation("attested credential data (AT) is required".into())
    })?;
    expected_factor.check(auth_data.flags)?;
    debug!(flags = %auth_data.flags, "Flag policy satisfied");

    let statement = AttestationStatement::parse(&object.format, &object.statement)?;
    let attestation_type = statement
        .verify(
            &AttestationInput {
                auth_data: &object.raw_auth_data,
                rp_id_hash: &auth_data.rp_id_hash,
                client_data_hash: &client_data.hash,
                credential: attested,
            },
            config.attestation_policy,
        )
        .inspect_err(|e| warn!(format = %object.format, error = %e, "Attestation rejected"))?;

    if attested.credential_id() != response.raw_id.as_slice() {
        return Err(FidoError::InputShape(
            "credential id in authenticator data does not match rawId".into(),
        ));
    }

    let public_key = attested.public_key().clone();
    let algorithm = public_key.algorithm();
    if !config.algorithms.contains(&algorithm) {
        return Err(FidoError::InvalidPublicKey(format!(
            "{algorithm} was not offered to the client"
        )));
    }

    debug!(
        format = %object.format,
        attestation_type = %attestation_type,
        algorithm = algorithm.name(),
        sign_count = auth_data.sign_count,
        "Registration verified"
    );

    Ok(Credential {
        id: attested.credential_id().to_vec(),
        credential_type: PUBLIC_KEY_TYPE.to_string(),
        public_key,
        algorithm,
        sign_count: auth_data.sign_count,
        aaguid: Uuid::from_bytes(*attested.aaguid()),
        attestation_format: object.format.clone(),
        attestation_type,
        user_verified: auth_data.flags.user_verified(),
        backup_eligible: auth_data.flags.backup_eligible(),
    })
}
