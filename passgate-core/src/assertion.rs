//! Assertion verification with signature-counter anti-replay.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::challenge::Challenge;
use crate::client_data::{verify_origin_host, CeremonyType, CollectedClientData};
use crate::config::{CounterPolicy, RelyingPartyConfig};
use crate::credential::{AssertionResult, Credential};
use crate::decode::decode_authenticator_data;
use crate::error::{FidoError, Result};
use crate::policy::ExpectedFactor;
use crate::response::AssertionResponse;
use crate::signature::verify_signature;

/// Verify an assertion against a stored credential.
///
/// On success the returned counter must be persisted with a compare-and-set
/// against `stored.sign_count`; see `AccountStore::atomic_update_counter`.
#[instrument(level = "debug", skip_all, fields(rp_id = %config.id, factor = %expected_factor))]
pub fn verify_assertion(
    config: &RelyingPartyConfig,
    response: &AssertionResponse,
    expected_challenge: &Challenge,
    stored: &Credential,
    expected_origin: &str,
    expected_factor: ExpectedFactor,
) -> Result<AssertionResult> {
    response.validate_shape()?;
    if expected_challenge.is_expired(Utc::now()) {
        return Err(FidoError::ChallengeExpiredOrConsumed);
    }
    if response.raw_id != stored.id {
        return Err(FidoError::CredentialNotFound);
    }

    let client_data = CollectedClientData::parse(&response.response.client_data_json)?;
    client_data.verify(CeremonyType::Get, &expected_challenge.value, expected_origin)?;

    let auth_data = decode_authenticator_data(&response.response.authenticator_data)?;
    let rp_id_hash: [u8; 32] = Sha256::digest(config.id.as_bytes()).into();
    if auth_data.rp_id_hash != rp_id_hash {
        return Err(FidoError::RelyingPartyHashMismatch);
    }
    verify_origin_host(&client_data.data.origin, &config.id, config.allow_subdomains)?;

    if auth_data.flags.has_attested_credential() {
        return Err(FidoError::FlagPolicyViolation(
            "attested credential data (AT) is not allowed in an assertion".into(),
        ));
    }
    expected_factor.check(auth_data.flags)?;

    let mut signed_data = Vec::with_capacity(response.response.authenticator_data.len() + 32);
    signed_data.extend_from_slice(&response.response.authenticator_data);
    signed_data.extend_from_slice(&client_data.hash);

    // Algorithm comes from the stored credential, never from the response.
    let valid = verify_signature(
        &response.response.signature,
        stored.algorithm,
        &stored.public_key,
        &signed_data,
    )?;
    if !valid {
        return Err(FidoError::SignatureVerificationFailed);
    }
    debug!("Assertion signature verified");

    let new_sign_count = check_counter(stored.sign_count, auth_data.sign_count, config.counter_policy)?;

    Ok(AssertionResult {
        credential_id: stored.id.clone(),
        new_sign_count,
        user_verified: auth_data.flags.user_verified(),
        user_handle: response.response.user_handle.clone(),
    })
}

/// Anti-replay rule: a non-zero stored counter must strictly increase.
pub fn check_counter(stored: u32, received: u32, policy: CounterPolicy) -> Result<u32> {
    let tolerated = stored == 0 && policy == CounterPolicy::TolerateZero;
    if !tolerated && received <= stored {
        warn!(
            stored,
            received, "Signature counter did not increase; possible cloned authenticator"
        );
        return Err(FidoError::CounterReplay { stored, received });
    }
    Ok(received)
}
