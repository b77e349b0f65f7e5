//! Passgate Core - WebAuthn/FIDO2 relying party verification library
//!
//! This crate implements the server side of the two WebAuthn ceremonies:
//! registering a new credential and verifying an assertion made with it.
//!
//! # Features
//!
//! - One-time challenges from a pluggable entropy source
//! - Strict binary decoders for authenticator data, CBOR attestation
//!   objects and COSE public keys
//! - ES256, EdDSA, PS256 and RS256 signature verification
//! - `packed`, `fido-u2f` and (opt-in) `none` attestation
//! - Signature-counter anti-replay with a compare-and-set store contract
//!
//! ## Architecture
//!
//! ```text
//! RelyingParty ──► create_challenge ──► creation/request options ──► client
//!       │
//!       ├─► verify_registration: client data ─► attestation object ─► statement ─► Credential
//!       └─► verify_assertion:    client data ─► authenticator data ─► signature ─► counter
//! ```
//!
//! The verifiers are pure functions over their inputs. Challenge
//! consumption and counter persistence go through [`AccountStore`], which
//! [`CeremonyService`] drives (feature `service`, on by default).
//!
//! # Example
//!
//! ```no_run
//! use passgate_core::{ExpectedFactor, RelyingParty, RelyingPartyConfig};
//!
//! # fn example(response: passgate_core::RegistrationResponse) -> passgate_core::Result<()> {
//! let config = RelyingPartyConfig::builder("example.com").name("Example").build()?;
//! let rp = RelyingParty::new(config);
//!
//! // Issue a challenge and send `options` to the browser
//! let challenge = rp.create_challenge(Some(b"user-1".to_vec()))?;
//!
//! // Verify what navigator.credentials.create() returned
//! let credential = rp.verify_registration(
//!     &response,
//!     &challenge,
//!     "https://example.com",
//!     ExpectedFactor::Either,
//! )?;
//! println!("registered {} ({})", credential.algorithm, credential.attestation_type);
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod attestation;
pub mod challenge;
pub mod client_data;
pub mod config;
pub mod credential;
pub mod decode;
pub mod encoding;
pub mod entropy;
pub mod error;
pub mod options;
pub mod policy;
pub mod registration;
pub mod relying_party;
pub mod response;
pub mod signature;

#[cfg(feature = "service")]
pub mod service;
#[cfg(feature = "service")]
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export main types for convenience
pub use assertion::{check_counter, verify_assertion};
pub use attestation::{AttestationStatement, AttestationType};
pub use challenge::{create_challenge, Challenge};
pub use client_data::{CeremonyType, ClientData, CollectedClientData};
pub use config::{
    AttestationPolicy, ConfigError, CounterPolicy, RelyingPartyConfig, RelyingPartyConfigBuilder,
};
pub use credential::{AssertionResult, Credential};
pub use decode::{
    decode_attestation_object, decode_authenticator_data, AttestationFormat, AttestationObject,
    AttestedCredentialData, AuthenticatorData, AuthenticatorFlags, CoseKey, CosePublicKey,
};
pub use entropy::{EntropySource, EntropySourceKind, OsEntropy, SeededEntropy};
pub use error::{DecodeError, FidoError, Result};
pub use options::{
    CredentialDescriptor, PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions,
    RelyingPartyEntity, UserEntity, UserVerificationRequirement,
};
pub use policy::ExpectedFactor;
pub use registration::verify_registration;
pub use relying_party::RelyingParty;
pub use response::{
    AssertionResponse, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    RegistrationResponse,
};
pub use signature::{verify_signature, CoseAlgorithm};

#[cfg(feature = "service")]
pub use service::{AssertionStart, CeremonyService, Registered, RegistrationStart};
#[cfg(feature = "service")]
pub use store::{AccountStore, CounterUpdate};
