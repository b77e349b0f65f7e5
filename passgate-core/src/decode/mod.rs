//! Binary decoders for authenticator responses.
//!
//! All decoders take untrusted input and fail with [`DecodeError`] on any
//! structural problem. They never read past a declared length.
//!
//! [`DecodeError`]: crate::error::DecodeError

pub mod attestation_object;
pub mod authenticator_data;
pub mod cose;

pub use attestation_object::{
    decode_attestation_object, encode_attestation_object, AttestationFormat, AttestationObject,
};
pub use authenticator_data::{
    decode_authenticator_data, AttestedCredentialData, AuthenticatorData, AuthenticatorFlags,
};
pub use cose::{CoseKey, CosePublicKey};
