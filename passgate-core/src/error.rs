use thiserror::Error;

/// Structural failures while decoding authenticator data, attestation
/// objects, COSE keys or attestation statements.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated {context}: needed {needed} bytes, {available} available")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error("invalid CBOR in {context}: {reason}")]
    Cbor {
        context: &'static str,
        reason: String,
    },

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field type: {0}")]
    InvalidFieldType(&'static str),

    #[error("attested credential data flag set but no credential present")]
    MissingAttestedCredential,

    #[error("extension data flag set but no extensions present")]
    MissingExtensions,

    #[error("invalid COSE key: {0}")]
    CoseKey(String),

    #[error("invalid attestation statement: {0}")]
    AttestationStatement(String),
}

impl DecodeError {
    pub(crate) fn cbor(context: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Cbor {
            context,
            reason: reason.to_string(),
        }
    }
}

/// Every way a ceremony can fail.
///
/// Each verification gate has its own variant so callers (and intrusion
/// detection layered above them) can tell failures apart. In particular
/// [`FidoError::CounterReplay`] signals a possibly cloned authenticator and
/// must not be handled like an ordinary signature failure.
#[derive(Error, Debug)]
pub enum FidoError {
    #[error("malformed request: {0}")]
    InputShape(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("client data type mismatch: expected {expected}, got {actual}")]
    ClientDataType {
        expected: &'static str,
        actual: String,
    },

    #[error("challenge mismatch")]
    ChallengeMismatch,

    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },

    #[error("relying party ID hash mismatch")]
    RelyingPartyHashMismatch,

    #[error("flag policy violation: {0}")]
    FlagPolicyViolation(String),

    #[error("unsupported attestation format: {0}")]
    UnsupportedAttestationFormat(String),

    #[error("\"none\" attestation is not accepted by this relying party")]
    NoneAttestationNotAllowed,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("signature counter did not increase (stored={stored}, received={received}); possible cloned authenticator")]
    CounterReplay { stored: u32, received: u32 },

    #[error("signature counter was updated concurrently for this credential")]
    CounterConflict,

    #[error("challenge expired or already consumed")]
    ChallengeExpiredOrConsumed,

    #[error("credential not found")]
    CredentialNotFound,

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("account store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl FidoError {
    /// Stable machine-readable code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputShape(_) => "INPUT_SHAPE",
            Self::Decode(_) => "DECODE_ERROR",
            Self::ClientDataType { .. } => "CLIENT_DATA_TYPE_MISMATCH",
            Self::ChallengeMismatch => "CHALLENGE_MISMATCH",
            Self::OriginMismatch { .. } => "ORIGIN_MISMATCH",
            Self::RelyingPartyHashMismatch => "RP_ID_HASH_MISMATCH",
            Self::FlagPolicyViolation(_) => "FLAG_POLICY_VIOLATION",
            Self::UnsupportedAttestationFormat(_) => "UNSUPPORTED_ATTESTATION_FORMAT",
            Self::NoneAttestationNotAllowed => "NONE_ATTESTATION_NOT_ALLOWED",
            Self::InvalidPublicKey(_) => "INVALID_PUBLIC_KEY",
            Self::SignatureVerificationFailed => "SIGNATURE_VERIFICATION_FAILED",
            Self::CounterReplay { .. } => "COUNTER_REPLAY",
            Self::CounterConflict => "COUNTER_CONFLICT",
            Self::ChallengeExpiredOrConsumed => "CHALLENGE_EXPIRED_OR_CONSUMED",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::Entropy(_) => "ENTROPY_FAILURE",
            Self::Store(_) => "STORE_ERROR",
            Self::Config(_) => "INVALID_CONFIG",
        }
    }
}

pub type Result<T> = std::result::Result<T, FidoError>;
