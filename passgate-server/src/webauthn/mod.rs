//! WebAuthn registration and authentication endpoints
//!
//! ## Architecture
//!
//! - `config`: relying party settings loaded from the environment
//! - `handlers`: HTTP endpoint handlers for registration/authentication
//! - `storage`: account store backends (PostgreSQL, or memory as fallback)
//! - `types`: Request/response types for the WebAuthn API

mod config;
pub mod handlers;
pub mod storage;
mod types;

pub use config::{RelyingPartySettings, SettingsError};
pub use handlers::{
    finish_authentication, finish_registration, start_authentication, start_registration,
    WebAuthnState,
};
pub use storage::{MemoryAccountStore, PostgresAccountStore, StorageError, WebAuthnStorage};
pub use types::{
    AuthenticationResponse, CredentialSummary, FinishAuthenticationRequest,
    FinishRegistrationRequest, StartAuthenticationRequest, StartAuthenticationResponse,
    StartRegistrationRequest, StartRegistrationResponse,
};
