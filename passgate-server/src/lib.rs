//! Passgate Server Library - REST API for WebAuthn registration and authentication
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod webauthn;

pub use config::Config;
pub use error::ApiError;
pub use routes::{create_router, create_router_with_state};
pub use webauthn::{
    RelyingPartySettings, SettingsError, StorageError, WebAuthnState, WebAuthnStorage,
};
