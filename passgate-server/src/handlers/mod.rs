//! HTTP request handlers
//!
//! Operational endpoints live here; the ceremony endpoints are in
//! [`crate::webauthn::handlers`].

pub mod health;

pub use health::{health, ready, HealthResponse, ReadyResponse};
