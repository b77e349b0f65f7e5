//! User presence / verification policy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decode::AuthenticatorFlags;
use crate::error::{FidoError, Result};
use crate::options::UserVerificationRequirement;

/// Which authentication factor the relying party expects the authenticator
/// to have provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedFactor {
    /// First factor: user verification (UV) required
    First,
    /// Second factor: user presence (UP) required
    Second,
    /// Either UP or UV
    #[default]
    Either,
}

impl ExpectedFactor {
    /// What to ask the client for.
    pub fn user_verification(self) -> UserVerificationRequirement {
        match self {
            Self::First => UserVerificationRequirement::Required,
            Self::Second => UserVerificationRequirement::Discouraged,
            Self::Either => UserVerificationRequirement::Preferred,
        }
    }

    /// Check the factor flags in `flags`.
    pub fn check(self, flags: AuthenticatorFlags) -> Result<()> {
        let satisfied = match self {
            Self::First => flags.user_verified(),
            Self::Second => flags.user_present(),
            Self::Either => flags.user_present() || flags.user_verified(),
        };
        if satisfied {
            Ok(())
        } else {
            Err(FidoError::FlagPolicyViolation(format!(
                "factor {self} not satisfied by flags {flags}"
            )))
        }
    }
}

impl std::fmt::Display for ExpectedFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Either => "either",
        })
    }
}

impl FromStr for ExpectedFactor {
    type Err = FidoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Self::First),
            "second" => Ok(Self::Second),
            "either" => Ok(Self::Either),
            other => Err(FidoError::InputShape(format!(
                "factor must be first, second or either, got {other:?}"
            ))),
        }
    }
}
