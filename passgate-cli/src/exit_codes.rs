//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use passgate_core::{ConfigError, DecodeError, FidoError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (undecodable payload, failed check).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Internal software error (entropy source failure).
/// Maps to EX_SOFTWARE from sysexits.h.
pub const SOFTWARE_ERROR: i32 = 70;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Classify an error by the first typed cause in its chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                if cause.is::<DecodeError>() || cause.is::<hex::FromHexError>() {
                    Some(DATA_ERROR)
                } else if let Some(fido) = cause.downcast_ref::<FidoError>() {
                    Some(match fido {
                        FidoError::Config(_) | FidoError::InputShape(_) => USAGE_ERROR,
                        FidoError::Entropy(_) => SOFTWARE_ERROR,
                        _ => DATA_ERROR,
                    })
                } else if cause.is::<ConfigError>() {
                    Some(USAGE_ERROR)
                } else if cause.is::<std::io::Error>() {
                    Some(INPUT_ERROR)
                } else if cause.is::<InvalidData>() {
                    Some(DATA_ERROR)
                } else {
                    None
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self::error(code, format!("{err:#}"))
    }
}

/// Input that is not in the expected form, or fails a requested check.
#[derive(Debug)]
pub struct InvalidData(pub String);

impl std::fmt::Display for InvalidData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidData {}
