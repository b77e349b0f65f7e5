//! Operating system entropy.

use rand::rngs::OsRng;
use rand::RngCore;

use super::{EntropySource, EntropySourceKind};
use crate::error::{FidoError, Result};

/// Draws fresh bytes from the OS CSPRNG on every call.
///
/// Holds no state, so concurrent callers never contend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buf).map_err(|e| {
            tracing::error!(error = %e, "OS entropy source failed");
            FidoError::Entropy(e.to_string())
        })
    }

    fn source_id(&self) -> EntropySourceKind {
        EntropySourceKind::Os
    }
}
