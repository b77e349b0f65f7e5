//! Seeded entropy for testing.

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::{EntropySource, EntropySourceKind};
use crate::error::Result;

/// Deterministic entropy for testing.
/// WARNING: Do not use in production - challenges become predictable!
///
/// The stream advances on every call, so successive challenges differ, but
/// two sources built from the same seed produce the same sequence.
pub struct SeededEntropy {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Create a source with the default test seed.
    pub fn default_test() -> Self {
        Self::new(0xDEADBEEF_CAFEBABE)
    }
}

impl Default for SeededEntropy {
    fn default() -> Self {
        Self::default_test()
    }
}

impl EntropySource for SeededEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }

    fn source_id(&self) -> EntropySourceKind {
        EntropySourceKind::Seeded
    }
}

impl std::fmt::Debug for SeededEntropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededEntropy").finish_non_exhaustive()
    }
}
