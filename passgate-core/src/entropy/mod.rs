//! Random byte sources for challenge generation.
//!
//! Every challenge is drawn from an [`EntropySource`]:
//!
//! - **OsEntropy** - the operating system CSPRNG (production)
//! - **SeededEntropy** - deterministic ChaCha20 stream (tests only)
//!
//! ## Quick Start
//!
//! ```
//! use passgate_core::entropy::{EntropySource, OsEntropy};
//!
//! let source = OsEntropy;
//! let mut buf = [0u8; 32];
//! source.fill(&mut buf).unwrap();
//! ```

mod os;
mod seeded;

pub use os::OsEntropy;
pub use seeded::SeededEntropy;

use crate::error::Result;

/// Trait for challenge entropy sources.
///
/// Implementations must be thread-safe (`Send + Sync`): a single source is
/// shared by every request the relying party serves. A failure here is
/// fatal for the request and is not retried.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` entirely with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;

    /// Identifies the source, for logging.
    fn source_id(&self) -> EntropySourceKind;
}

/// Identifies where challenge bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EntropySourceKind {
    /// Operating system CSPRNG
    Os,
    /// Seeded stream for testing only (NOT unpredictable!)
    Seeded,
}

impl std::fmt::Display for EntropySourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Os => write!(f, "OS CSPRNG"),
            Self::Seeded => write!(f, "Seeded (NOT FOR PRODUCTION)"),
        }
    }
}

impl<T: EntropySource + ?Sized> EntropySource for std::sync::Arc<T> {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        (**self).fill(buf)
    }

    fn source_id(&self) -> EntropySourceKind {
        (**self).source_id()
    }
}
