#![no_main]

//! Fuzz target for CosePublicKey::from_bytes()
//!
//! Run with: cargo +nightly fuzz run fuzz_cose_key

use libfuzzer_sys::fuzz_target;
use passgate_core::CosePublicKey;

fuzz_target!(|data: &[u8]| {
    if let Ok(key) = CosePublicKey::from_bytes(data) {
        assert_eq!(key.as_bytes(), data);
    }
});
