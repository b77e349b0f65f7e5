#![no_main]

//! Fuzz target for decode_authenticator_data()
//!
//! Decoding must never panic, and anything that decodes must re-encode to
//! exactly the input (the decoder rejects trailing bytes).
//!
//! Run with: cargo +nightly fuzz run fuzz_authenticator_data

use libfuzzer_sys::fuzz_target;
use passgate_core::decode_authenticator_data;

fuzz_target!(|data: &[u8]| {
    if let Ok(decoded) = decode_authenticator_data(data) {
        assert_eq!(decoded.to_bytes(), data);
    }
});
