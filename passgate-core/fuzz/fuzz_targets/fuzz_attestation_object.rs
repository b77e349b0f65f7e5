#![no_main]

//! Fuzz target for decode_attestation_object()
//!
//! Exercises the CBOR envelope, the embedded authenticator data and the
//! per-format statement parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_attestation_object

use libfuzzer_sys::fuzz_target;
use passgate_core::{decode_attestation_object, AttestationStatement};

fuzz_target!(|data: &[u8]| {
    if let Ok(object) = decode_attestation_object(data) {
        let _ = AttestationStatement::parse(&object.format, &object.statement);
    }
});
