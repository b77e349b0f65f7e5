//! CLI integration tests for passgate-cli.
//!
//! These tests run the actual binary against payloads produced by a
//! software authenticator and check outputs, exit codes, and JSON reports.

use assert_cmd::Command;
use chrono::Utc;
use passgate_core::encoding::b64url_encode;
use passgate_core::testing::{RegistrationOptions, SoftAuthenticator, TestKey};
use passgate_core::{
    AuthenticatorData, AuthenticatorFlags, Challenge, ExpectedFactor, RegistrationResponse,
};
use predicates::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use tempfile::TempDir;

/// Get a Command for the passgate binary.
fn passgate() -> Command {
    Command::cargo_bin("passgate").unwrap()
}

fn json_stdout(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout is JSON")
}

fn assertion_auth_data(rp_id: &str, flags: u8, sign_count: u32) -> Vec<u8> {
    AuthenticatorData {
        rp_id_hash: Sha256::digest(rp_id.as_bytes()).into(),
        flags: AuthenticatorFlags::from_bits(flags),
        sign_count,
        attested_credential: None,
        extensions: None,
    }
    .to_bytes()
}

fn registration(options: &RegistrationOptions) -> RegistrationResponse {
    let challenge = Challenge {
        value: vec![0x42; 32],
        issued_at: Utc::now(),
        expires_at: Utc::now(),
        user_id: None,
        factor: ExpectedFactor::Either,
    };
    SoftAuthenticator::new(TestKey::es256()).register(&challenge, options)
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    passgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WebAuthn"))
        .stdout(predicate::str::contains("challenge"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_version_displays_version() {
    passgate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("passgate"));
}

#[test]
fn test_help_shows_exit_codes() {
    passgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_inspect_attestation_help_shows_options() {
    passgate()
        .args(["inspect", "attestation", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--client-data"))
        .stdout(predicate::str::contains("--rp-id"))
        .stdout(predicate::str::contains("--encoding"));
}

// ============================================================================
// Challenge Tests
// ============================================================================

#[test]
fn test_challenge_quiet_prints_value() {
    let output = passgate()
        .args(["challenge", "--quiet"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value = String::from_utf8(output).unwrap();
    // 64 bytes, unpadded base64url
    assert_eq!(value.trim().len(), 86);
}

#[test]
fn test_challenge_values_differ() {
    let first = passgate().args(["challenge", "-q"]).output().unwrap().stdout;
    let second = passgate().args(["challenge", "-q"]).output().unwrap().stdout;
    assert_ne!(first, second);
}

#[test]
fn test_challenge_seed_is_reproducible() {
    let run = || {
        let output = passgate()
            .args(["challenge", "--json", "--seed", "7", "--size", "32"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        json_stdout(&output)
    };
    let (first, second) = (run(), run());
    assert_eq!(first["challenge"], second["challenge"]);
    assert_eq!(first["size"], 32);
    assert!(first["expires_at"].is_string());
}

#[test]
fn test_challenge_too_short_is_usage_error() {
    // Exit code 64 = EX_USAGE
    passgate()
        .args(["challenge", "--size", "8"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid challenge parameters"));
}

#[test]
fn test_challenge_with_creation_options() {
    let output = passgate()
        .args([
            "challenge",
            "--json",
            "--rp-id",
            "example.com",
            "--options",
            "create",
            "--user-name",
            "alice",
            "--factor",
            "first",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = json_stdout(&output);
    let options = &json["options"];
    assert_eq!(options["rp"]["id"], "example.com");
    assert_eq!(options["user"]["name"], "alice");
    assert_eq!(options["challenge"], json["challenge"]);
    assert_eq!(options["authenticatorSelection"]["userVerification"], "required");
}

// ============================================================================
// Inspect Authenticator Data Tests
// ============================================================================

#[test]
fn test_inspect_authdata_from_hex_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("authdata.hex");
    let flags = AuthenticatorFlags::USER_PRESENT | AuthenticatorFlags::USER_VERIFIED;
    fs::write(&path, hex::encode(assertion_auth_data("example.com", flags, 42))).unwrap();

    let output = passgate()
        .args(["inspect", "authdata", path.to_str().unwrap(), "--json"])
        .args(["--rp-id", "example.com"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = json_stdout(&output);
    assert_eq!(json["sign_count"], 42);
    assert_eq!(json["rp_id_matches"], true);
    assert_eq!(json["flags"]["user_present"], true);
    assert_eq!(json["flags"]["user_verified"], true);
    assert!(json.get("attested_credential").is_none());
}

#[test]
fn test_inspect_authdata_from_stdin() {
    let encoded = b64url_encode(assertion_auth_data("example.com", AuthenticatorFlags::USER_PRESENT, 3));
    passgate()
        .args(["inspect", "authdata", "--encoding", "base64url"])
        .write_stdin(encoded)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sign count:"))
        .stdout(predicate::str::contains("UP"));
}

#[test]
fn test_inspect_authdata_rp_id_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("authdata.bin");
    fs::write(&path, assertion_auth_data("example.com", AuthenticatorFlags::USER_PRESENT, 1)).unwrap();

    // Exit code 65 = EX_DATAERR
    passgate()
        .args(["inspect", "authdata", path.to_str().unwrap(), "--encoding", "raw"])
        .args(["--rp-id", "evil.example"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("rpIdHash does not match"));
}

#[test]
fn test_inspect_truncated_authdata_is_data_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("authdata.bin");
    let mut bytes = assertion_auth_data("example.com", AuthenticatorFlags::USER_PRESENT, 1);
    bytes.truncate(36);
    fs::write(&path, bytes).unwrap();

    passgate()
        .args(["inspect", "authdata", path.to_str().unwrap(), "-e", "raw"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to decode authenticator data"));
}

#[test]
fn test_missing_file_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    passgate()
        .args(["inspect", "authdata", "nonexistent_authdata.bin"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

// ============================================================================
// Inspect Attestation Tests
// ============================================================================

#[test]
fn test_inspect_packed_basic_attestation_verifies() {
    let temp = TempDir::new().unwrap();
    let response = registration(&RegistrationOptions::packed_basic("https://example.com"));
    let object_path = temp.path().join("attestation.cbor");
    let client_data_path = temp.path().join("client_data.json");
    fs::write(&object_path, &response.response.attestation_object).unwrap();
    fs::write(&client_data_path, &response.response.client_data_json).unwrap();

    let output = passgate()
        .args(["inspect", "attestation", object_path.to_str().unwrap(), "--json"])
        .args(["--client-data", client_data_path.to_str().unwrap()])
        .args(["--rp-id", "example.com"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = json_stdout(&output);
    assert_eq!(json["format"], "packed");
    assert_eq!(json["attestation_type"], "basic");
    assert_eq!(json["statement"]["kind"], "packed");
    assert_eq!(json["statement"]["certificates"].as_array().unwrap().len(), 1);
    assert_eq!(
        json["authenticator_data"]["attested_credential"]["algorithm"],
        "ES256"
    );
    assert_eq!(json["authenticator_data"]["rp_id_matches"], true);
}

#[test]
fn test_inspect_fido_u2f_attestation_text() {
    let temp = TempDir::new().unwrap();
    let response = registration(&RegistrationOptions::fido_u2f("https://example.com"));
    let object_path = temp.path().join("attestation.b64");
    fs::write(&object_path, b64url_encode(&response.response.attestation_object)).unwrap();

    passgate()
        .args(["inspect", "attestation", object_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("fido-u2f"))
        .stdout(predicate::str::contains("Certificate:"))
        .stdout(predicate::str::contains("AT"));
}

#[test]
fn test_inspect_attestation_wrong_client_data_fails() {
    let temp = TempDir::new().unwrap();
    let response = registration(&RegistrationOptions::packed_self("https://example.com"));
    let object_path = temp.path().join("attestation.cbor");
    let client_data_path = temp.path().join("client_data.json");
    fs::write(&object_path, &response.response.attestation_object).unwrap();
    fs::write(&client_data_path, br#"{"type":"webauthn.create"}"#).unwrap();

    passgate()
        .args(["inspect", "attestation", object_path.to_str().unwrap()])
        .args(["--client-data", client_data_path.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Attestation verification failed"));
}

#[test]
fn test_inspect_garbage_attestation() {
    passgate()
        .args(["inspect", "attestation", "--encoding", "hex"])
        .write_stdin("a0")
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to decode attestation object"));
}
