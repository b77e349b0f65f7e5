//! Inspect command implementation.
//!
//! Decodes authenticator data or a full attestation object and prints what
//! the relying party would see, optionally checking the RP ID hash and the
//! attestation signature.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use passgate_core::attestation::AttestationInput;
use passgate_core::encoding::b64url_encode;
use passgate_core::{
    decode_attestation_object, decode_authenticator_data, AttestationPolicy,
    AttestationStatement, AttestedCredentialData, AuthenticatorData,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::exit_codes::InvalidData;
use crate::utils::{load_payload, InputEncoding};

#[derive(Serialize)]
struct FlagsReport {
    bits: u8,
    user_present: bool,
    user_verified: bool,
    backup_eligible: bool,
    backed_up: bool,
    attested_credential_data: bool,
    extension_data: bool,
}

#[derive(Serialize)]
struct CredentialReport {
    aaguid: String,
    credential_id: String,
    credential_id_len: usize,
    algorithm: String,
    algorithm_id: i64,
    key_type: &'static str,
    public_key_cose: String,
}

#[derive(Serialize)]
struct AuthDataReport {
    rp_id_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rp_id_matches: Option<bool>,
    flags: FlagsReport,
    sign_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    attested_credential: Option<CredentialReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<String>,
}

#[derive(Serialize)]
struct CertificateReport {
    sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    not_after: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StatementReport {
    None,
    Packed {
        algorithm: String,
        signature_len: usize,
        certificates: Vec<CertificateReport>,
    },
    FidoU2f {
        signature_len: usize,
        certificate: CertificateReport,
    },
    Unsupported,
}

#[derive(Serialize)]
struct AttestationReport {
    format: String,
    statement: StatementReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    attestation_type: Option<String>,
    authenticator_data: AuthDataReport,
}

fn credential_report(credential: &AttestedCredentialData) -> CredentialReport {
    let key = credential.public_key();
    CredentialReport {
        aaguid: uuid::Uuid::from_bytes(*credential.aaguid()).to_string(),
        credential_id: b64url_encode(credential.credential_id()),
        credential_id_len: credential.credential_id().len(),
        algorithm: key.algorithm().name().to_string(),
        algorithm_id: key.algorithm().id(),
        key_type: key.key().type_name(),
        public_key_cose: hex::encode(key.as_bytes()),
    }
}

fn auth_data_report(auth_data: &AuthenticatorData, rp_id: Option<&str>) -> AuthDataReport {
    let flags = auth_data.flags;
    AuthDataReport {
        rp_id_hash: hex::encode(auth_data.rp_id_hash),
        rp_id_matches: rp_id
            .map(|id| Sha256::digest(id.as_bytes()).as_slice() == auth_data.rp_id_hash.as_slice()),
        flags: FlagsReport {
            bits: flags.bits(),
            user_present: flags.user_present(),
            user_verified: flags.user_verified(),
            backup_eligible: flags.backup_eligible(),
            backed_up: flags.backed_up(),
            attested_credential_data: flags.has_attested_credential(),
            extension_data: flags.has_extensions(),
        },
        sign_count: auth_data.sign_count,
        attested_credential: auth_data.attested_credential.as_ref().map(credential_report),
        extensions: auth_data.extensions.as_ref().map(hex::encode),
    }
}

fn certificate_report(der: &[u8]) -> CertificateReport {
    let sha256 = hex::encode(Sha256::digest(der));
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => CertificateReport {
            sha256,
            subject: Some(cert.subject().to_string()),
            issuer: Some(cert.issuer().to_string()),
            not_after: Some(cert.validity().not_after.to_string()),
        },
        Err(e) => {
            debug!(error = %e, "Attestation certificate does not parse");
            CertificateReport {
                sha256,
                subject: None,
                issuer: None,
                not_after: None,
            }
        }
    }
}

fn statement_report(statement: &AttestationStatement) -> StatementReport {
    match statement {
        AttestationStatement::None => StatementReport::None,
        AttestationStatement::Packed(packed) => StatementReport::Packed {
            algorithm: packed.alg.to_string(),
            signature_len: packed.sig.len(),
            certificates: packed
                .x5c
                .iter()
                .flatten()
                .map(|der| certificate_report(der))
                .collect(),
        },
        AttestationStatement::FidoU2f(u2f) => StatementReport::FidoU2f {
            signature_len: u2f.sig.len(),
            certificate: certificate_report(&u2f.certificate),
        },
        AttestationStatement::Unsupported(_) => StatementReport::Unsupported,
    }
}

fn check_rp_id(report: &AuthDataReport, rp_id: Option<&str>) -> Result<()> {
    match (report.rp_id_matches, rp_id) {
        (Some(false), Some(rp_id)) => Err(InvalidData(format!(
            "rpIdHash does not match SHA-256({rp_id:?})"
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Execute `inspect authdata`.
pub fn authdata(
    file: Option<PathBuf>,
    encoding: InputEncoding,
    rp_id: Option<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let bytes = load_payload(file.as_ref(), encoding)?;
    let auth_data =
        decode_authenticator_data(&bytes).context("Failed to decode authenticator data")?;
    info!(bytes = bytes.len(), flags = %auth_data.flags, "Decoded authenticator data");

    let report = auth_data_report(&auth_data, rp_id.as_deref());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        println!();
        println!("{}", "Authenticator data".green().bold());
        print_auth_data(&report, &auth_data);
    }

    check_rp_id(&report, rp_id.as_deref())
}

/// Execute `inspect attestation`.
pub fn attestation(
    file: Option<PathBuf>,
    encoding: InputEncoding,
    rp_id: Option<String>,
    client_data: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let bytes = load_payload(file.as_ref(), encoding)?;
    let object =
        decode_attestation_object(&bytes).context("Failed to decode attestation object")?;
    let statement = AttestationStatement::parse(&object.format, &object.statement)
        .context("Failed to parse attestation statement")?;
    info!(format = %object.format, "Decoded attestation object");

    let attestation_type = match client_data {
        Some(path) => {
            let client_data_json = load_payload(Some(&path), InputEncoding::Auto)?;
            let client_data_hash: [u8; 32] = Sha256::digest(&client_data_json).into();
            let credential = object
                .auth_data
                .attested_credential
                .as_ref()
                .ok_or_else(|| InvalidData("attestation carries no credential".into()))?;
            let input = AttestationInput {
                auth_data: &object.raw_auth_data,
                rp_id_hash: &object.auth_data.rp_id_hash,
                client_data_hash: &client_data_hash,
                credential,
            };
            let attestation_type = statement
                .verify(&input, AttestationPolicy::AllowNone)
                .context("Attestation verification failed")?;
            info!(attestation_type = %attestation_type, "Attestation signature verified");
            Some(attestation_type.to_string())
        }
        None => None,
    };

    let report = AttestationReport {
        format: object.format.to_string(),
        statement: statement_report(&statement),
        attestation_type,
        authenticator_data: auth_data_report(&object.auth_data, rp_id.as_deref()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        println!();
        println!("{}", "Attestation object".green().bold());
        println!("   {} {}", "Format:".dimmed(), report.format);
        print_statement(&report.statement);
        if let Some(attestation_type) = &report.attestation_type {
            println!(
                "   {} {} {}",
                "Verified:".dimmed(),
                "yes".green(),
                format!("({attestation_type} attestation)").as_str().dimmed()
            );
        }
        println!();
        println!("{}", "Authenticator data".green().bold());
        print_auth_data(&report.authenticator_data, &object.auth_data);
    }

    check_rp_id(&report.authenticator_data, rp_id.as_deref())
}

fn print_auth_data(report: &AuthDataReport, auth_data: &AuthenticatorData) {
    println!("   {} {}", "RP ID hash:".dimmed(), report.rp_id_hash);
    match report.rp_id_matches {
        Some(true) => println!("   {} {}", "RP ID:".dimmed(), "matches".green()),
        Some(false) => println!("   {} {}", "RP ID:".dimmed(), "MISMATCH".red().bold()),
        None => {}
    }
    println!("   {} {}", "Flags:".dimmed(), auth_data.flags);
    println!("   {} {}", "Sign count:".dimmed(), report.sign_count);
    if let Some(credential) = &report.attested_credential {
        println!("   {} {}", "AAGUID:".dimmed(), credential.aaguid);
        println!(
            "   {} {} ({} bytes)",
            "Credential ID:".dimmed(),
            credential.credential_id,
            credential.credential_id_len
        );
        println!(
            "   {} {} ({}), {}",
            "Public key:".dimmed(),
            credential.algorithm,
            credential.algorithm_id,
            credential.key_type
        );
    }
    if let Some(extensions) = &report.extensions {
        println!("   {} {}", "Extensions:".dimmed(), extensions);
    }
}

fn print_statement(statement: &StatementReport) {
    match statement {
        StatementReport::None => println!("   {} none", "Statement:".dimmed()),
        StatementReport::Packed {
            algorithm,
            signature_len,
            certificates,
        } => {
            let kind = if certificates.is_empty() {
                "self"
            } else {
                "basic"
            };
            println!(
                "   {} packed ({kind}), {algorithm}, {signature_len}-byte signature",
                "Statement:".dimmed()
            );
            for cert in certificates {
                print_certificate(cert);
            }
        }
        StatementReport::FidoU2f {
            signature_len,
            certificate,
        } => {
            println!(
                "   {} fido-u2f, {signature_len}-byte signature",
                "Statement:".dimmed()
            );
            print_certificate(certificate);
        }
        StatementReport::Unsupported => println!(
            "   {} {}",
            "Statement:".dimmed(),
            "format not supported for verification".yellow()
        ),
    }
}

fn print_certificate(cert: &CertificateReport) {
    println!(
        "   {} {}",
        "Certificate:".dimmed(),
        cert.subject.as_deref().unwrap_or("<unparseable>")
    );
    if let Some(issuer) = &cert.issuer {
        println!("     {} {}", "Issuer:".dimmed(), issuer);
    }
    if let Some(not_after) = &cert.not_after {
        println!("     {} {}", "Not after:".dimmed(), not_after);
    }
    println!("     {} {}", "SHA-256:".dimmed(), cert.sha256);
}
