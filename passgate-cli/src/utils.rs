//! Common utility functions shared across CLI commands.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use passgate_core::encoding::b64url_decode;
use tracing::debug;

use crate::exit_codes::InvalidData;

/// How binary input is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputEncoding {
    /// Hex if the text is hex, otherwise base64url, otherwise raw bytes
    Auto,
    /// Raw binary
    Raw,
    Hex,
    Base64url,
}

/// Read a whole file, or stdin when `path` is absent or `-`.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            debug!(path = %path.display(), bytes = bytes.len(), "Read input file");
            Ok(bytes)
        }
        _ => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read stdin")?;
            debug!(bytes = bytes.len(), "Read stdin");
            Ok(bytes)
        }
    }
}

/// Turn the input bytes into the binary payload they encode.
pub fn decode_input(input: &[u8], encoding: InputEncoding) -> Result<Vec<u8>> {
    match encoding {
        InputEncoding::Raw => Ok(input.to_vec()),
        InputEncoding::Hex => {
            let text = text_of(input).context("Hex input is not text")?;
            hex::decode(text).context("Input is not valid hex")
        }
        InputEncoding::Base64url => {
            let text = text_of(input).context("Base64url input is not text")?;
            b64url_decode(text)
                .map_err(|e| InvalidData(format!("Input is not valid base64url: {e}")).into())
        }
        InputEncoding::Auto => {
            let Some(text) = text_of(input) else {
                debug!(encoding = "raw", "Detected input encoding");
                return Ok(input.to_vec());
            };
            if text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
                if let Ok(bytes) = hex::decode(text) {
                    debug!(encoding = "hex", "Detected input encoding");
                    return Ok(bytes);
                }
            }
            if let Ok(bytes) = b64url_decode(text) {
                debug!(encoding = "base64url", "Detected input encoding");
                return Ok(bytes);
            }
            debug!(encoding = "raw", "Detected input encoding");
            Ok(input.to_vec())
        }
    }
}

/// Trimmed text, when the input is non-empty UTF-8.
fn text_of(input: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(input).ok()?.trim();
    (!text.is_empty()).then_some(text)
}

/// Read and decode the payload for an inspect command.
pub fn load_payload(path: Option<&PathBuf>, encoding: InputEncoding) -> Result<Vec<u8>> {
    let input = read_input(path.map(PathBuf::as_path))?;
    let payload = decode_input(&input, encoding)?;
    if payload.is_empty() {
        return Err(InvalidData("Input is empty".into()).into());
    }
    Ok(payload)
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_and_base64url() {
        assert_eq!(
            decode_input(b"deadbeef\n", InputEncoding::Auto).unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(
            decode_input(b"-_8", InputEncoding::Auto).unwrap(),
            vec![0xfb, 0xff]
        );
        assert_eq!(
            decode_input(b"-_8", InputEncoding::Base64url).unwrap(),
            vec![0xfb, 0xff]
        );
        assert!(decode_input(b"xyz!", InputEncoding::Hex).is_err());
    }

    #[test]
    fn test_auto_keeps_binary() {
        let binary = [0xa3, 0x63, 0x66, 0x6d, 0x74, 0xff];
        assert_eq!(
            decode_input(&binary, InputEncoding::Auto).unwrap(),
            binary.to_vec()
        );
    }

    #[test]
    fn test_explicit_raw_keeps_text() {
        assert_eq!(
            decode_input(b"abcd", InputEncoding::Raw).unwrap(),
            b"abcd".to_vec()
        );
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-01-15T12:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(ts), "2024-01-15 12:30:45 UTC");
    }
}
