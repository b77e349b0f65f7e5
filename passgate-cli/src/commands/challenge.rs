//! Challenge command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use passgate_core::entropy::{EntropySource, OsEntropy, SeededEntropy};
use passgate_core::{
    create_challenge, ExpectedFactor, RelyingParty, RelyingPartyConfig, UserEntity,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::utils::format_timestamp;

/// Which browser call the printed options are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Ceremony {
    /// `navigator.credentials.create()`
    Create,
    /// `navigator.credentials.get()`
    Get,
}

/// Arguments for the challenge command.
#[derive(Debug, Clone)]
pub struct ChallengeArgs {
    pub rp_id: String,
    pub size: usize,
    pub timeout_secs: u64,
    pub seed: Option<u64>,
    pub ceremony: Option<Ceremony>,
    pub user_name: String,
    pub factor: ExpectedFactor,
}

#[derive(Serialize)]
struct ChallengeOutput {
    challenge: String,
    size: usize,
    issued_at: String,
    expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

/// Execute the challenge command.
pub fn execute(args: ChallengeArgs, json: bool, quiet: bool) -> Result<()> {
    let config = RelyingPartyConfig::builder(args.rp_id.clone())
        .challenge_size(args.size)
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("Invalid challenge parameters")?;

    let entropy: Box<dyn EntropySource> = match args.seed {
        Some(seed) => {
            warn!(seed, "Using seeded entropy: challenge is predictable");
            Box::new(SeededEntropy::new(seed))
        }
        None => Box::new(OsEntropy),
    };

    let user = UserEntity {
        id: uuid::Uuid::new_v4().as_bytes().to_vec(),
        name: args.user_name.clone(),
        display_name: args.user_name.clone(),
    };
    let user_id = matches!(args.ceremony, Some(Ceremony::Create)).then(|| user.id.clone());

    let challenge = create_challenge(&config, entropy.as_ref(), user_id)
        .context("Challenge generation failed")?;
    info!(size = challenge.value.len(), source = %entropy.source_id(), "Challenge created");

    let relying_party = RelyingParty::new(config);
    let options = match args.ceremony {
        Some(Ceremony::Create) => Some(serde_json::to_value(relying_party.creation_options(
            &challenge,
            user,
            Vec::new(),
            args.factor,
        ))?),
        Some(Ceremony::Get) => Some(serde_json::to_value(relying_party.request_options(
            &challenge,
            Vec::new(),
            args.factor,
        ))?),
        None => None,
    };

    if quiet {
        println!("{}", challenge.encoded());
        return Ok(());
    }

    if json {
        let output = ChallengeOutput {
            challenge: challenge.encoded(),
            size: challenge.value.len(),
            issued_at: challenge.issued_at.to_rfc3339(),
            expires_at: challenge.expires_at.to_rfc3339(),
            options,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("{}", "Challenge".green().bold());
    println!("   {} {}", "Value:".dimmed(), challenge.encoded());
    println!("   {} {}", "Hex:".dimmed(), hex::encode(&challenge.value));
    println!("   {} {} bytes", "Size:".dimmed(), challenge.value.len());
    println!("   {} {}", "Source:".dimmed(), entropy.source_id());
    println!(
        "   {} {}",
        "Expires:".dimmed(),
        format_timestamp(challenge.expires_at)
    );
    if let Some(options) = options {
        println!();
        println!("{}", "Options".green().bold());
        println!("{}", serde_json::to_string_pretty(&options)?);
    }

    Ok(())
}
