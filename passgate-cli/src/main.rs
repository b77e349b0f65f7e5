//! Passgate CLI - WebAuthn challenge and payload inspection tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use passgate_core::config::{DEFAULT_CHALLENGE_SIZE, DEFAULT_TIMEOUT};
use passgate_core::ExpectedFactor;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use commands::challenge::{Ceremony, ChallengeArgs};
use exit_codes::ExitCode;
use utils::InputEncoding;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid parameters)
  65  Data error (undecodable payload, failed check)
  66  Input error (cannot read file)
  70  Internal error (entropy source failure)";

#[derive(Parser)]
#[command(name = "passgate")]
#[command(author, version, about = "WebAuthn challenge generation and payload inspection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Print only the essential value
    #[arg(short, long, global = true, conflicts_with = "json")]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a one-time challenge, optionally with browser options
    Challenge {
        /// Relying party ID the options are issued for
        #[arg(long, default_value = "localhost")]
        rp_id: String,

        /// Challenge length in bytes (minimum 16)
        #[arg(short, long, default_value_t = DEFAULT_CHALLENGE_SIZE)]
        size: usize,

        /// Challenge lifetime in seconds
        #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout: u64,

        /// Also print options for this ceremony
        #[arg(long, value_enum)]
        options: Option<Ceremony>,

        /// User name placed in creation options
        #[arg(long, default_value = "passgate-user")]
        user_name: String,

        /// Factor the options are for (drives userVerification)
        #[arg(long, value_enum, default_value_t = Factor::Either)]
        factor: Factor,

        /// Deterministic seed (testing only, challenge is predictable)
        #[arg(long, hide = true)]
        seed: Option<u64>,
    },

    /// Decode and inspect authenticator payloads
    Inspect {
        #[command(subcommand)]
        target: InspectTarget,
    },
}

#[derive(Subcommand)]
enum InspectTarget {
    /// Decode authenticator data
    Authdata(InputArgs),

    /// Decode an attestation object
    Attestation {
        #[command(flatten)]
        input: InputArgs,

        /// clientDataJSON to verify the attestation signature against
        #[arg(long, value_name = "FILE")]
        client_data: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input file (reads stdin when omitted or "-")
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Input encoding
    #[arg(short, long, value_enum, default_value_t = InputEncoding::Auto)]
    encoding: InputEncoding,

    /// Check the RP ID hash against this relying party ID
    #[arg(long)]
    rp_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Factor {
    First,
    Second,
    Either,
}

impl From<Factor> for ExpectedFactor {
    fn from(factor: Factor) -> Self {
        match factor {
            Factor::First => ExpectedFactor::First,
            Factor::Second => ExpectedFactor::Second,
            Factor::Either => ExpectedFactor::Either,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "passgate=debug,passgate_core=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let (json, quiet) = (cli.json, cli.quiet);

    match cli.command {
        Commands::Challenge {
            rp_id,
            size,
            timeout,
            options,
            user_name,
            factor,
            seed,
        } => commands::challenge::execute(
            ChallengeArgs {
                rp_id,
                size,
                timeout_secs: timeout,
                seed,
                ceremony: options,
                user_name,
                factor: factor.into(),
            },
            json,
            quiet,
        ),
        Commands::Inspect { target } => match target {
            InspectTarget::Authdata(input) => {
                commands::inspect::authdata(input.file, input.encoding, input.rp_id, json, quiet)
            }
            InspectTarget::Attestation { input, client_data } => commands::inspect::attestation(
                input.file,
                input.encoding,
                input.rp_id,
                client_data,
                json,
                quiet,
            ),
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
