mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use catena_core::CatenaError;

use crate::commands::{decrypt, encrypt};

/// Streaming, chunked, authenticated file cipher.
#[derive(Parser)]
#[command(name = "catena")]
#[command(author, version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into the CTN1 container format
    Encrypt(encrypt::Args),
    /// Decrypt a CTN1 container back to plaintext
    Decrypt(decrypt::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if tamper_evidence(&e) {
                eprintln!("note: any output already written must be treated as untrusted and discarded");
            }
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Encrypt(args) => encrypt::execute(&args),
        Commands::Decrypt(args) => decrypt::execute(&args),
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// `true` when the error chain holds a [`CatenaError`] variant that is
/// tamper evidence rather than a transient I/O or environment failure —
/// meaning any plaintext/ciphertext already written for this operation
/// must not be trusted.
fn tamper_evidence(e: &anyhow::Error) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<CatenaError>())
        .any(CatenaError::is_fatal_tamper_evidence)
}

/// Exit codes, chosen to mirror the error taxonomy so scripts can branch on
/// the failure kind without parsing stderr text.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<CatenaError>() {
            return match err {
                CatenaError::KeyIdMismatch { .. } => 10,
                CatenaError::AuthFailed { .. } => 11,
                CatenaError::InvalidData { .. } | CatenaError::Truncated { .. } => 12,
                CatenaError::NonceOverflow { .. } => 13,
                CatenaError::Cancelled { .. } => 14,
                CatenaError::InvalidArgument(_) => 2,
                CatenaError::Io { .. } => 1,
            };
        }
    }
    1
}

/// Parse a 32-byte master key from its hex encoding (64 hex characters).
pub(crate) fn parse_master_key_hex(s: &str) -> Result<catena_core::MasterKey> {
    let bytes = hex::decode(s).context("master key must be valid hex")?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("master key must decode to exactly 32 bytes"))?;
    Ok(catena_core::MasterKey::new(array))
}

/// Read the master key from `--master-key-hex`, falling back to the
/// `CATENA_MASTER_KEY` environment variable.
pub(crate) fn resolve_master_key(flag: &Option<String>) -> Result<catena_core::MasterKey> {
    if let Some(hex) = flag {
        return parse_master_key_hex(hex);
    }
    if let Ok(hex) = std::env::var("CATENA_MASTER_KEY") {
        return parse_master_key_hex(&hex);
    }
    bail!("no master key supplied: pass --master-key-hex or set CATENA_MASTER_KEY");
}
