use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use rand::rngs::OsRng;
use tracing::instrument;

use catena_core::{encrypt_stream, CancelToken, EncryptConfig};

use crate::resolve_master_key;

#[derive(ClapArgs)]
pub struct Args {
    /// Plaintext input file
    pub input: PathBuf,

    /// Destination for the CTN1 container
    pub output: PathBuf,

    /// Key identifier stamped into the file header
    #[arg(long, default_value_t = 1)]
    pub key_id: i32,

    /// Master key, hex-encoded (64 hex characters). Falls back to
    /// CATENA_MASTER_KEY if omitted.
    #[arg(long)]
    pub master_key_hex: Option<String>,

    /// Plaintext bytes sealed per chunk
    #[arg(long, default_value_t = 1024 * 1024)]
    pub chunk_size: usize,

    /// Number of AEAD worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Reorder-window / job-queue capacity
    #[arg(long, default_value_t = 1024)]
    pub window_cap: usize,
}

#[instrument(level = "info", name = "cmd::encrypt", skip_all, fields(input = %args.input.display()))]
pub fn execute(args: &Args) -> Result<()> {
    let master_key = resolve_master_key(&args.master_key_hex)?;

    let mut input = File::open(&args.input)
        .with_context(|| format!("failed to open input file {}", args.input.display()))?;
    let total_plaintext_len = input
        .metadata()
        .ok()
        .map(|m| m.len() as i64);

    let output_file = File::create(&args.output)
        .with_context(|| format!("failed to create output file {}", args.output.display()))?;
    let mut output = BufWriter::new(output_file);

    let config = EncryptConfig {
        chunk_size: args.chunk_size,
        workers: args.workers.unwrap_or_else(|| num_cpus::get().min(4).max(1)),
        window_cap: args.window_cap,
        total_plaintext_len,
    };

    let mut rng = OsRng;
    let cancel = CancelToken::new();
    let summary = encrypt_stream(
        &master_key,
        args.key_id,
        &mut input,
        &mut output,
        &config,
        &mut rng,
        &cancel,
    )
    .context("encryption failed")?;

    tracing::info!(
        chunks = summary.chunks_written,
        bytes = summary.plaintext_bytes,
        "wrote {}",
        args.output.display()
    );
    Ok(())
}
