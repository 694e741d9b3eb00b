use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use catena_core::{decrypt_stream, CancelToken, DecryptConfig};

use crate::resolve_master_key;

#[derive(ClapArgs)]
pub struct Args {
    /// CTN1 container to decrypt
    pub input: PathBuf,

    /// Destination for the recovered plaintext
    pub output: PathBuf,

    /// Key identifier expected in the file header
    #[arg(long, default_value_t = 1)]
    pub key_id: i32,

    /// Master key, hex-encoded (64 hex characters). Falls back to
    /// CATENA_MASTER_KEY if omitted.
    #[arg(long)]
    pub master_key_hex: Option<String>,

    /// Number of AEAD worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Reorder-window / job-queue capacity
    #[arg(long, default_value_t = 1024)]
    pub window_cap: usize,

    /// Verify the header's declared total plaintext length against what
    /// was actually emitted
    #[arg(long, default_value_t = true)]
    pub strict_length: bool,
}

#[instrument(level = "info", name = "cmd::decrypt", skip_all, fields(input = %args.input.display()))]
pub fn execute(args: &Args) -> Result<()> {
    let master_key = resolve_master_key(&args.master_key_hex)?;

    let mut input = File::open(&args.input)
        .with_context(|| format!("failed to open input file {}", args.input.display()))?;
    let output_file = File::create(&args.output)
        .with_context(|| format!("failed to create output file {}", args.output.display()))?;
    let mut output = BufWriter::new(output_file);

    let config = DecryptConfig {
        workers: args.workers.unwrap_or_else(|| num_cpus::get().min(4).max(1)),
        window_cap: args.window_cap,
        strict_length_check: args.strict_length,
    };

    let cancel = CancelToken::new();
    let summary = decrypt_stream(
        &master_key,
        args.key_id,
        &mut input,
        &mut output,
        &config,
        &cancel,
    )
    .context("decryption failed")?;

    tracing::info!(
        chunks = summary.chunks_read,
        bytes = summary.plaintext_bytes,
        "wrote {}",
        args.output.display()
    );
    Ok(())
}
