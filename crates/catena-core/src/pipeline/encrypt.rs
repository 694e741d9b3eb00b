//! Encryption pipeline: `input stream -> reader (chunked) -> job queue ->
//! N AEAD workers -> reorder buffer -> writer -> output stream`.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use rand::RngCore;
use tracing::{debug, instrument, warn};

use crate::cancel::CancelToken;
use crate::error::{CatenaError, ChunkContext};
use crate::format::{self, FILE_HEADER_LEN, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::key::{FileKey, NoncePrefix};
use crate::keywrap::wrap_file_key;
use crate::pool::BufferPool;

use super::failure::FailureLatch;
use super::reorder::{Next, ReorderRing};
use crate::MasterKey;

/// Configuration for [`encrypt_stream`].
#[derive(Debug, Clone)]
pub struct EncryptConfig {
    /// Plaintext bytes sealed per chunk. Must be in
    /// `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
    pub chunk_size: usize,
    /// Number of AEAD worker threads.
    pub workers: usize,
    /// Reorder-window capacity; also the job queue's bound. Must be `>= 4`.
    pub window_cap: usize,
    /// Total plaintext length to record in the file header, if the input
    /// is seekable and the caller knows it up front. `None` (the default)
    /// writes `0`, the same sentinel used when the input's length truly
    /// can't be known ahead of time (e.g. a non-seekable stream).
    pub total_plaintext_len: Option<i64>,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            workers: num_cpus::get().min(4).max(1),
            window_cap: 1024,
            total_plaintext_len: None,
        }
    }
}

impl EncryptConfig {
    pub fn validate(&self) -> Result<(), CatenaError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(CatenaError::InvalidArgument(format!(
                "chunk_size {} out of range [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]",
                self.chunk_size
            )));
        }
        if self.workers == 0 {
            return Err(CatenaError::InvalidArgument(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.window_cap < 4 {
            return Err(CatenaError::InvalidArgument(
                "window_cap must be at least 4".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful [`encrypt_stream`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptSummary {
    pub chunks_written: u64,
    pub plaintext_bytes: u64,
}

struct SealedChunk {
    bytes: Vec<u8>,
    plaintext_len: usize,
}

/// Encrypt `input` into the `"CTN1"` container format, writing to `output`.
///
/// Reads plaintext in `config.chunk_size`-sized pieces, dispatches one seal
/// job per chunk across `config.workers` threads, and reassembles sealed
/// chunks in strict input order before writing them out. Blocks the
/// calling thread until the whole stream has been processed or a fatal
/// error/cancellation ends the pipeline early; no worker threads outlive
/// this call.
#[instrument(level = "info", skip(master_key, input, output, rng, cancel), fields(key_id))]
pub fn encrypt_stream(
    master_key: &MasterKey,
    key_id: i32,
    input: &mut dyn Read,
    output: &mut dyn Write,
    config: &EncryptConfig,
    rng: &mut dyn RngCore,
    cancel: &CancelToken,
) -> Result<EncryptSummary, CatenaError> {
    config.validate()?;
    if key_id <= 0 {
        return Err(CatenaError::InvalidArgument(
            "key_id must be positive".to_string(),
        ));
    }

    let file_key = FileKey::generate(rng);
    let nonce_prefix = NoncePrefix::generate(rng);
    let wrapped = wrap_file_key(&file_key, master_key, rng);

    let total_plaintext_len = config.total_plaintext_len.unwrap_or(0);
    let header = format::build_file_header(
        total_plaintext_len,
        key_id,
        u32::from_le_bytes(nonce_prefix.0),
        &wrapped.nonce,
        &wrapped.tag,
        &wrapped.ciphertext,
    );
    debug_assert_eq!(header.len(), FILE_HEADER_LEN);
    output.write_all(&header)?;

    debug!(
        chunk_size = config.chunk_size,
        workers = config.workers,
        "starting encryption pipeline"
    );

    let pool = BufferPool::new(config.chunk_size);
    let ring: ReorderRing<SealedChunk> = ReorderRing::new(config.window_cap);
    let latch = FailureLatch::new(cancel.clone());
    let (job_tx, job_rx) = crossbeam_channel::bounded::<(u64, Vec<u8>)>(config.window_cap);

    let file_key_bytes = *file_key.as_bytes();
    let nonce_prefix_u32 = u32::from_le_bytes(nonce_prefix.0);
    let key_id_for_aad = key_id;

    let mut summary = EncryptSummary::default();

    thread::scope(|scope| {
        for _ in 0..config.workers {
            let job_rx = job_rx.clone();
            let ring = &ring;
            let latch = &latch;
            let pool = &pool;
            let mut aad = format::init_aad_prefix(key_id_for_aad);

            scope.spawn(move || {
                loop {
                    if latch.should_stop() {
                        break;
                    }
                    let (index, buf) = match job_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(job) => job,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    };

                    let nonce = format::compose_nonce(nonce_prefix_u32, index);
                    format::fill_aad_mutable(&mut aad, index as i64, buf.len() as i64);

                    let sealed = crate::aead_worker::seal(&file_key_bytes, &nonce, &aad, &buf);
                    let plaintext_len = buf.len();
                    pool.release(buf);

                    // `sealed` is `ciphertext || tag`; the wire format
                    // carries the tag in the chunk header and only the
                    // bare ciphertext (same length as the plaintext)
                    // after it.
                    let (ciphertext, tag_bytes) = sealed.split_at(plaintext_len);
                    let tag: [u8; 16] = tag_bytes.try_into().unwrap();
                    let mut out_bytes =
                        format::build_chunk_header(plaintext_len as i64, index as i32, &tag);
                    out_bytes.extend_from_slice(ciphertext);

                    ring.put(
                        index,
                        SealedChunk {
                            bytes: out_bytes,
                            plaintext_len,
                        },
                    );
                }
            });
        }

        // Reader: runs on this scope, owns `input` and the job sender.
        let reader_latch = &latch;
        let reader_ring = &ring;
        let reader_pool = &pool;
        let job_tx_reader = job_tx.clone();
        drop(job_tx);

        let reader_handle = scope.spawn(move || -> Option<CatenaError> {
            let mut next_index: Option<u64> = Some(0);
            let mut dispatched: u64 = 0;
            let mut err = None;

            'reader: loop {
                if reader_latch.should_stop() {
                    break;
                }
                let index = match next_index {
                    Some(i) => i,
                    None => {
                        err = Some(CatenaError::NonceOverflow {
                            context: ChunkContext::new(),
                        });
                        break;
                    }
                };

                let mut buf = reader_pool.rent();
                buf.resize(config.chunk_size, 0);
                let mut filled = 0usize;
                loop {
                    if filled >= config.chunk_size {
                        break;
                    }
                    if reader_latch.should_stop() {
                        crate::key::zeroize_buffer(&mut buf);
                        break 'reader;
                    }
                    match input.read(&mut buf[filled..]) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(e) => {
                            err = Some(CatenaError::io_with_context(
                                e,
                                ChunkContext::new().with_index(index).with_phase("read"),
                            ));
                            crate::key::zeroize_buffer(&mut buf);
                            break 'reader;
                        }
                    }
                }
                if filled == 0 {
                    reader_pool.release(buf);
                    break;
                }
                buf.truncate(filled);

                let mut job = (index, buf);
                loop {
                    if reader_latch.should_stop() {
                        crate::key::zeroize_buffer(&mut job.1);
                        break 'reader;
                    }
                    match job_tx_reader.send_timeout(job, Duration::from_millis(50)) {
                        Ok(()) => break,
                        Err(crossbeam_channel::SendTimeoutError::Timeout(back)) => {
                            job = back;
                            continue;
                        }
                        Err(crossbeam_channel::SendTimeoutError::Disconnected(mut back)) => {
                            crate::key::zeroize_buffer(&mut back.1);
                            break 'reader;
                        }
                    }
                }

                dispatched += 1;
                next_index = index.checked_add(1);
            }

            reader_ring.set_total(dispatched);
            err
        });

        // Emitter: runs on this scope, owns `output`.
        loop {
            match ring.take_next(&latch) {
                Next::Item(_, chunk) => {
                    summary.chunks_written += 1;
                    summary.plaintext_bytes += chunk.plaintext_len as u64;
                    if let Err(e) = output.write_all(&chunk.bytes) {
                        latch.fail(CatenaError::from(e));
                        break;
                    }
                }
                Next::Done | Next::Stopped => break,
            }
        }

        if let Some(err) = reader_handle.join().unwrap_or(None) {
            latch.fail(err);
        }
    });

    if let Some(err) = latch.into_result("encrypt") {
        warn!(error = %err, "encryption pipeline failed");
        return Err(err);
    }

    debug!(
        chunks = summary.chunks_written,
        bytes = summary.plaintext_bytes,
        "encryption pipeline complete"
    );
    Ok(summary)
}
