//! Decryption pipeline: `input stream -> header parse -> reader (chunked
//! records) -> job queue -> N AEAD workers -> reorder buffer -> writer ->
//! output stream`.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::cancel::CancelToken;
use crate::error::{CatenaError, ChunkContext};
use crate::format::{self, CHUNK_HEADER_LEN, FILE_HEADER_LEN};
use crate::key::MasterKey;
use crate::keywrap::{unwrap_file_key, WrappedKey};
use crate::pool::BufferPool;

use super::failure::FailureLatch;
use super::reorder::{Next, ReorderRing};

/// Configuration for [`decrypt_stream`].
#[derive(Debug, Clone)]
pub struct DecryptConfig {
    /// Number of AEAD worker threads.
    pub workers: usize,
    /// Reorder-window capacity; also the job queue's bound. Must be `>= 4`.
    pub window_cap: usize,
    /// When set, the sum of emitted plaintext lengths must match the
    /// header's declared total, or the operation fails with `AuthFailed`.
    /// Ignored when the header declares a total of `0` (non-seekable
    /// input at encrypt time).
    pub strict_length_check: bool,
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().min(4).max(1),
            window_cap: 1024,
            strict_length_check: true,
        }
    }
}

impl DecryptConfig {
    pub fn validate(&self) -> Result<(), CatenaError> {
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

/// Outcome of a successful [`decrypt_stream`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecryptSummary {
    pub chunks_read: u64,
    pub plaintext_bytes: u64,
}

struct CipherChunk {
    index: u64,
    nonce: [u8; 12],
    plaintext_len: usize,
    ciphertext_with_tag: Vec<u8>,
}

/// Decrypt a `"CTN1"` container read from `input`, writing plaintext to
/// `output`.
///
/// Parses the file header, checks `key_id` against the caller-supplied
/// value before any unsealing happens, then reads chunk records one at a
/// time, dispatching one open job per chunk across `config.workers`
/// threads. Plaintext is written to `output` in strict chunk order. Fails
/// closed: any authentication failure, structural error, or truncation
/// stops the pipeline before further plaintext is emitted, and no
/// already-written bytes should be trusted unless the whole call returns
/// `Ok`.
#[instrument(level = "info", skip(master_key, input, output, cancel), fields(key_id))]
pub fn decrypt_stream(
    master_key: &MasterKey,
    key_id: i32,
    input: &mut dyn Read,
    output: &mut dyn Write,
    config: &DecryptConfig,
    cancel: &CancelToken,
) -> Result<DecryptSummary, CatenaError> {
    config.validate()?;
    if key_id <= 0 {
        return Err(CatenaError::InvalidArgument(
            "key_id must be positive".to_string(),
        ));
    }

    let mut header_bytes = vec![0u8; FILE_HEADER_LEN];
    read_exact_or_truncated(input, &mut header_bytes, ChunkContext::new().with_phase("file_header"))?;
    let header = format::read_file_header(&header_bytes)?;

    if header.key_id != key_id {
        return Err(CatenaError::KeyIdMismatch {
            header_key_id: header.key_id,
            expected_key_id: key_id,
        });
    }

    let wrapped = WrappedKey {
        nonce: header.wrap_nonce,
        tag: header.wrap_tag,
        ciphertext: header.wrapped_key,
    };
    let file_key = unwrap_file_key(&wrapped, master_key)?;
    let file_key_bytes = *file_key.as_bytes();
    let nonce_prefix = header.nonce_prefix;

    debug!(workers = config.workers, "starting decryption pipeline");

    let pool = BufferPool::new(1);
    let ring: ReorderRing<Vec<u8>> = ReorderRing::new(config.window_cap);
    let latch = FailureLatch::new(cancel.clone());
    let (job_tx, job_rx) = crossbeam_channel::bounded::<CipherChunk>(config.window_cap);

    let mut summary = DecryptSummary::default();
    let key_id_for_aad = key_id;

    thread::scope(|scope| {
        for _ in 0..config.workers {
            let job_rx = job_rx.clone();
            let ring = &ring;
            let latch = &latch;
            let mut aad = format::init_aad_prefix(key_id_for_aad);

            scope.spawn(move || {
                loop {
                    if latch.should_stop() {
                        break;
                    }
                    let job = match job_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(job) => job,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    };

                    let context = ChunkContext::new()
                        .with_index(job.index)
                        .with_phase("open");
                    format::fill_aad_mutable(&mut aad, job.index as i64, job.plaintext_len as i64);

                    match crate::aead_worker::open(
                        &file_key_bytes,
                        &job.nonce,
                        &aad,
                        &job.ciphertext_with_tag,
                        &context,
                    ) {
                        Ok(plaintext) => ring.put(job.index, plaintext),
                        Err(e) => {
                            latch.fail(e);
                            break;
                        }
                    }
                }
            });
        }

        let reader_latch = &latch;
        let reader_ring = &ring;
        let reader_pool = &pool;
        let job_tx_reader = job_tx.clone();
        drop(job_tx);

        let reader_handle = scope.spawn(move || -> Option<CatenaError> {
            let mut index: u64 = 0;
            let mut header_buf = [0u8; CHUNK_HEADER_LEN];

            loop {
                if reader_latch.should_stop() {
                    break;
                }

                let context = ChunkContext::new().with_index(index).with_phase("chunk_header");
                match read_up_to(input, &mut header_buf) {
                    Ok(0) => break,
                    Ok(n) if n < CHUNK_HEADER_LEN => {
                        return Some(CatenaError::Truncated { context });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Some(CatenaError::io_with_context(e, context.clone()));
                    }
                }

                let chunk_header = match format::read_chunk_header(&header_buf, &context) {
                    Ok(h) => h,
                    Err(e) => return Some(e),
                };

                if chunk_header.chunk_index as i64 != index as i64 {
                    return Some(CatenaError::invalid_data(
                        format!(
                            "chunk header declares index {}, expected {index}",
                            chunk_header.chunk_index
                        ),
                        context,
                    ));
                }

                // The wire format stores only the bare ciphertext (same
                // length as the plaintext) after the chunk header; the
                // tag travels in the header itself. Reassemble
                // `ciphertext || tag` here since that's what the AEAD
                // open call expects.
                let plaintext_len = chunk_header.plaintext_len as usize;
                let mut cipher_buf = reader_pool.rent();
                cipher_buf.resize(plaintext_len, 0);
                if let Err(e) = read_exact_or_truncated(
                    input,
                    &mut cipher_buf,
                    ChunkContext::new().with_index(index).with_phase("ciphertext"),
                ) {
                    crate::key::zeroize_buffer(&mut cipher_buf);
                    return Some(e);
                }
                cipher_buf.extend_from_slice(&chunk_header.tag);

                let job = CipherChunk {
                    index,
                    nonce: format::compose_nonce(nonce_prefix, index),
                    plaintext_len,
                    ciphertext_with_tag: cipher_buf,
                };

                let mut job = job;
                loop {
                    if reader_latch.should_stop() {
                        return None;
                    }
                    match job_tx_reader.send_timeout(job, Duration::from_millis(50)) {
                        Ok(()) => break,
                        Err(crossbeam_channel::SendTimeoutError::Timeout(back)) => {
                            job = back;
                            continue;
                        }
                        Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return None,
                    }
                }

                index += 1;
            }

            // Anything left over after the last well-formed chunk is
            // trailing garbage: a valid stream ends exactly at EOF. Skip
            // this check entirely if we're already stopping (cancellation
            // or a fatal error elsewhere) so a blocking `input` can't hang
            // the pipeline past the point a caller expects it to return.
            if !reader_latch.should_stop() {
                let mut probe = [0u8; 1];
                match input.read(&mut probe) {
                    Ok(0) => {}
                    Ok(_) => {
                        return Some(CatenaError::invalid_data(
                            "trailing bytes after last chunk",
                            ChunkContext::new().with_index(index),
                        ));
                    }
                    Err(e) => {
                        return Some(CatenaError::io_with_context(
                            e,
                            ChunkContext::new().with_index(index).with_phase("trailing_check"),
                        ));
                    }
                }
            }

            reader_ring.set_total(index);
            None
        });

        loop {
            match ring.take_next(&latch) {
                Next::Item(_, mut plaintext) => {
                    summary.chunks_read += 1;
                    summary.plaintext_bytes += plaintext.len() as u64;
                    let write_result = output.write_all(&plaintext);
                    crate::key::zeroize_buffer(&mut plaintext);
                    if let Err(e) = write_result {
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

    if let Some(err) = latch.into_result("decrypt") {
        warn!(error = %err, "decryption pipeline failed");
        return Err(err);
    }

    if config.strict_length_check
        && header.total_plaintext_len > 0
        && summary.plaintext_bytes != header.total_plaintext_len as u64
    {
        return Err(CatenaError::AuthFailed {
            context: ChunkContext::new().with_phase("strict_length_check"),
        });
    }

    debug!(
        chunks = summary.chunks_read,
        bytes = summary.plaintext_bytes,
        "decryption pipeline complete"
    );
    Ok(summary)
}

/// Read until `buf` is full or the stream ends, returning the number of
/// bytes actually read (may be less than `buf.len()` on short input).
fn read_up_to(input: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_or_truncated(
    input: &mut dyn Read,
    buf: &mut [u8],
    context: ChunkContext,
) -> Result<(), CatenaError> {
    let n = read_up_to(input, buf).map_err(|e| CatenaError::io_with_context(e, context.clone()))?;
    if n < buf.len() {
        return Err(CatenaError::Truncated { context });
    }
    Ok(())
}
