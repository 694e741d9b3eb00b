//! A bounded, in-memory, single-producer/single-consumer byte pipe.
//!
//! Backs the pull-style entry points: the writer half is handed to the
//! push-style pipeline running on a background thread, the reader half is
//! handed back to the caller as an ordinary `std::io::Read`. Bounded by a
//! `crossbeam_channel` of chunk-sized frames rather than a raw byte count,
//! so back-pressure on the reader stalls the writer (and therefore the
//! whole producing pipeline) once `capacity` frames are unconsumed.

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::CatenaError;

enum Frame {
    Data(Vec<u8>),
    End(Option<CatenaError>),
}

/// The producing half. Implements [`Write`]; every `write_all` call becomes
/// one frame on the channel. Call [`PipeWriter::finish`] exactly once after
/// the producing pipeline returns, passing its error (if any) through so
/// the reader's final `read()` surfaces it.
pub struct PipeWriter {
    tx: crossbeam_channel::Sender<Frame>,
    cancel: CancelToken,
}

/// The consuming half, handed to the caller as a boxed `Read`.
pub struct PipeReader {
    rx: crossbeam_channel::Receiver<Frame>,
    pending: Vec<u8>,
    pending_pos: usize,
    terminal_error: Option<io::Error>,
    done: bool,
}

/// Create a bounded pipe holding at most `capacity` unconsumed frames.
#[must_use]
pub fn new(capacity: usize, cancel: CancelToken) -> (PipeWriter, PipeReader) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (
        PipeWriter { tx, cancel },
        PipeReader {
            rx,
            pending: Vec::new(),
            pending_pos: 0,
            terminal_error: None,
            done: false,
        },
    )
}

impl PipeWriter {
    /// Signal end of stream, carrying the producing pipeline's result.
    pub fn finish(self, err: Option<CatenaError>) {
        let _ = self.tx.send(Frame::End(err));
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut frame = Frame::Data(buf.to_vec());
        loop {
            if self.cancel.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "pipe cancelled"));
            }
            match self.tx.send_timeout(frame, Duration::from_millis(50)) {
                Ok(()) => return Ok(buf.len()),
                Err(crossbeam_channel::SendTimeoutError::Timeout(back)) => {
                    frame = back;
                    continue;
                }
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader dropped"));
                }
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pending_pos < self.pending.len() {
                let available = &self.pending[self.pending_pos..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.pending_pos += n;
                return Ok(n);
            }
            if self.done {
                return match self.terminal_error.take() {
                    Some(e) => Err(e),
                    None => Ok(0),
                };
            }
            match self.rx.recv() {
                Ok(Frame::Data(data)) => {
                    self.pending = data;
                    self.pending_pos = 0;
                }
                Ok(Frame::End(err)) => {
                    self.done = true;
                    self.terminal_error =
                        err.map(|e| io::Error::new(io::ErrorKind::Other, e));
                }
                Err(_) => {
                    // Writer dropped without calling `finish` (panic on the
                    // producer thread). Treat as a clean EOF; the caller
                    // already observes the panic via the joined thread if
                    // they're watching it.
                    self.done = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_everything_written_before_finish() {
        let (mut writer, mut reader) = new(4, CancelToken::new());
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        writer.finish(None);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn propagates_the_producer_error_as_the_final_read() {
        let (writer, mut reader) = new(4, CancelToken::new());
        writer.finish(Some(CatenaError::InvalidArgument("boom".to_string())));

        let mut buf = [0u8; 8];
        let result = reader.read(&mut buf);
        assert!(result.is_err());
    }
}
