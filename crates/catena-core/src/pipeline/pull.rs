//! Pull-style entry points: each spawns the push-style pipeline on a
//! background thread and hands the caller a `Read` instead of requiring
//! them to supply an output stream up front.

use std::io::Read;
use std::thread;

use rand::RngCore;

use crate::cancel::CancelToken;
use crate::key::MasterKey;

use super::bounded_pipe;
use super::decrypt::{decrypt_stream, DecryptConfig};
use super::encrypt::{encrypt_stream, EncryptConfig};

/// Pull-style encryption. Spawns [`encrypt_stream`] on a background thread
/// writing into one end of a bounded in-memory pipe sized
/// `config.chunk_size * config.window_cap` bytes (realized as
/// `window_cap` chunk-sized frames), and returns the other end as an
/// ordinary `Read` yielding the CTN1 container as it is produced.
///
/// A slow or stalled caller applies back-pressure through the pipe all the
/// way to the encrypt pipeline's reader thread, the same as the push-style
/// entry point blocking on a slow `output`. Any pipeline error is
/// delivered as the reader's final `read()` call returning `Err`.
pub fn encrypt_to_reader(
    master_key: MasterKey,
    key_id: i32,
    input: Box<dyn Read + Send>,
    config: EncryptConfig,
    rng: impl RngCore + Send + 'static,
    cancel: CancelToken,
) -> Box<dyn Read + Send> {
    let (mut writer, reader) = bounded_pipe::new(config.window_cap, cancel.clone());

    thread::spawn(move || {
        let mut input = input;
        let mut rng = rng;
        let result = encrypt_stream(
            &master_key,
            key_id,
            input.as_mut(),
            &mut writer,
            &config,
            &mut rng,
            &cancel,
        );
        writer.finish(result.err());
    });

    Box::new(reader)
}

/// Pull-style decryption, mirroring [`encrypt_to_reader`]. `input` is the
/// CTN1 container; the returned `Read` yields recovered plaintext.
pub fn decrypt_to_reader(
    master_key: MasterKey,
    key_id: i32,
    input: Box<dyn Read + Send>,
    config: DecryptConfig,
    cancel: CancelToken,
) -> Box<dyn Read + Send> {
    let (mut writer, reader) = bounded_pipe::new(config.window_cap, cancel.clone());

    thread::spawn(move || {
        let mut input = input;
        let result = decrypt_stream(&master_key, key_id, input.as_mut(), &mut writer, &config, &cancel);
        writer.finish(result.err());
    });

    Box::new(reader)
}
