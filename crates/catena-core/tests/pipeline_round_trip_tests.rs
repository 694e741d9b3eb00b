//! Round-trip, format, and tamper-detection tests for the encrypt/decrypt
//! pipelines.

use std::io::Cursor;

use catena_core::{
    decrypt_stream, encrypt_stream, CancelToken, CatenaError, DecryptConfig, EncryptConfig,
    MasterKey, MAGIC,
};
use rand::rngs::OsRng;
use rand::RngCore;

const KEY_ID: i32 = 7;

fn master_key() -> MasterKey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    MasterKey::new(bytes)
}

fn encrypt(plaintext: &[u8], config: &EncryptConfig) -> Vec<u8> {
    let master = master_key();
    let mut input = Cursor::new(plaintext);
    let mut output = Vec::new();
    let mut rng = OsRng;
    let cancel = CancelToken::new();
    encrypt_stream(&master, KEY_ID, &mut input, &mut output, config, &mut rng, &cancel)
        .expect("encrypt should succeed");
    output
}

fn encrypt_with_key(plaintext: &[u8], master: &MasterKey, config: &EncryptConfig) -> Vec<u8> {
    let mut input = Cursor::new(plaintext);
    let mut output = Vec::new();
    let mut rng = OsRng;
    let cancel = CancelToken::new();
    encrypt_stream(master, KEY_ID, &mut input, &mut output, config, &mut rng, &cancel)
        .expect("encrypt should succeed");
    output
}

fn decrypt_with_key(
    container: &[u8],
    master: &MasterKey,
    key_id: i32,
    config: &DecryptConfig,
) -> Result<(Vec<u8>, catena_core::DecryptSummary), CatenaError> {
    let mut input = Cursor::new(container);
    let mut output = Vec::new();
    let cancel = CancelToken::new();
    let summary = decrypt_stream(master, key_id, &mut input, &mut output, config, &cancel)?;
    Ok((output, summary))
}

#[test]
fn round_trips_small_input() {
    let master = master_key();
    let config = EncryptConfig {
        total_plaintext_len: Some(5),
        ..EncryptConfig::default()
    };
    let container = encrypt_with_key(b"hello", &master, &config);
    let (plaintext, _) = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default())
        .expect("decrypt should succeed");
    assert_eq!(plaintext, b"hello");
}

#[test]
fn round_trips_empty_input() {
    let master = master_key();
    let config = EncryptConfig {
        total_plaintext_len: Some(0),
        ..EncryptConfig::default()
    };
    let container = encrypt_with_key(b"", &master, &config);
    assert_eq!(container.len(), 84, "empty input produces header only");

    let (plaintext, summary) =
        decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default())
            .expect("decrypt should succeed");
    assert!(plaintext.is_empty());
    assert_eq!(summary.chunks_read, 0);
}

#[test]
fn round_trips_multi_chunk_input() {
    let master = master_key();
    let config = EncryptConfig {
        chunk_size: 8192,
        total_plaintext_len: Some(8192 * 3 + 17),
        ..EncryptConfig::default()
    };
    let plaintext: Vec<u8> = (0..(8192 * 3 + 17)).map(|i| (i % 251) as u8).collect();
    let container = encrypt_with_key(&plaintext, &master, &config);

    let (recovered, summary) =
        decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default())
            .expect("decrypt should succeed");
    assert_eq!(recovered, plaintext);
    assert_eq!(summary.chunks_read, 4);
}

#[test]
fn chunk_size_boundary_produces_exactly_one_chunk() {
    let master = master_key();
    let config = EncryptConfig {
        chunk_size: 8192,
        total_plaintext_len: Some(8192),
        ..EncryptConfig::default()
    };
    let plaintext = vec![0xAB; 8192];
    let container = encrypt_with_key(&plaintext, &master, &config);

    let (_, summary) = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default())
        .expect("decrypt should succeed");
    assert_eq!(summary.chunks_read, 1);
}

#[test]
fn one_byte_over_boundary_produces_two_chunks() {
    let master = master_key();
    let config = EncryptConfig {
        chunk_size: 8192,
        total_plaintext_len: Some(8193),
        ..EncryptConfig::default()
    };
    let plaintext = vec![0xAB; 8193];
    let container = encrypt_with_key(&plaintext, &master, &config);

    let (_, summary) = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default())
        .expect("decrypt should succeed");
    assert_eq!(summary.chunks_read, 2);
}

#[test]
fn every_record_begins_with_magic() {
    let container = encrypt(b"some plaintext bytes", &EncryptConfig::default());
    assert_eq!(&container[0..4], MAGIC);
    // First chunk header immediately follows the 84-byte file header.
    assert_eq!(&container[84..88], MAGIC);
}

#[test]
fn key_id_mismatch_is_rejected_before_unsealing() {
    let master = master_key();
    let container = encrypt_with_key(b"payload", &master, &EncryptConfig::default());

    let result = decrypt_with_key(&container, &master, KEY_ID + 1, &DecryptConfig::default());
    assert!(matches!(result, Err(CatenaError::KeyIdMismatch { .. })));
}

#[test]
fn wrong_master_key_fails_auth() {
    let master = master_key();
    let other = master_key();
    let container = encrypt_with_key(b"payload", &master, &EncryptConfig::default());

    let result = decrypt_with_key(&container, &other, KEY_ID, &DecryptConfig::default());
    assert!(matches!(result, Err(CatenaError::AuthFailed { .. })));
}

#[test]
fn magic_corruption_fails_before_plaintext_emission() {
    let master = master_key();
    let mut container = encrypt_with_key(b"payload", &master, &EncryptConfig::default());
    container[0] ^= 0xFF;

    let result = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default());
    assert!(matches!(result, Err(CatenaError::InvalidData { .. })));
}

#[test]
fn tampered_chunk_tag_fails_auth() {
    let master = master_key();
    let mut container = encrypt_with_key(b"payload", &master, &EncryptConfig::default());
    let tag_start = 84 + 4 + 4 + 8 + 4; // chunk header: magic, len, plaintext_len, index, then tag
    container[tag_start] ^= 0xFF;

    let result = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default());
    assert!(matches!(result, Err(CatenaError::AuthFailed { .. })));
}

#[test]
fn truncated_ciphertext_is_rejected() {
    let master = master_key();
    let mut container = encrypt_with_key(b"a longer payload for this test", &master, &EncryptConfig::default());
    container.truncate(container.len() - 3);

    let result = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default());
    assert!(matches!(
        result,
        Err(CatenaError::Truncated { .. }) | Err(CatenaError::AuthFailed { .. })
    ));
}

#[test]
fn trailing_garbage_after_last_chunk_is_rejected() {
    let master = master_key();
    let mut container = encrypt_with_key(b"payload", &master, &EncryptConfig::default());
    container.extend_from_slice(b"extra junk");

    let result = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default());
    assert!(matches!(result, Err(CatenaError::InvalidData { .. })));
}

#[test]
fn strict_length_mismatch_fails_only_when_enabled() {
    let master = master_key();
    let config = EncryptConfig {
        total_plaintext_len: Some(10_000),
        ..EncryptConfig::default()
    };
    let plaintext = vec![0x11u8; 10_000];
    let mut container = encrypt_with_key(&plaintext, &master, &config);

    // Overwrite header's total_plaintext_len field (bytes 8..16) from
    // 10_000 to 9_999.
    let tampered_len: i64 = 9_999;
    container[8..16].copy_from_slice(&tampered_len.to_le_bytes());

    let strict = DecryptConfig {
        strict_length_check: true,
        ..DecryptConfig::default()
    };
    let result = decrypt_with_key(&container, &master, KEY_ID, &strict);
    assert!(matches!(result, Err(CatenaError::AuthFailed { .. })));

    let lenient = DecryptConfig {
        strict_length_check: false,
        ..DecryptConfig::default()
    };
    let (recovered, _) = decrypt_with_key(&container, &master, KEY_ID, &lenient)
        .expect("non-strict decrypt should succeed despite the tampered header field");
    assert_eq!(recovered.len(), 10_000);
}

#[test]
fn non_seekable_empty_input_skips_strict_length_check() {
    let master = master_key();
    // total_plaintext_len left at the default `None`, matching a
    // non-seekable source that can't know its length up front.
    let container = encrypt_with_key(b"", &master, &EncryptConfig::default());

    let strict = DecryptConfig {
        strict_length_check: true,
        ..DecryptConfig::default()
    };
    let (plaintext, _) = decrypt_with_key(&container, &master, KEY_ID, &strict)
        .expect("zero declared length must skip the strict check rather than fail");
    assert!(plaintext.is_empty());
}

#[test]
fn nonces_are_distinct_within_a_file() {
    let master = master_key();
    let config = EncryptConfig {
        chunk_size: 8192,
        total_plaintext_len: Some(8192 * 3),
        ..EncryptConfig::default()
    };
    let plaintext = vec![0x42u8; 8192 * 3];
    let container = encrypt_with_key(&plaintext, &master, &config);

    // Nonce prefix lives at bytes 20..24 of the file header; chunk index
    // at bytes 16..20 of each chunk header (right after magic + len).
    let nonce_prefix = u32::from_le_bytes(container[20..24].try_into().unwrap());
    let mut nonces = std::collections::HashSet::new();
    let mut offset = 84;
    loop {
        if offset >= container.len() {
            break;
        }
        let header = &container[offset..offset + 36];
        let plaintext_len = i64::from_le_bytes(header[8..16].try_into().unwrap()) as usize;
        let index = u32::from_le_bytes(header[16..20].try_into().unwrap()) as u64;
        let mut nonce = [0u8; 12];
        nonce[0..4].copy_from_slice(&nonce_prefix.to_le_bytes());
        nonce[4..12].copy_from_slice(&index.to_le_bytes());
        assert!(nonces.insert(nonce), "nonce reused for chunk {index}");
        offset += 36 + plaintext_len;
    }
}

#[test]
fn swapping_two_chunk_records_fails_decryption() {
    let master = master_key();
    let config = EncryptConfig {
        chunk_size: 8192,
        total_plaintext_len: Some(8192 * 3),
        ..EncryptConfig::default()
    };
    let plaintext = vec![0x77u8; 8192 * 3];
    let mut container = encrypt_with_key(&plaintext, &master, &config);

    // Every chunk record here is exactly 36 + 8192 bytes (equal-sized
    // chunks), so swapping the first two whole records — header and
    // ciphertext together — is a plain byte-range swap.
    let record_len = 36 + 8192;
    let first = 84;
    let second = 84 + record_len;
    let a = container[first..first + record_len].to_vec();
    let b = container[second..second + record_len].to_vec();
    container[first..first + record_len].copy_from_slice(&b);
    container[second..second + record_len].copy_from_slice(&a);

    let result = decrypt_with_key(&container, &master, KEY_ID, &DecryptConfig::default());
    assert!(matches!(
        result,
        Err(CatenaError::InvalidData { .. }) | Err(CatenaError::AuthFailed { .. })
    ));
}

#[test]
fn encrypt_config_rejects_out_of_range_values() {
    let bad_chunk = EncryptConfig {
        chunk_size: 1,
        ..EncryptConfig::default()
    };
    assert!(matches!(
        bad_chunk.validate(),
        Err(CatenaError::InvalidArgument(_))
    ));

    let bad_workers = EncryptConfig {
        workers: 0,
        ..EncryptConfig::default()
    };
    assert!(matches!(
        bad_workers.validate(),
        Err(CatenaError::InvalidArgument(_))
    ));

    let bad_window = EncryptConfig {
        window_cap: 1,
        ..EncryptConfig::default()
    };
    assert!(matches!(
        bad_window.validate(),
        Err(CatenaError::InvalidArgument(_))
    ));
}

#[test]
fn decrypt_config_rejects_out_of_range_values() {
    let bad_workers = DecryptConfig {
        workers: 0,
        ..DecryptConfig::default()
    };
    assert!(matches!(
        bad_workers.validate(),
        Err(CatenaError::InvalidArgument(_))
    ));

    let bad_window = DecryptConfig {
        window_cap: 1,
        ..DecryptConfig::default()
    };
    assert!(matches!(
        bad_window.validate(),
        Err(CatenaError::InvalidArgument(_))
    ));
}

#[test]
fn cancellation_is_observed_and_no_threads_outlive_the_call() {
    let master = master_key();
    let config = EncryptConfig {
        chunk_size: 8192,
        workers: 2,
        ..EncryptConfig::default()
    };
    let plaintext = vec![0x01u8; 8192 * 50];
    let mut input = Cursor::new(plaintext);
    let mut output = Vec::new();
    let mut rng = OsRng;
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = encrypt_stream(&master, KEY_ID, &mut input, &mut output, &config, &mut rng, &cancel);
    assert!(matches!(result, Err(CatenaError::Cancelled { .. })));
    // `encrypt_stream` only returns after `thread::scope` joins every
    // worker/reader/emitter thread it spawned, so reaching this point is
    // itself the "no threads survive" assertion.
}
