//! Unpredictable identifier generation for sessions and generic tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of random bytes backing every identifier (256 bits).
pub const ENTROPY_BYTES: usize = 32;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    // ThreadRng is a CSPRNG reseeded from the OS.
    rand::rng().fill_bytes(&mut buf);
    buf
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Generates a session identifier: `<hex millis>-<base64url(32 random bytes)>`.
///
/// The timestamp prefix only helps sorting and debugging; uniqueness and
/// unpredictability come from the random part.
pub fn generate_session_id() -> String {
    format!(
        "{:x}-{}",
        timestamp_millis(),
        URL_SAFE_NO_PAD.encode(random_bytes(ENTROPY_BYTES))
    )
}

/// Generates a URL-safe random token of exactly `length` characters.
pub fn generate_secure_token(length: usize) -> String {
    // Each base64 character carries 6 bits.
    let needed = (length * 6).div_ceil(8);
    let encoded = URL_SAFE_NO_PAD.encode(random_bytes(needed.max(ENTROPY_BYTES)));
    encoded[..length].to_string()
}
