//! Random identifiers, format checks and time conversions shared by the stores.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

/// Generate random bytes of specified length and return as base64.
pub fn random_base64(length: usize) -> String {
    BASE64.encode(random_bytes(length))
}

/// Generate random bytes of specified length and return as lowercase hex.
pub fn random_hex(length: usize) -> String {
    hex::encode(random_bytes(length))
}

fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// True if `s` is exactly `chars` hexadecimal characters.
pub fn is_hex_of_len(s: &str, chars: usize) -> bool {
    s.len() == chars && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Convert a configured lifetime into a chrono duration, saturating at a century.
pub(crate) fn lifetime(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
