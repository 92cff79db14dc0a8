//! Lightweight base58-alphabet + length check for mint strings (§4.5a).
//!
//! This only needs to reject obviously-malformed mints before they reach
//! the executor — a full base58 decode (and its checksum/leading-zero
//! edge cases) isn't needed for that, so this stays a plain character-set
//! and length check rather than pulling in a decode dependency.

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// True if `s` is 32–44 characters, all drawn from the base58 alphabet
/// (excludes `0`, `O`, `I`, `l`).
pub fn looks_like_base58_mint(s: &str) -> bool {
    let len = s.len();
    if !(32..=44).contains(&len) {
        return false;
    }
    s.bytes().all(|b| BASE58_ALPHABET.contains(&b))
}
