//! 256-bit machine words
//!
//! Words are carried as `BigUint` and kept below 2^256 by construction
//! (the parser rejects larger literals, digests are exactly 32 bytes).

use num_bigint::BigUint;

/// A machine word
pub type Word = BigUint;

/// Width of a machine word in bytes
pub const WORD_SIZE: usize = 32;

/// Whether `value` fits into a single machine word
pub fn fits_in_word(value: &Word) -> bool {
    value.bits() <= (WORD_SIZE as u64) * 8
}

/// Big-endian encoding of a word, left-padded to the full word width.
///
/// Only the low `WORD_SIZE` bytes are kept if `value` is out of range.
pub fn to_big_endian(value: &Word) -> [u8; WORD_SIZE] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; WORD_SIZE];
    let take = bytes.len().min(WORD_SIZE);
    out[WORD_SIZE - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}

/// Interpret `bytes` as a big-endian unsigned integer
pub fn from_big_endian(bytes: &[u8]) -> Word {
    BigUint::from_bytes_be(bytes)
}

/// Left-align `bytes` in a word, as string literals are laid out.
///
/// Returns `None` when `bytes` is longer than a word.
pub fn left_aligned(bytes: &[u8]) -> Option<Word> {
    if bytes.len() > WORD_SIZE {
        return None;
    }
    let mut out = [0u8; WORD_SIZE];
    out[..bytes.len()].copy_from_slice(bytes);
    Some(from_big_endian(&out))
}

/// Parse a decimal or `0x`-prefixed hexadecimal number literal.
///
/// Returns `None` for malformed text or values that do not fit a word.
pub fn parse_number(text: &str) -> Option<Word> {
    let value = match text.strip_prefix("0x") {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16)?,
        None => BigUint::parse_bytes(text.as_bytes(), 10)?,
    };
    fits_in_word(&value).then_some(value)
}
