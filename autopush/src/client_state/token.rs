//! Wire codec for client cache tokens.
//!
//! Tokens are base64 (standard alphabet, padded) over:
//!
//! ```text
//! v1: [version = 1: u8][k: u8][m: u32 LE][word: u32 LE] * (m / 32)
//! ```
//!
//! A bare word array without the header has the same bucket layout as some
//! older encoders, but bit positions depend on the hashing used to write
//! them, so such tokens are rejected rather than misread.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use super::bloom::{BloomFilter, WORD_BITS};

/// Current token layout version.
pub const TOKEN_VERSION: u8 = 1;

/// Header size of a v1 token in bytes.
const HEADER_LEN: usize = 6;

/// Upper bound on decoded token size.
pub const MAX_TOKEN_BYTES: usize = 64 * 1024;

/// Largest filter, in bits, whose token fits in [`MAX_TOKEN_BYTES`].
pub const MAX_FILTER_BITS: u32 = ((MAX_TOKEN_BYTES - HEADER_LEN) / 4) as u32 * WORD_BITS;

/// Errors decoding a client cache token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not valid base64.
    #[error("Token is not valid base64: {0}")]
    Base64(String),

    /// Token decoded to zero bytes.
    #[error("Token is empty")]
    Empty,

    /// Token length does not fit the layout.
    #[error("Token length {0} is not a valid filter size")]
    Length(usize),

    /// v1 header is inconsistent with the payload.
    #[error("Invalid token header: {0}")]
    Header(String),
}

/// Encode a filter as a v1 token.
pub(crate) fn encode(filter: &BloomFilter) -> String {
    let words = filter.words();
    let mut bytes = Vec::with_capacity(HEADER_LEN + words.len() * 4);
    bytes.push(TOKEN_VERSION);
    bytes.push(filter.hash_count() as u8);
    bytes.extend_from_slice(&filter.bit_len().to_le_bytes());
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode a v1 token.
pub(crate) fn decode(token: &str) -> Result<BloomFilter, TokenError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| TokenError::Base64(e.to_string()))?;

    if bytes.is_empty() {
        return Err(TokenError::Empty);
    }
    // A header plus whole words, within the size cap.
    if bytes.len() > MAX_TOKEN_BYTES || bytes.len() <= HEADER_LEN || bytes.len() % 4 != 2 {
        return Err(TokenError::Length(bytes.len()));
    }

    let version = bytes[0];
    if version != TOKEN_VERSION {
        return Err(TokenError::Header(format!(
            "unsupported version {}",
            version
        )));
    }

    let hash_count = u32::from(bytes[1]);
    if hash_count == 0 {
        return Err(TokenError::Header("hash count is zero".to_string()));
    }

    let bit_len = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let payload = &bytes[HEADER_LEN..];
    if bit_len as usize != payload.len() / 4 * WORD_BITS as usize {
        return Err(TokenError::Header(format!(
            "declared {} bits but payload holds {} bytes",
            bit_len,
            payload.len()
        )));
    }

    Ok(BloomFilter::from_words(read_words(payload), hash_count))
}

fn read_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
