//! Client cache checker.
//!
//! Tracks which paths a client has probably received, so the server can skip
//! pushing them again. The state lives entirely on the client side as an
//! opaque token; the server keeps nothing per client.

use tracing::debug;

use super::bloom::BloomFilter;
use super::token::{self, TokenError, MAX_FILTER_BITS};

/// Target false-positive rate of a full filter.
pub const FALSE_POSITIVE_RATE: f64 = 0.01;

/// Bit positions per path: `round(log2(1 / FALSE_POSITIVE_RATE))`.
pub const HASH_COUNT: u32 = 7;

/// Default number of paths a fresh filter is sized for.
pub const DEFAULT_MAX_PATHS: usize = 100;

/// Number of filter bits needed to hold `max_paths` at the target rate.
///
/// `m = ceil(n * log2(1/p) / ln 2)`
pub fn bits_for_capacity(max_paths: usize) -> u32 {
    let log2_inv = (1.0 / FALSE_POSITIVE_RATE).log2();
    ((max_paths as f64 * log2_inv) / std::f64::consts::LN_2).ceil() as u32
}

/// Largest capacity whose token still decodes.
pub fn max_capacity() -> usize {
    let log2_inv = (1.0 / FALSE_POSITIVE_RATE).log2();
    let mut n = (f64::from(MAX_FILTER_BITS) * std::f64::consts::LN_2 / log2_inv) as usize;
    // Settle float rounding against the exact sizing rule.
    while bits_for_capacity(n + 1) <= MAX_FILTER_BITS {
        n += 1;
    }
    while n > 0 && bits_for_capacity(n) > MAX_FILTER_BITS {
        n -= 1;
    }
    n
}

/// Approximate record of paths a client already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCacheChecker {
    filter: BloomFilter,
}

impl Default for ClientCacheChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientCacheChecker {
    /// Create an empty checker sized for [`DEFAULT_MAX_PATHS`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_PATHS)
    }

    /// Create an empty checker sized for `max_paths`.
    ///
    /// Capped at [`max_capacity`] so the token always decodes.
    pub fn with_capacity(max_paths: usize) -> Self {
        let max_paths = max_paths.min(max_capacity());
        Self {
            filter: BloomFilter::new(bits_for_capacity(max_paths), HASH_COUNT),
        }
    }

    /// Decode a token, falling back to an empty checker on any error.
    ///
    /// The fallback is sized for `fallback_capacity` paths.
    pub fn deserialize_or_fresh(token: &str, fallback_capacity: usize) -> Self {
        match Self::try_deserialize(token) {
            Ok(checker) => checker,
            Err(e) => {
                debug!(error = %e, "Discarding undecodable client cache token");
                Self::with_capacity(fallback_capacity)
            }
        }
    }

    /// Decode a token, falling back to a default-sized empty checker.
    pub fn deserialize(token: &str) -> Self {
        Self::deserialize_or_fresh(token, DEFAULT_MAX_PATHS)
    }

    /// Decode a token, reporting why it could not be read.
    pub fn try_deserialize(token: &str) -> Result<Self, TokenError> {
        token::decode(token).map(|filter| Self { filter })
    }

    /// Encode the current state as an opaque token.
    pub fn serialize(&self) -> String {
        token::encode(&self.filter)
    }

    /// Record that the client holds (or is about to receive) `path`.
    pub fn add_path(&mut self, path: &str) {
        self.filter.insert(path);
    }

    /// `true` if the client may hold `path`; `false` if it definitely does not.
    pub fn may_have_path(&self, path: &str) -> bool {
        self.filter.contains(path)
    }

    /// Filter size in bits.
    pub fn bit_len(&self) -> u32 {
        self.filter.bit_len()
    }

    /// Bit positions set per path.
    pub fn hash_count(&self) -> u32 {
        self.filter.hash_count()
    }

    /// Number of bits set.
    pub fn bits_set(&self) -> u32 {
        self.filter.bits_set()
    }

    /// False-positive probability at the current fill level.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.filter.estimated_false_positive_rate()
    }
}
