//! Fixed-size Bloom filter over request paths.
//!
//! Bits are stored in 32-bit words, which the token codec writes out as
//! little-endian words after its header. Bit positions are derived
//! from a SHA-256 digest of the path using double hashing, which keeps them
//! stable across platforms and releases.

use sha2::{Digest, Sha256};

/// Number of bits per storage word.
pub(crate) const WORD_BITS: u32 = 32;

/// Append-only approximate set of strings.
///
/// Crate-internal: callers always hold at least one word and a hash count
/// that fits the token header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BloomFilter {
    words: Vec<u32>,
    hash_count: u32,
}

impl BloomFilter {
    /// Create an empty filter with at least `min_bits` bits.
    ///
    /// The bit length is rounded up to a whole number of words.
    pub fn new(min_bits: u32, hash_count: u32) -> Self {
        debug_assert!(hash_count <= u32::from(u8::MAX));
        let word_count = min_bits.max(1).div_ceil(WORD_BITS) as usize;
        Self {
            words: vec![0; word_count],
            hash_count,
        }
    }

    /// Rebuild a filter from its storage words.
    pub fn from_words(words: Vec<u32>, hash_count: u32) -> Self {
        debug_assert!(!words.is_empty(), "filter needs at least one word");
        debug_assert!(hash_count <= u32::from(u8::MAX));
        Self { words, hash_count }
    }

    /// Storage words in order.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Total number of addressable bits.
    pub fn bit_len(&self) -> u32 {
        self.words.len() as u32 * WORD_BITS
    }

    /// Number of bit positions set per inserted item.
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Number of bits currently set.
    pub fn bits_set(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Insert an item. Bits are never cleared.
    pub fn insert(&mut self, item: &str) {
        for bit in self.positions(item) {
            self.words[(bit / WORD_BITS) as usize] |= 1 << (bit % WORD_BITS);
        }
    }

    /// Test an item. `false` means the item was definitely never inserted.
    pub fn contains(&self, item: &str) -> bool {
        self.positions(item)
            .all(|bit| self.words[(bit / WORD_BITS) as usize] & (1 << (bit % WORD_BITS)) != 0)
    }

    /// Expected false-positive probability given the current fill.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let fill = self.bits_set() as f64 / self.bit_len() as f64;
        fill.powi(self.hash_count as i32)
    }

    fn positions(&self, item: &str) -> impl Iterator<Item = u32> {
        let digest = Sha256::digest(item.as_bytes());
        let mut h1_bytes = [0u8; 8];
        let mut h2_bytes = [0u8; 8];
        h1_bytes.copy_from_slice(&digest[0..8]);
        h2_bytes.copy_from_slice(&digest[8..16]);
        let h1 = u64::from_le_bytes(h1_bytes);
        // Odd step so successive probes never collapse onto one bit.
        let h2 = u64::from_le_bytes(h2_bytes) | 1;
        let bit_len = u64::from(self.bit_len());

        (0..u64::from(self.hash_count))
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % bit_len) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rounds_up_to_words() {
        let filter = BloomFilter::new(959, 7);
        assert_eq!(filter.words().len(), 30);
        assert_eq!(filter.bit_len(), 960);
        assert_eq!(filter.bits_set(), 0);
    }

    #[test]
    fn test_zero_bits_still_allocates_a_word() {
        let filter = BloomFilter::new(0, 7);
        assert_eq!(filter.bit_len(), WORD_BITS);
    }

    #[test]
    fn test_insert_sets_at_most_k_bits() {
        let mut filter = BloomFilter::new(960, 7);
        filter.insert("/app.js");
        assert!(filter.bits_set() >= 1);
        assert!(filter.bits_set() <= 7);
        assert!(filter.contains("/app.js"));
    }

    #[test]
    fn test_positions_are_deterministic() {
        let mut a = BloomFilter::new(960, 7);
        let mut b = BloomFilter::new(960, 7);
        a.insert("/style.css");
        b.insert("/style.css");
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_words_preserves_membership() {
        let mut filter = BloomFilter::new(960, 7);
        filter.insert("/logo.png");
        let rebuilt = BloomFilter::from_words(filter.words().to_vec(), 7);
        assert!(rebuilt.contains("/logo.png"));
    }

    #[test]
    fn test_estimated_rate_grows_with_fill() {
        let mut filter = BloomFilter::new(960, 7);
        assert_eq!(filter.estimated_false_positive_rate(), 0.0);
        for i in 0..50 {
            filter.insert(&format!("/asset-{}", i));
        }
        let half = filter.estimated_false_positive_rate();
        for i in 50..100 {
            filter.insert(&format!("/asset-{}", i));
        }
        assert!(filter.estimated_false_positive_rate() > half);
    }
}
