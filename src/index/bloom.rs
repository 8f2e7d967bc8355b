// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! A single-hash Bloom filter.
//!
//! One 64-bit hash per insertion is enough here: the reindex pass
//! that consults the filter tolerates false positives, which only
//! mean an extraneous index entry survives until the next run. A
//! random per-instance seed is prepended to every hashed input so
//! repeated runs probe different bit patterns.

use xxhash_rust::xxh64::xxh64;

pub(super) struct Bloom {
    bits: Vec<u8>,
    seed: [u8; 8],
}

impl Bloom {
    /// Creates a filter with the given size in bits.
    pub fn new(size_bits: u64) -> Self {
        Self {
            bits: vec![0; (size_bits as usize).div_ceil(8)],
            seed: rand::random(),
        }
    }

    fn bit_index(&self, key: &[u8]) -> usize {
        let mut seeded = Vec::with_capacity(8 + key.len());
        seeded.extend_from_slice(&self.seed);
        seeded.extend_from_slice(key);
        (xxh64(&seeded, 0) % (self.bits.len() as u64 * 8)) as usize
    }

    pub fn set(&mut self, key: &[u8]) {
        let index = self.bit_index(key);
        self.bits[index / 8] |= 1 << (index & 7);
    }

    pub fn test(&self, key: &[u8]) -> bool {
        let index = self.bit_index(key);
        self.bits[index / 8] & (1 << (index & 7)) != 0
    }

    /// Fraction of bits set, in `[0, 1]`.
    pub fn fullness(&self) -> f64 {
        let set: u64 = self.bits.iter().map(|b| b.count_ones() as u64).sum();
        set as f64 / (self.bits.len() as f64 * 8.0)
    }
}
