// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Expansion of one strong 64-bit digest into many table sub-hashes.
//!
//! Each seeded digest of an item is shift-stamped into `64 / p` sub-hashes
//! of `p` bits each: `d >> 0, d >> p, d >> 2p, ...`, every one masked to
//! table range by the caller. One strong hash therefore amortizes over
//! several probe positions.

use crate::common::RandomSource;
use crate::common::XorShift64;

/// Number of `p`-bit sub-hashes extractable from one 64-bit digest.
#[inline]
pub(crate) fn hashes_per_word(p: u32) -> u32 {
    debug_assert!(p >= 1 && p <= 64);
    64 / p
}

/// Deterministically generates the seed sequence for a filter.
///
/// Draws from a xorshift stream seeded with `seedseed`, rejecting
/// duplicates, until the seeds cover `nh` sub-hashes at `64 / p` per seed.
/// Restarting from the same `seedseed` always reproduces the same prefix,
/// so regeneration after a resize keeps earlier seeds stable.
pub(crate) fn generate_seeds(seedseed: u64, p: u32, nh: u32) -> Vec<u64> {
    let per_word = hashes_per_word(p) as usize;
    let mut rng = XorShift64::seeded(seedseed);
    let mut seeds: Vec<u64> = Vec::new();
    while seeds.len() * per_word < nh as usize {
        let val = rng.next_u64();
        if !seeds.contains(&val) {
            seeds.push(val);
        }
    }
    seeds
}

/// Iterator over `(seed_index, sub_hash_count)` chunks covering `nh`.
///
/// Every chunk but possibly the last carries `64 / p` sub-hashes; the last
/// seed contributes only the remainder and its excess sub-hashes are
/// discarded.
pub(crate) struct SeedChunks {
    per_word: u32,
    remaining: u32,
    index: usize,
}

impl SeedChunks {
    pub fn new(nh: u32, p: u32) -> Self {
        Self {
            per_word: hashes_per_word(p),
            remaining: nh,
            index: 0,
        }
    }
}

impl Iterator for SeedChunks {
    type Item = (usize, u32);

    fn next(&mut self) -> Option<(usize, u32)> {
        if self.remaining == 0 {
            return None;
        }
        let take = self.per_word.min(self.remaining);
        let item = (self.index, take);
        self.index += 1;
        self.remaining -= take;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashes_per_word() {
        assert_eq!(hashes_per_word(6), 10);
        assert_eq!(hashes_per_word(10), 6);
        assert_eq!(hashes_per_word(16), 4);
        assert_eq!(hashes_per_word(33), 1);
        assert_eq!(hashes_per_word(46), 1);
    }

    #[test]
    fn test_seed_count_covers_requested_hashes() {
        for (p, nh) in [(10u32, 4u32), (10, 6), (10, 7), (16, 9), (46, 3)] {
            let seeds = generate_seeds(1234, p, nh);
            let per_word = hashes_per_word(p) as usize;
            assert!(seeds.len() * per_word >= nh as usize);
            // Exactly enough seeds, never one more than needed.
            assert!((seeds.len() - 1) * per_word < nh as usize);
        }
    }

    #[test]
    fn test_seeds_deterministic_and_distinct() {
        let a = generate_seeds(99, 12, 20);
        let b = generate_seeds(99, 12, 20);
        assert_eq!(a, b);
        let mut dedup = a.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), a.len());
    }

    #[test]
    fn test_reseed_at_new_p_keeps_prefix() {
        let coarse = generate_seeds(7, 16, 8); // 4 per word -> 2 seeds
        let fine = generate_seeds(7, 33, 8); // 1 per word -> 8 seeds
        assert!(fine.len() > coarse.len());
        assert_eq!(&fine[..coarse.len()], &coarse[..]);
    }

    #[test]
    fn test_chunks_partition_nh() {
        let chunks: Vec<(usize, u32)> = SeedChunks::new(7, 10).collect();
        assert_eq!(chunks, vec![(0, 6), (1, 1)]);
        let total: u32 = chunks.iter().map(|&(_, n)| n).sum();
        assert_eq!(total, 7);

        let exact: Vec<(usize, u32)> = SeedChunks::new(12, 16).collect();
        assert_eq!(exact, vec![(0, 4), (1, 4), (2, 4)]);
    }
}
