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

use xxhash_rust::xxh3::xxh3_64;

use crate::bloom::bit_core::BitCore;
use crate::bloom::schedule;
use crate::bloom::schedule::SeedChunks;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::hash::IndexHasher;
use crate::hash::SplitMixHash;

/// log2 of the bits in one storage word.
pub(crate) const LOG2_WORD_BITS: u32 = 6;

/// Largest permitted `np`; tables beyond `2^(40 + 6)` bits are rejected.
pub(crate) const MAX_NP: u32 = 40;

/// Default hash seed used by the builder.
pub const DEFAULT_SEED: u64 = 9001;

/// A blocked Bloom filter over 64-bit item hashes.
///
/// The point of entry is a 64-bit integer: callers hash their objects first
/// (or use [`add_bytes`](Self::add_bytes) for byte strings). Each of the
/// filter's seeds, xored with the item and digested by the hash functor
/// `H`, contributes `64 / p` probe positions, where `2^p` is the table
/// size in bits.
///
/// Provides no false negatives, tunable false positive rate, bitwise set
/// algebra over filters with identical parameters, and cardinality and
/// Jaccard estimation.
///
/// # Examples
///
/// ```
/// use sketches::bloom::BloomFilter;
///
/// let mut filter = BloomFilter::new(10, 4, 137).unwrap();
/// filter.add(42);
/// assert!(filter.may_contain(42));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter<H = SplitMixHash> {
    /// log2 of the table size in words; 0 marks the unallocated state.
    np: u8,
    /// Number of probe bits tested/set per item.
    nh: u8,
    hasher: H,
    core: BitCore,
    seeds: Vec<u64>,
    seedseed: u64,
    mask: u64,
}

impl BloomFilter<SplitMixHash> {
    /// Creates a filter with `2^log2_bits` bits, `num_hashes` probes per
    /// item, and a deterministic seed sequence derived from `seed`.
    ///
    /// `log2_bits <= 6` produces an unallocated filter: queries return
    /// `false` and insertions are ignored until [`resize`](Self::resize).
    ///
    /// # Errors
    ///
    /// `Oversize` if `log2_bits > 46`; `ConfigInvalid` if `num_hashes` is
    /// zero.
    pub fn new(log2_bits: u32, num_hashes: u8, seed: u64) -> Result<Self, Error> {
        Self::with_hasher(log2_bits, num_hashes, seed, SplitMixHash)
    }

    /// Returns a builder for creating a Bloom filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use sketches::bloom::BloomFilter;
    ///
    /// let filter = BloomFilter::builder()
    ///     .log2_bits(12)
    ///     .expected_items(500)
    ///     .build()
    ///     .unwrap();
    /// assert!(filter.num_hashes() >= 1);
    /// ```
    pub fn builder() -> BloomFilterBuilder {
        BloomFilterBuilder::default()
    }
}

impl<H: IndexHasher> BloomFilter<H> {
    /// Creates a filter using a caller-supplied hash functor.
    pub fn with_hasher(
        log2_bits: u32,
        num_hashes: u8,
        seed: u64,
        hasher: H,
    ) -> Result<Self, Error> {
        let np = log2_bits.saturating_sub(LOG2_WORD_BITS);
        if np > MAX_NP {
            return Err(
                Error::new(ErrorKind::Oversize, "attempting to make a table that's too large")
                    .with_context("np", np)
                    .with_context("max_np", MAX_NP),
            );
        }
        if num_hashes == 0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "num_hashes must be at least 1",
            ));
        }
        let mut filter = Self {
            np: np as u8,
            nh: num_hashes,
            hasher,
            core: BitCore::default(),
            seeds: Vec::new(),
            seedseed: seed,
            mask: 0,
        };
        if np > 0 {
            filter.allocate(1u64 << (np + LOG2_WORD_BITS));
        }
        Ok(filter)
    }

    /// Reconstructs a filter from deserialized parts.
    pub(crate) fn from_parts(
        np: u8,
        nh: u8,
        hasher: H,
        core: BitCore,
        seeds: Vec<u64>,
        seedseed: u64,
        mask: u64,
    ) -> Self {
        Self {
            np,
            nh,
            hasher,
            core,
            seeds,
            seedseed,
            mask,
        }
    }

    fn allocate(&mut self, bits: u64) {
        self.core = BitCore::with_word_len((bits >> LOG2_WORD_BITS) as usize);
        self.mask = bits - 1;
        self.reseed();
    }

    fn reseed(&mut self) {
        self.seeds = schedule::generate_seeds(self.seedseed, self.p(), u32::from(self.nh));
    }

    // ========================================================================
    // Parameters and statistics
    // ========================================================================

    /// Table size in bits. Zero for an unallocated filter.
    pub fn m(&self) -> u64 {
        (self.core.word_len() as u64) << LOG2_WORD_BITS
    }

    /// log2 of the table size in bits.
    pub fn p(&self) -> u32 {
        u32::from(self.np) + LOG2_WORD_BITS
    }

    /// Number of probe bits per item.
    pub fn num_hashes(&self) -> u8 {
        self.nh
    }

    /// Bit-index mask, `m - 1`.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// The seed the hash-seed sequence is derived from.
    pub fn seed(&self) -> u64 {
        self.seedseed
    }

    /// The expanded hash-seed sequence.
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    /// True when the filter holds no storage.
    pub fn is_empty(&self) -> bool {
        self.core.is_unallocated()
    }

    /// `(struct bytes, heap bytes)` occupied by this filter.
    pub fn estimated_memory_usage(&self) -> (usize, usize) {
        (
            std::mem::size_of::<Self>(),
            self.core.word_len() * 8 + self.seeds.len() * 8,
        )
    }

    /// Number of set bits.
    pub fn popcount(&self) -> u64 {
        self.core.popcount()
    }

    /// True when `(np, nh, seedseed)` match, making set algebra valid.
    pub fn same_params(&self, other: &Self) -> bool {
        self.np == other.np && self.nh == other.nh && self.seedseed == other.seedseed
    }

    fn check_same_params(&self, other: &Self, op: &'static str) -> Result<(), Error> {
        if self.same_params(other) && self.core.word_len() == other.core.word_len() {
            return Ok(());
        }
        Err(Error::new(
            ErrorKind::ParameterMismatch,
            format!("cannot {op} filters with different parameters"),
        )
        .with_context("np", format!("{} vs {}", self.np, other.np))
        .with_context("nh", format!("{} vs {}", self.nh, other.nh))
        .with_context(
            "seedseed",
            format!("{} vs {}", self.seedseed, other.seedseed),
        ))
    }

    // ========================================================================
    // Insertion and membership
    // ========================================================================

    /// Stamps all `nh` probe bits for `value`. Ignored on an unallocated
    /// filter.
    pub fn add(&mut self, value: u64) {
        if self.core.is_unallocated() {
            return;
        }
        let p = self.p();
        for (si, count) in SeedChunks::new(u32::from(self.nh), p) {
            let digest = self.hasher.digest(value ^ self.seeds[si]);
            for t in 0..count {
                self.core.set((digest >> (t * p)) & self.mask);
            }
        }
    }

    /// Digests a byte string with xxh3-64 and inserts the result.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.add(xxh3_64(bytes));
    }

    /// Tests whether all `nh` probe bits for `value` are set.
    ///
    /// Returns `false` on the first unset bit; always `false` on an
    /// unallocated filter.
    pub fn may_contain(&self, value: u64) -> bool {
        if self.core.is_unallocated() {
            return false;
        }
        let p = self.p();
        for (si, count) in SeedChunks::new(u32::from(self.nh), p) {
            let digest = self.hasher.digest(value ^ self.seeds[si]);
            for t in 0..count {
                if !self.core.get((digest >> (t * p)) & self.mask) {
                    return false;
                }
            }
        }
        true
    }

    /// Reports containment as of entry, then stamps every probe bit.
    ///
    /// Unlike a `may_contain` followed by `add`, this walks the probe
    /// positions once. Every bit is set even after the first miss, so the
    /// post-state is identical to [`add`](Self::add).
    pub fn may_contain_and_add(&mut self, value: u64) -> bool {
        if self.core.is_unallocated() {
            return false;
        }
        let p = self.p();
        let mut present = true;
        for (si, count) in SeedChunks::new(u32::from(self.nh), p) {
            let digest = self.hasher.digest(value ^ self.seeds[si]);
            for t in 0..count {
                present &= self.core.test_and_set((digest >> (t * p)) & self.mask);
            }
        }
        present
    }

    /// Membership test for a batch, one result bit per item.
    ///
    /// Bit `i` of the result (word `i / 64`, bit `i % 64`) is set iff
    /// `values[i]` may be contained.
    pub fn batch_may_contain(&self, values: &[u64]) -> Vec<u64> {
        let mut out = vec![0u64; values.len().div_ceil(64)];
        for (i, &value) in values.iter().enumerate() {
            if self.may_contain(value) {
                out[i >> 6] |= 1u64 << (i & 63);
            }
        }
        out
    }

    // ========================================================================
    // Estimators
    // ========================================================================

    /// Estimates the number of distinct items inserted from the fill rate.
    ///
    /// With `c` set bits out of `m`, the estimate is
    /// `ln(1 - c/m) / (nh * ln(1 - 1/m))`.
    pub fn cardinality_estimate(&self) -> f64 {
        if self.core.is_unallocated() {
            return 0.0;
        }
        let m = self.m() as f64;
        let c = self.popcount() as f64;
        (-(c / m)).ln_1p() / (f64::from(self.nh) * (-1.0 / m).ln_1p())
    }

    /// Estimates the false positive rate from the observed fill rate,
    /// `(1 - c/m)^nh`. Does not require the count of inserted items.
    pub fn false_positive_estimate(&self) -> f64 {
        if self.core.is_unallocated() {
            return 0.0;
        }
        let m = self.m() as f64;
        let c = self.popcount() as f64;
        (1.0 - c / m).powi(i32::from(self.nh))
    }

    /// Number of bits set in both filters.
    pub fn intersection_popcount(&self, other: &Self) -> Result<u64, Error> {
        self.check_same_params(other, "intersect")?;
        Ok(self
            .core
            .words()
            .iter()
            .zip(other.core.words())
            .map(|(a, b)| u64::from((a & b).count_ones()))
            .sum())
    }

    /// Jaccard index computed directly on set bits:
    /// `(|A| + |B| - |A∪B|) / |A∪B|`.
    pub fn bitwise_jaccard(&self, other: &Self) -> Result<f64, Error> {
        self.check_same_params(other, "compare")?;
        let (sum_a, sum_b, sum_union) = self.popcount_sums(other);
        if sum_union == 0 {
            return Ok(0.0);
        }
        Ok((sum_a + sum_b - sum_union) as f64 / sum_union as f64)
    }

    /// Jaccard index computed through the cardinality estimator.
    ///
    /// Estimates `|A|`, `|B|` and `|A∪B|` from their popcounts, then
    /// returns `(n̂_A + n̂_B - n̂_U) / n̂_U`.
    pub fn jaccard_index(&self, other: &Self) -> Result<f64, Error> {
        self.check_same_params(other, "compare")?;
        if self.core.is_unallocated() {
            return Ok(0.0);
        }
        let (sum_a, sum_b, sum_union) = self.popcount_sums(other);
        if sum_union == 0 {
            return Ok(0.0);
        }
        let m = self.m() as f64;
        let denom = f64::from(self.nh) * (-1.0 / m).ln_1p();
        let estimate = |c: u64| (-(c as f64 / m)).ln_1p() / denom;
        let est_a = estimate(sum_a);
        let est_b = estimate(sum_b);
        let est_union = estimate(sum_union);
        Ok((est_a + est_b - est_union) / est_union)
    }

    // Three independent accumulators; the union count must never alias the
    // per-filter counts.
    fn popcount_sums(&self, other: &Self) -> (u64, u64, u64) {
        let mut sum_a = 0u64;
        let mut sum_b = 0u64;
        let mut sum_union = 0u64;
        for (a, b) in self.core.words().iter().zip(other.core.words()) {
            sum_a += u64::from(a.count_ones());
            sum_b += u64::from(b.count_ones());
            sum_union += u64::from((a | b).count_ones());
        }
        (sum_a, sum_b, sum_union)
    }

    // ========================================================================
    // Set algebra
    // ========================================================================

    /// Merges another filter into this one via bitwise OR.
    pub fn union_with(&mut self, other: &Self) -> Result<(), Error> {
        self.check_same_params(other, "union")?;
        self.core.or_with(&other.core);
        Ok(())
    }

    /// Intersects this filter with another via bitwise AND.
    pub fn intersect_with(&mut self, other: &Self) -> Result<(), Error> {
        self.check_same_params(other, "intersect")?;
        self.core.and_with(&other.core);
        Ok(())
    }

    /// Replaces this filter with the bitwise XOR of the pair.
    pub fn xor_with(&mut self, other: &Self) -> Result<(), Error> {
        self.check_same_params(other, "xor")?;
        self.core.xor_with(&other.core);
        Ok(())
    }

    /// Non-mutating union.
    pub fn union(&self, other: &Self) -> Result<Self, Error> {
        let mut out = self.clone();
        out.union_with(other)?;
        Ok(out)
    }

    /// Non-mutating intersection.
    pub fn intersection(&self, other: &Self) -> Result<Self, Error> {
        let mut out = self.clone();
        out.intersect_with(other)?;
        Ok(out)
    }

    /// Non-mutating symmetric difference.
    pub fn xor(&self, other: &Self) -> Result<Self, Error> {
        let mut out = self.clone();
        out.xor_with(other)?;
        Ok(out)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Clears the filter and re-allocates it at `new_bits` rounded up to
    /// the next power of two (minimum 64). The seed sequence is
    /// regenerated for the new table size.
    pub fn resize(&mut self, new_bits: u64) -> Result<(), Error> {
        let bits = new_bits.max(64).next_power_of_two();
        let np = bits.trailing_zeros() - LOG2_WORD_BITS;
        if np > MAX_NP {
            return Err(
                Error::new(ErrorKind::Oversize, "attempting to resize a table too large")
                    .with_context("np", np)
                    .with_context("max_np", MAX_NP),
            );
        }
        self.np = np as u8;
        self.allocate(bits);
        Ok(())
    }

    /// OR-folds the upper half of the table onto the lower half, halving
    /// the table size and decrementing `np`.
    ///
    /// The seed sequence is intentionally untouched: seeds are independent
    /// of the table size beyond the mask. A bit is set in the halved
    /// filter iff it was set at either mirror position before.
    pub fn halve(&mut self) {
        if self.np == 0 || self.core.word_len() < 2 {
            return;
        }
        self.core.fold_half();
        self.np -= 1;
        self.mask = self.m() - 1;
    }

    /// Zeros the table, keeping size and parameters.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Releases the table storage but keeps all parameters.
    pub fn free(&mut self) {
        self.core = BitCore::default();
    }

    /// A fresh, zeroed filter with this filter's parameters.
    pub fn clone_empty(&self) -> Self {
        let mut out = Self {
            np: self.np,
            nh: self.nh,
            hasher: self.hasher.clone(),
            core: BitCore::default(),
            seeds: Vec::new(),
            seedseed: self.seedseed,
            mask: 0,
        };
        if self.np > 0 {
            out.allocate(1u64 << out.p());
        }
        out
    }

    // ========================================================================
    // Enumeration
    // ========================================================================

    /// Invokes `f` with every set bit index in ascending order.
    pub fn for_each_set_bit<F: FnMut(u64)>(&self, f: F) {
        self.core.for_each_set_bit(f);
    }

    /// Collects the set bit positions in ascending order.
    pub fn to_sparse(&self) -> Vec<u64> {
        let mut out = Vec::new();
        self.for_each_set_bit(|b| out.push(b));
        out
    }

    pub(crate) fn core(&self) -> &BitCore {
        &self.core
    }

    pub(crate) fn hasher(&self) -> &H {
        &self.hasher
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating [`BloomFilter`] instances.
///
/// `log2_bits` is required. The probe count comes from `num_hashes`, or is
/// derived from `expected_items` when only a cardinality target is known.
#[derive(Debug, Clone)]
pub struct BloomFilterBuilder {
    log2_bits: Option<u32>,
    num_hashes: Option<u8>,
    expected_items: Option<u64>,
    seed: u64,
}

impl Default for BloomFilterBuilder {
    fn default() -> Self {
        BloomFilterBuilder {
            log2_bits: None,
            num_hashes: None,
            expected_items: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl BloomFilterBuilder {
    /// Sets the table size to `2^log2_bits` bits.
    pub fn log2_bits(mut self, log2_bits: u32) -> Self {
        self.log2_bits = Some(log2_bits);
        self
    }

    /// Sets the number of probe bits per item.
    pub fn num_hashes(mut self, num_hashes: u8) -> Self {
        self.num_hashes = Some(num_hashes);
        self
    }

    /// Derives the probe count for an expected distinct-item count.
    pub fn expected_items(mut self, expected_items: u64) -> Self {
        self.expected_items = Some(expected_items);
        self
    }

    /// Sets a custom hash seed (default: 9001).
    ///
    /// Filters with different seeds cannot be combined.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Optimal probe count for a `2^log2_bits`-bit table expected to hold
    /// `est_cardinality` items: `ceil(ln 2 * m / n)`, clamped to `1..=255`.
    pub fn suggest_num_hashes(log2_bits: u32, est_cardinality: u64) -> u8 {
        assert!(est_cardinality > 0, "est_cardinality must be at least 1");
        let bits = (1u64 << log2_bits) as f64;
        let k = (std::f64::consts::LN_2 * bits / est_cardinality as f64).ceil();
        k.clamp(1.0, 255.0) as u8
    }

    /// Builds the Bloom filter.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` if `log2_bits` was never set; `Oversize` for tables
    /// beyond the supported range.
    pub fn build(self) -> Result<BloomFilter, Error> {
        let log2_bits = self.log2_bits.ok_or_else(|| {
            Error::new(ErrorKind::ConfigInvalid, "log2_bits must be set before build")
        })?;
        let num_hashes = match self.num_hashes {
            Some(nh) => nh,
            None => match self.expected_items {
                Some(n) => Self::suggest_num_hashes(log2_bits, n),
                None => 1,
            },
        };
        BloomFilter::new(log2_bits, num_hashes, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_contains() {
        let mut filter = BloomFilter::new(10, 4, 137).unwrap();
        assert!(!filter.may_contain(42));
        filter.add(42);
        assert!(filter.may_contain(42));
        let pc = filter.popcount();
        assert!(pc >= 1 && pc <= 4, "popcount {pc} out of range");
    }

    #[test]
    fn test_partial_final_seed_chunk() {
        // p = 12 packs 5 sub-hashes per digest; nh = 7 leaves a 2-hash tail.
        let mut filter = BloomFilter::new(12, 7, 3).unwrap();
        assert_eq!(filter.seeds().len(), 2);
        for i in 0..100u64 {
            filter.add(i);
        }
        for i in 0..100u64 {
            assert!(filter.may_contain(i));
        }
    }

    #[test]
    fn test_may_contain_and_add_stamps_all_bits() {
        let mut probed = BloomFilter::new(10, 6, 11).unwrap();
        let mut added = BloomFilter::new(10, 6, 11).unwrap();
        assert!(!probed.may_contain_and_add(1234));
        added.add(1234);
        // Post-state must match a plain add even though the item was absent.
        assert_eq!(probed, added);
        assert!(probed.may_contain_and_add(1234));
    }

    #[test]
    fn test_unallocated_filter_behavior() {
        let mut filter = BloomFilter::new(6, 3, 1).unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.m(), 0);
        assert_eq!(filter.popcount(), 0);
        filter.add(9);
        assert!(!filter.may_contain(9));
        assert!(!filter.may_contain_and_add(9));
        assert_eq!(filter.cardinality_estimate(), 0.0);
    }

    #[test]
    fn test_oversize_rejected() {
        let err = BloomFilter::new(47, 1, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Oversize);
        let mut filter = BloomFilter::new(10, 1, 0).unwrap();
        let err = filter.resize(1u64 << 47).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Oversize);
    }

    #[test]
    fn test_zero_hashes_rejected() {
        let err = BloomFilter::new(10, 0, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_resize_rounds_up_and_clears() {
        let mut filter = BloomFilter::new(8, 2, 5).unwrap();
        filter.add(1);
        filter.resize(1000).unwrap();
        assert_eq!(filter.m(), 1024);
        assert_eq!(filter.p(), 10);
        assert_eq!(filter.popcount(), 0);
        assert_eq!(filter.mask(), 1023);
    }

    #[test]
    fn test_clone_empty_same_params() {
        let mut filter = BloomFilter::new(9, 3, 21).unwrap();
        filter.add(7);
        let fresh = filter.clone_empty();
        assert!(filter.same_params(&fresh));
        assert_eq!(fresh.popcount(), 0);
        assert_eq!(fresh.seeds(), filter.seeds());
    }

    #[test]
    fn test_free_keeps_parameters() {
        let mut filter = BloomFilter::new(9, 3, 21).unwrap();
        filter.add(7);
        filter.free();
        assert!(filter.is_empty());
        assert_eq!(filter.num_hashes(), 3);
        assert_eq!(filter.seed(), 21);
        assert!(!filter.may_contain(7));
    }

    #[test]
    fn test_suggest_num_hashes() {
        // ln 2 * 1024 / 100 = 7.09..., rounded up.
        assert_eq!(BloomFilterBuilder::suggest_num_hashes(10, 100), 8);
        assert_eq!(BloomFilterBuilder::suggest_num_hashes(10, 1 << 20), 1);
        assert_eq!(BloomFilterBuilder::suggest_num_hashes(20, 1), 255);
    }

    #[test]
    fn test_builder() {
        let filter = BloomFilter::builder()
            .log2_bits(11)
            .num_hashes(5)
            .seed(77)
            .build()
            .unwrap();
        assert_eq!(filter.m(), 2048);
        assert_eq!(filter.num_hashes(), 5);
        assert_eq!(filter.seed(), 77);

        let err = BloomFilter::builder().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_add_bytes() {
        let mut filter = BloomFilter::new(10, 4, 137).unwrap();
        filter.add_bytes(b"shandy");
        assert!(filter.may_contain(xxh3_64(b"shandy")));
    }
}
