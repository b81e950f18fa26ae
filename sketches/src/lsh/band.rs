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

//! Band keys: one digest per `(table, row)` coordinate of a sketch.
//!
//! A band covering at least four registers that fits inside the sketch is
//! digested as a contiguous window, an exact substring fingerprint. Bands
//! that would fall off the end, or are too short for the one-shot digest's
//! preferred input width, instead digest registers at seed-dependent
//! pseudo-random positions.

use xxhash_rust::xxh3::xxh3_64;
use xxhash_rust::xxh64::Xxh64;

use crate::common::FastDivisor;
use crate::lsh::view::SketchRegister;
use crate::lsh::view::SketchView;

/// Shortest register window digested contiguously.
const MIN_CONTIGUOUS_REGS: usize = 4;

#[inline]
fn wymum(x: u64, y: u64) -> u64 {
    let product = u128::from(x) * u128::from(y);
    (product as u64) ^ ((product >> 64) as u64)
}

/// One round of the stateless wyhash mixer; advances `state` in place.
#[inline]
pub(crate) fn wyhash64_stateless(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x60be_e2be_e120_fc15);
    wymum(*state ^ 0xe703_7ed1_a0b4_28db, *state)
}

/// Computes the key for band `(table, row)` of `sketch`.
///
/// `regs` is the number of registers reduced into the key and `div` the
/// precomputed divisor for the sketch length.
pub(crate) fn band_key<V>(sketch: &V, table: usize, row: usize, regs: usize, div: &FastDivisor) -> u64
where
    V: SketchView + ?Sized,
{
    let m = sketch.len();
    if regs >= MIN_CONTIGUOUS_REGS && (row + 1) * regs <= m {
        let start = row * regs;
        let mut window = Vec::new();
        sketch.extend_range_le(start..start + regs, &mut window);
        return xxh3_64(&window);
    }

    // Sampled band: the digest seed and the position stream both derive
    // from the band coordinates.
    let seed = ((table as u64) << 32) | row as u64;
    let mut digest = Xxh64::new(seed);
    let mut state = seed;
    let mut register = Vec::with_capacity(V::Register::BYTES);
    for _ in 0..regs {
        let drawn = wyhash64_stateless(&mut state) as u32;
        let index = div.rem(drawn) as usize;
        register.clear();
        sketch.register(index).extend_le(&mut register);
        digest.update(&register);
    }
    digest.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sketch16(len: usize) -> Vec<u16> {
        (0..len).map(|i| (i as u16).wrapping_mul(2654_u16) ^ 0x1234).collect()
    }

    #[test]
    fn test_contiguous_matches_one_shot_digest() {
        let regs = sketch16(64);
        let div = FastDivisor::new(64);
        // Table with 8 registers per key, row 2 -> registers 16..24.
        let key = band_key(&regs[..], 3, 2, 8, &div);
        let mut window = Vec::new();
        for &r in &regs[16..24] {
            window.extend_from_slice(&r.to_le_bytes());
        }
        assert_eq!(key, xxh3_64(&window));
    }

    #[test]
    fn test_contiguous_key_ignores_table_index() {
        // Contiguous windows are substring fingerprints; only the window
        // contents matter.
        let regs = sketch16(64);
        let div = FastDivisor::new(64);
        assert_eq!(
            band_key(&regs[..], 1, 0, 8, &div),
            band_key(&regs[..], 5, 0, 8, &div)
        );
    }

    #[test]
    fn test_sampled_key_depends_on_band_coordinates() {
        let regs = sketch16(60);
        let div = FastDivisor::new(60);
        // regs = 2 is below the contiguous threshold.
        let a = band_key(&regs[..], 0, 0, 2, &div);
        let b = band_key(&regs[..], 0, 1, 2, &div);
        let c = band_key(&regs[..], 1, 0, 2, &div);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_sampled_mode_when_window_overruns() {
        // 7 registers per key over 60 registers: row 8 would end at 63.
        let regs = sketch16(60);
        let div = FastDivisor::new(60);
        let key1 = band_key(&regs[..], 0, 8, 7, &div);
        let key2 = band_key(&regs[..], 0, 8, 7, &div);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_keys_are_deterministic_across_views() {
        let regs = sketch16(32);
        let copy = regs.clone();
        let div = FastDivisor::new(32);
        for (table, row, r) in [(0usize, 0usize, 1usize), (1, 3, 2), (2, 1, 8)] {
            assert_eq!(
                band_key(&regs[..], table, row, r, &div),
                band_key(&copy[..], table, row, r, &div)
            );
        }
    }

    #[test]
    fn test_wyhash_mixer_stream() {
        let mut a = 7u64;
        let mut b = 7u64;
        let first = wyhash64_stateless(&mut a);
        assert_eq!(first, wyhash64_stateless(&mut b));
        // The state advances, so consecutive draws differ.
        assert_ne!(first, wyhash64_stateless(&mut a));
    }
}
