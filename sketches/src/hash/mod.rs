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

//! Pluggable 64-bit hash functors for the Bloom filter.
//!
//! The filter is generic over an [`IndexHasher`]; the functor turns
//! `item ^ seed` into a digest whose bits are consumed as table indices.
//! Functors may carry state (for example precomputed keys), which travels
//! with the filter through serialization as a fixed-size blob.

use std::io;
use std::io::Read;
use std::io::Write;

/// A deterministic `u64 -> u64` digest used to derive filter bit indices.
///
/// Implementations must be pure: the same input always produces the same
/// output, across processes and releases. Stateful functors serialize their
/// state as exactly [`STATE_BYTES`](Self::STATE_BYTES) bytes.
pub trait IndexHasher: Clone {
    /// Serialized size of the functor state in bytes.
    const STATE_BYTES: usize;

    /// Digests a single 64-bit value.
    fn digest(&self, value: u64) -> u64;

    /// Writes the functor state, exactly `STATE_BYTES` bytes.
    fn write_state<W: Write>(&self, out: &mut W) -> io::Result<()>;

    /// Reads the functor state back, consuming exactly `STATE_BYTES` bytes.
    fn read_state<R: Read>(input: &mut R) -> io::Result<Self>;
}

/// Stateless default functor: the SplitMix64 finalizer.
///
/// A bijection on `u64`, so distinct `item ^ seed` inputs can never collide
/// before the sub-hash masking step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitMixHash;

impl SplitMixHash {
    /// One SplitMix64 step: add the golden-gamma increment, then mix.
    #[inline]
    pub fn mix(mut x: u64) -> u64 {
        x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
        x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        x ^ (x >> 31)
    }
}

impl IndexHasher for SplitMixHash {
    const STATE_BYTES: usize = 0;

    #[inline]
    fn digest(&self, value: u64) -> u64 {
        Self::mix(value)
    }

    fn write_state<W: Write>(&self, _out: &mut W) -> io::Result<()> {
        Ok(())
    }

    fn read_state<R: Read>(_input: &mut R) -> io::Result<Self> {
        Ok(SplitMixHash)
    }
}
