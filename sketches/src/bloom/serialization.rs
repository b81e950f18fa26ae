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

//! Byte-exact filter serialization.
//!
//! Little-endian, byte-packed, no padding:
//!
//! | field         | size              |
//! |---------------|-------------------|
//! | `np`          | 1                 |
//! | `nh`          | 1                 |
//! | `seed_count`  | 1                 |
//! | functor state | `H::STATE_BYTES`  |
//! | `seedseed`    | 8                 |
//! | `mask`        | 8                 |
//! | seeds         | `seed_count * 8`  |
//! | words         | `m / 64 * 8`      |
//!
//! The word segment is empty for an unallocated filter (`mask == 0`).

use std::io::Read;
use std::io::Write;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::bloom::bit_core::BitCore;
use crate::bloom::sketch::BloomFilter;
use crate::bloom::sketch::LOG2_WORD_BITS;
use crate::bloom::sketch::MAX_NP;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::hash::IndexHasher;

/// Serialization records the seed count in a single byte.
const MAX_SERIALIZED_SEEDS: usize = 255;

fn write_error(bytes_written: usize) -> impl FnOnce(std::io::Error) -> Error {
    move |src| {
        Error::new(ErrorKind::Io, "failed writing bloom filter")
            .with_context("bytes_written", bytes_written)
            .set_source(src)
    }
}

fn read_error(bytes_read: usize) -> impl FnOnce(std::io::Error) -> Error {
    move |src| {
        Error::new(ErrorKind::Io, "failed reading bloom filter")
            .with_context("bytes_read", bytes_read)
            .set_source(src)
    }
}

impl<H: IndexHasher> BloomFilter<H> {
    /// Number of bytes [`write`](Self::write) will emit for this filter.
    pub fn serialized_size(&self) -> usize {
        3 + H::STATE_BYTES + 8 + 8 + self.seeds().len() * 8 + self.core().word_len() * 8
    }

    /// Writes the filter to a byte sink, returning the bytes written.
    ///
    /// # Errors
    ///
    /// `TooManySeeds` when the seed sequence exceeds 255 entries,
    /// `ConfigInvalid` when the storage was freed, `Io` on sink failure
    /// (with the byte count reached in context).
    pub fn write<W: Write>(&self, out: &mut W) -> Result<usize, Error> {
        if self.seeds().len() > MAX_SERIALIZED_SEEDS {
            return Err(Error::new(
                ErrorKind::TooManySeeds,
                "serialization only allows up to 255 seeds",
            )
            .with_context("seed_count", self.seeds().len()));
        }
        let expected_words = if self.mask() == 0 {
            0
        } else {
            ((self.mask() + 1) >> LOG2_WORD_BITS) as usize
        };
        if self.core().word_len() != expected_words {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "filter storage does not match its mask; cannot serialize a freed filter",
            ));
        }

        let np = (self.p() - LOG2_WORD_BITS) as u8;
        let mut written = 0usize;
        out.write_u8(np).map_err(write_error(written))?;
        written += 1;
        out.write_u8(self.num_hashes()).map_err(write_error(written))?;
        written += 1;
        out.write_u8(self.seeds().len() as u8)
            .map_err(write_error(written))?;
        written += 1;
        self.hasher()
            .write_state(out)
            .map_err(write_error(written))?;
        written += H::STATE_BYTES;
        out.write_u64::<LittleEndian>(self.seed())
            .map_err(write_error(written))?;
        written += 8;
        out.write_u64::<LittleEndian>(self.mask())
            .map_err(write_error(written))?;
        written += 8;
        for &seed in self.seeds() {
            out.write_u64::<LittleEndian>(seed)
                .map_err(write_error(written))?;
            written += 8;
        }
        for &word in self.core().words() {
            out.write_u64::<LittleEndian>(word)
                .map_err(write_error(written))?;
            written += 8;
        }
        Ok(written)
    }

    /// Reads a filter back from a byte source.
    ///
    /// # Errors
    ///
    /// `Io` on a short or failing source, `Oversize` for an out-of-range
    /// `np`, `ConfigInvalid` for internally inconsistent fields.
    pub fn read<R: Read>(input: &mut R) -> Result<Self, Error> {
        let mut consumed = 0usize;
        let np = input.read_u8().map_err(read_error(consumed))?;
        consumed += 1;
        let nh = input.read_u8().map_err(read_error(consumed))?;
        consumed += 1;
        let seed_count = input.read_u8().map_err(read_error(consumed))?;
        consumed += 1;
        if u32::from(np) > MAX_NP {
            return Err(Error::new(ErrorKind::Oversize, "serialized np out of range")
                .with_context("np", np));
        }
        if nh == 0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "serialized filter has zero hashes",
            ));
        }

        let hasher = H::read_state(input).map_err(read_error(consumed))?;
        consumed += H::STATE_BYTES;
        let seedseed = input
            .read_u64::<LittleEndian>()
            .map_err(read_error(consumed))?;
        consumed += 8;
        let mask = input
            .read_u64::<LittleEndian>()
            .map_err(read_error(consumed))?;
        consumed += 8;

        let mut seeds = Vec::with_capacity(usize::from(seed_count));
        for _ in 0..seed_count {
            seeds.push(
                input
                    .read_u64::<LittleEndian>()
                    .map_err(read_error(consumed))?,
            );
            consumed += 8;
        }

        if mask != 0 && !(mask + 1).is_power_of_two() {
            return Err(
                Error::new(ErrorKind::ConfigInvalid, "serialized mask is not 2^p - 1")
                    .with_context("mask", mask),
            );
        }
        if np > 0 && mask + 1 != 1u64 << (u32::from(np) + LOG2_WORD_BITS) {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "serialized mask does not match np",
            )
            .with_context("np", np)
            .with_context("mask", mask));
        }

        let num_words = if mask == 0 {
            0
        } else {
            ((mask + 1) >> LOG2_WORD_BITS) as usize
        };
        let mut words = Vec::with_capacity(num_words);
        for _ in 0..num_words {
            words.push(
                input
                    .read_u64::<LittleEndian>()
                    .map_err(read_error(consumed))?,
            );
            consumed += 8;
        }

        Ok(Self::from_parts(
            np,
            nh,
            hasher,
            BitCore::from_words(words),
            seeds,
            seedseed,
            mask,
        ))
    }

    /// Serializes the filter to a byte vector.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::with_capacity(self.serialized_size());
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    /// Deserializes a filter from a byte slice.
    pub fn deserialize(mut bytes: &[u8]) -> Result<Self, Error> {
        Self::read(&mut bytes)
    }
}
