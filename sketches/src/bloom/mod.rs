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

//! Blocked Bloom filter over 64-bit item hashes.
//!
//! The filter expands each seeded digest into several probe positions by
//! shift-stamping, so one strong hash covers `64 / p` of the `nh` probes.
//! Filters constructed with the same `(log2_bits, num_hashes, seed)` can be
//! combined with bitwise set algebra and compared with cardinality and
//! Jaccard estimators.
//!
//! # Usage
//!
//! ```rust
//! use sketches::bloom::BloomFilter;
//!
//! let mut a = BloomFilter::new(12, 4, 7).unwrap();
//! let mut b = BloomFilter::new(12, 4, 7).unwrap();
//! for i in 0..1000u64 {
//!     a.add(i);
//!     b.add(i + 500);
//! }
//!
//! assert!(a.may_contain(999));
//! let overlap = a.bitwise_jaccard(&b).unwrap();
//! assert!(overlap > 0.0 && overlap < 1.0);
//! ```

mod bit_core;
mod schedule;
mod serialization;
mod sketch;

pub use self::sketch::BloomFilter;
pub use self::sketch::BloomFilterBuilder;
pub use self::sketch::DEFAULT_SEED;
