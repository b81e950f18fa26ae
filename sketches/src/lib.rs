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

//! Probabilistic sketch cores for approximate set analytics.
//!
//! The crate exposes two tightly coupled structures:
//! - [`bloom::BloomFilter`], a blocked Bloom filter over 64-bit item
//!   hashes with set algebra, cardinality/Jaccard estimation and
//!   byte-exact serialization.
//! - [`lsh::SetSketchIndex`], a banded LSH index over fixed-length
//!   integer sketches with precision-ordered candidate retrieval.
//!
//! Both are single-writer structures: share them across threads only
//! behind external synchronization, or immutably once loading is done.

pub mod bloom;
pub mod common;
pub mod error;
pub mod hash;
pub mod lsh;
