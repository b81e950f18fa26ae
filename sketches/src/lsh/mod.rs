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

//! Banded LSH index over fixed-length integer sketches.
//!
//! Sketches are borrowed read-only through [`SketchView`]; each banded
//! table reduces a window of sketch registers to one key and stores ids in
//! posting lists. Queries surface candidates from the most specific bands
//! first, so truncating the result keeps the highest-precision matches.
//!
//! # Usage
//!
//! ```rust
//! use sketches::lsh::SetSketchIndex;
//!
//! let mut index = SetSketchIndex::new(16).unwrap();
//! let a: Vec<u16> = (0..16).collect();
//! let b: Vec<u16> = (8..24).collect();
//! index.insert(&a[..]).unwrap();
//! index.insert(&b[..]).unwrap();
//!
//! let found = index.query_candidates(&a[..], 10).unwrap();
//! assert_eq!(found.ids.first(), Some(&0));
//! ```

mod band;
mod index;
mod view;

pub use self::index::Candidates;
pub use self::index::SetSketchIndex;
pub use self::view::SketchRegister;
pub use self::view::SketchView;
