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

use std::collections::HashMap;

use crate::common::FastDivisor;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::lsh::band;
use crate::lsh::view::SketchView;

type PostingMap = HashMap<u64, Vec<u32>>;

/// Candidate ids returned by a query, most specific first.
///
/// `per_table` records, for each table visited (in traversal order, most
/// specific first), how many ids that table contributed to `ids`; the
/// counts partition `ids` exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    /// Matching ids in first-seen order.
    pub ids: Vec<u32>,
    /// Newly surfaced ids per visited table.
    pub per_table: Vec<u32>,
}

/// An LSH index over fixed-length register sketches.
///
/// Maintains one banded hash table per entry of the register schedule:
/// table `i` reduces `r_i` sketch positions per key across its rows, and
/// tables with larger `r_i` (fewer, more specific bands) sit at higher
/// indices. Queries walk the tables from most specific to least specific,
/// so the earliest candidates carry the highest precision and callers can
/// truncate freely.
///
/// # Usage
///
/// ```rust
/// use sketches::lsh::SetSketchIndex;
///
/// let mut index = SetSketchIndex::new(64).unwrap();
/// let sketch: Vec<u16> = (0..64).collect();
/// let id = index.insert(&sketch[..]).unwrap();
///
/// let found = index.query_candidates(&sketch[..], 10).unwrap();
/// assert!(found.ids.contains(&id));
/// ```
#[derive(Debug, Clone)]
pub struct SetSketchIndex {
    m: usize,
    regs_per_reg: Vec<u64>,
    packed_maps: Vec<Vec<PostingMap>>,
    divisor: FastDivisor,
    total_ids: usize,
}

impl SetSketchIndex {
    /// Power-of-two mode: tables with `r ∈ {1, 2, 4, ... <= m}`.
    pub fn new(m: usize) -> Result<Self, Error> {
        let mut regs = Vec::new();
        let mut r = 1u64;
        while r <= m as u64 {
            regs.push(r);
            r <<= 1;
        }
        Self::with_schedule_checked(m, regs, None)
    }

    /// Densified mode: tables with `r ∈ {1, 2, 3, ..., m}`.
    pub fn new_densified(m: usize) -> Result<Self, Error> {
        let regs = (1..=m as u64).collect();
        Self::with_schedule_checked(m, regs, None)
    }

    /// Builds tables for a caller-supplied register schedule; table `i`
    /// gets `m / regs[i]` rows.
    pub fn with_schedule(m: usize, regs: &[u64]) -> Result<Self, Error> {
        Self::with_schedule_checked(m, regs.to_vec(), None)
    }

    /// Like [`with_schedule`](Self::with_schedule) with explicit per-table
    /// row counts; a zero entry falls back to `m / regs[i]`.
    pub fn with_schedule_rows(m: usize, regs: &[u64], rows: &[usize]) -> Result<Self, Error> {
        if regs.len() != rows.len() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "register schedule and row counts must have the same length",
            )
            .with_context("regs", regs.len())
            .with_context("rows", rows.len()));
        }
        Self::with_schedule_checked(m, regs.to_vec(), Some(rows))
    }

    fn with_schedule_checked(
        m: usize,
        regs: Vec<u64>,
        rows: Option<&[usize]>,
    ) -> Result<Self, Error> {
        if m == 0 || m > u32::MAX as usize {
            return Err(
                Error::new(ErrorKind::ConfigInvalid, "sketch length out of range")
                    .with_context("m", m),
            );
        }
        for &r in &regs {
            if r == 0 || r > m as u64 {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "cannot create LSH keys with a band wider than the sketch",
                )
                .with_context("regs_per_key", r)
                .with_context("m", m));
            }
        }
        let packed_maps = regs
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let default_rows = m / r as usize;
                let nrows = match rows {
                    Some(rows) if rows[i] > 0 => rows[i],
                    _ => default_rows,
                };
                vec![PostingMap::new(); nrows]
            })
            .collect();
        Ok(Self {
            m,
            regs_per_reg: regs,
            packed_maps,
            divisor: FastDivisor::new(m as u32),
            total_ids: 0,
        })
    }

    /// Sketch length every inserted or queried sketch must match.
    pub fn m(&self) -> usize {
        self.m
    }

    /// Number of sketches inserted so far.
    pub fn size(&self) -> usize {
        self.total_ids
    }

    /// Number of banded tables.
    pub fn ntables(&self) -> usize {
        self.packed_maps.len()
    }

    fn check_shape<V: SketchView + ?Sized>(&self, sketch: &V) -> Result<(), Error> {
        if sketch.len() != self.m {
            return Err(Error::new(ErrorKind::ShapeMismatch, "sketch has wrong length")
                .with_context("expected", self.m)
                .with_context("actual", sketch.len()));
        }
        Ok(())
    }

    /// Inserts a sketch, returning its assigned id.
    ///
    /// Ids are handed out monotonically from zero in insertion order. All
    /// band keys are computed before the first posting list is touched, so
    /// a failed insert leaves the index unmodified.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `sketch.len() != m()`.
    pub fn insert<V: SketchView + ?Sized>(&mut self, sketch: &V) -> Result<u32, Error> {
        self.check_shape(sketch)?;
        if self.total_ids > u32::MAX as usize {
            return Err(Error::new(ErrorKind::ConfigInvalid, "id space exhausted"));
        }

        let keys: Vec<Vec<u64>> = self
            .packed_maps
            .iter()
            .enumerate()
            .map(|(i, rows)| {
                let regs = self.regs_per_reg[i] as usize;
                (0..rows.len())
                    .map(|j| band::band_key(sketch, i, j, regs, &self.divisor))
                    .collect()
            })
            .collect();

        let id = self.total_ids as u32;
        for (rows, row_keys) in self.packed_maps.iter_mut().zip(keys) {
            for (map, key) in rows.iter_mut().zip(row_keys) {
                map.entry(key).or_default().push(id);
            }
        }
        self.total_ids += 1;
        Ok(id)
    }

    /// Retrieves candidate ids for `sketch`, most specific table first.
    ///
    /// Walks tables from the highest index down, stopping after the table
    /// that brings the candidate count to `max_candidates` or beyond.
    pub fn query_candidates<V: SketchView + ?Sized>(
        &self,
        sketch: &V,
        max_candidates: usize,
    ) -> Result<Candidates, Error> {
        self.query_candidates_from(sketch, max_candidates, self.ntables())
    }

    /// [`query_candidates`](Self::query_candidates) restricted to tables
    /// below `starting_table`.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` on sketch length mismatch; `ConfigInvalid` when
    /// `starting_table > ntables()`.
    pub fn query_candidates_from<V: SketchView + ?Sized>(
        &self,
        sketch: &V,
        max_candidates: usize,
        starting_table: usize,
    ) -> Result<Candidates, Error> {
        self.check_shape(sketch)?;
        if starting_table > self.ntables() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "starting table out of range",
            )
            .with_context("starting_table", starting_table)
            .with_context("ntables", self.ntables()));
        }

        let capacity_hint = max_candidates.min(self.total_ids as usize);
        let mut tallies: HashMap<u32, u32> = HashMap::with_capacity(capacity_hint);
        let mut ids: Vec<u32> = Vec::with_capacity(capacity_hint);
        let mut per_table: Vec<u32> = Vec::with_capacity(starting_table);
        for i in (0..starting_table).rev() {
            let rows = &self.packed_maps[i];
            let regs = self.regs_per_reg[i] as usize;
            let before = ids.len();
            for (j, map) in rows.iter().enumerate() {
                let key = band::band_key(sketch, i, j, regs, &self.divisor);
                let Some(list) = map.get(&key) else {
                    continue;
                };
                for &id in list {
                    tallies
                        .entry(id)
                        .and_modify(|hits| *hits += 1)
                        .or_insert_with(|| {
                            ids.push(id);
                            1
                        });
                }
            }
            per_table.push((ids.len() - before) as u32);
            if ids.len() >= max_candidates {
                break;
            }
        }
        Ok(Candidates { ids, per_table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sketch(fill: u16, len: usize) -> Vec<u16> {
        (0..len).map(|i| fill.wrapping_add(i as u16)).collect()
    }

    #[test]
    fn test_power_of_two_schedule() {
        let index = SetSketchIndex::new(64).unwrap();
        assert_eq!(index.ntables(), 7); // r = 1, 2, 4, 8, 16, 32, 64
        assert_eq!(index.m(), 64);
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn test_densified_schedule() {
        let index = SetSketchIndex::new_densified(16).unwrap();
        assert_eq!(index.ntables(), 16);
    }

    #[test]
    fn test_custom_schedule_validation() {
        assert!(SetSketchIndex::with_schedule(32, &[1, 8, 32]).is_ok());
        let err = SetSketchIndex::with_schedule(32, &[33]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        let err = SetSketchIndex::with_schedule(32, &[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        let err = SetSketchIndex::with_schedule_rows(32, &[1, 2], &[4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_zero_length_rejected() {
        let err = SetSketchIndex::new(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let mut index = SetSketchIndex::new(32).unwrap();
        for expected in 0..5u32 {
            let id = index.insert(&sketch(expected as u16, 32)[..]).unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(index.size(), 5);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut index = SetSketchIndex::new(64).unwrap();
        let err = index.insert(&sketch(0, 63)[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(index.size(), 0);

        let err = index.query_candidates(&sketch(0, 63)[..], 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_self_recall() {
        let mut index = SetSketchIndex::new(64).unwrap();
        for fill in 0..4u16 {
            index.insert(&sketch(fill.wrapping_mul(977), 64)[..]).unwrap();
        }
        for (expected, fill) in (0..4u16).enumerate() {
            let found = index
                .query_candidates(&sketch(fill.wrapping_mul(977), 64)[..], 1)
                .unwrap();
            assert!(found.ids.contains(&(expected as u32)));
        }
    }

    #[test]
    fn test_most_specific_match_first() {
        let mut index = SetSketchIndex::new(64).unwrap();
        index.insert(&sketch(1, 64)[..]).unwrap();
        index.insert(&sketch(2, 64)[..]).unwrap();
        // The full-width band of an inserted sketch matches only itself, so
        // the query's own id must surface before any other candidate.
        let found = index.query_candidates(&sketch(2, 64)[..], usize::MAX).unwrap();
        assert_eq!(found.ids.first(), Some(&1));
    }

    #[test]
    fn test_per_table_counts_partition_ids() {
        let mut index = SetSketchIndex::new(32).unwrap();
        for fill in 0..6u16 {
            index.insert(&sketch(fill, 32)[..]).unwrap();
        }
        let found = index.query_candidates(&sketch(3, 32)[..], usize::MAX).unwrap();
        let total: u32 = found.per_table.iter().sum();
        assert_eq!(total as usize, found.ids.len());
        assert_eq!(found.per_table.len(), index.ntables());
    }

    #[test]
    fn test_early_stop_after_table() {
        let mut index = SetSketchIndex::new(32).unwrap();
        let probe = sketch(9, 32);
        index.insert(&probe[..]).unwrap();
        let found = index.query_candidates(&probe[..], 1).unwrap();
        // The most specific table already matches, so traversal stops there.
        assert_eq!(found.per_table.len(), 1);
        assert_eq!(found.ids, vec![0]);
    }

    #[test]
    fn test_starting_table_restricts_traversal() {
        let mut index = SetSketchIndex::new(32).unwrap();
        let probe = sketch(5, 32);
        index.insert(&probe[..]).unwrap();
        let found = index
            .query_candidates_from(&probe[..], usize::MAX, 1)
            .unwrap();
        // Only table 0 was visited.
        assert_eq!(found.per_table.len(), 1);

        let err = index
            .query_candidates_from(&probe[..], 1, index.ntables() + 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_duplicate_inserts_keep_order() {
        let mut index = SetSketchIndex::new(16).unwrap();
        let probe = sketch(7, 16);
        index.insert(&probe[..]).unwrap();
        index.insert(&probe[..]).unwrap();
        let found = index.query_candidates(&probe[..], usize::MAX).unwrap();
        assert_eq!(found.ids, vec![0, 1]);
    }

    #[test]
    fn test_register_width_generic() {
        let mut bytes_index = SetSketchIndex::new(8).unwrap();
        let byte_sketch: Vec<u8> = (0..8).collect();
        bytes_index.insert(&byte_sketch[..]).unwrap();
        assert!(bytes_index
            .query_candidates(&byte_sketch[..], 1)
            .unwrap()
            .ids
            .contains(&0));

        let mut wide_index = SetSketchIndex::new(8).unwrap();
        let wide_sketch: Vec<u64> = (0..8).collect();
        wide_index.insert(&wide_sketch[..]).unwrap();
        assert!(wide_index
            .query_candidates(&wide_sketch[..], 1)
            .unwrap()
            .ids
            .contains(&0));
    }
}
