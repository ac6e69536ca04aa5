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

use tracing::debug;

use super::capacity::level_capacity;
use super::capacity::total_capacity;
use super::compactor::Compactor;
use super::item::KllItem;
use crate::common::random::RandomSource;

/// Ordered compactors, one per power-of-two weight class.
///
/// After every public sketch operation `compactors[i].len() <= capacity(i)` for every level.
#[derive(Debug, Clone)]
pub(crate) struct LevelHierarchy<T> {
    k: u16,
    m: u8,
    compactors: Vec<Compactor<T>>,
}

impl<T: KllItem> LevelHierarchy<T> {
    pub fn new(k: u16, m: u8) -> Self {
        Self {
            k,
            m,
            compactors: vec![Compactor::new(0)],
        }
    }

    pub fn from_compactors(k: u16, m: u8, compactors: Vec<Compactor<T>>) -> Self {
        debug_assert!(!compactors.is_empty());
        debug_assert!(
            compactors
                .iter()
                .enumerate()
                .all(|(level, c)| c.level() == level)
        );
        Self { k, m, compactors }
    }

    pub fn k(&self) -> u16 {
        self.k
    }

    pub fn m(&self) -> u8 {
        self.m
    }

    pub fn height(&self) -> usize {
        self.compactors.len()
    }

    pub fn compactors(&self) -> &[Compactor<T>] {
        &self.compactors
    }

    pub fn num_retained(&self) -> usize {
        self.compactors.iter().map(Compactor::len).sum()
    }

    pub fn is_level_zero_sorted(&self) -> bool {
        self.compactors[0].is_sorted()
    }

    pub fn capacity(&self, level: usize) -> usize {
        debug_assert!(level < self.height());
        level_capacity(self.k, self.m)
    }

    pub fn total_capacity(&self) -> usize {
        total_capacity(self.k, self.m, self.height())
    }

    /// Sum of `len * 2^level`; `None` if it does not fit in 64 bits.
    pub fn total_weight(&self) -> Option<u64> {
        self.compactors.iter().try_fold(0u64, |total, compactor| {
            let level_weight = (compactor.len() as u64).checked_mul(compactor.weight())?;
            total.checked_add(level_weight)
        })
    }

    /// Appends an unweighted stream item to level 0. Call [`Self::ensure_capacity`] afterwards.
    pub fn add(&mut self, item: T) {
        self.compactors[0].add(item);
    }

    /// Concatenates every level of `other` onto the matching level of `self`, growing `self` to
    /// the taller of the two heights. Capacities are not restored here.
    pub fn absorb(&mut self, other: &LevelHierarchy<T>) {
        debug_assert_eq!(self.k, other.k);
        while self.height() < other.height() {
            let level = self.height();
            self.compactors.push(Compactor::new(level));
        }
        for (level, theirs) in other.compactors.iter().enumerate() {
            if theirs.is_empty() {
                continue;
            }
            let ours = &mut self.compactors[level];
            if theirs.is_sorted() {
                ours.extend_sorted(theirs.items().to_vec());
            } else {
                ours.extend_unsorted(theirs.items().iter().cloned());
            }
        }
    }

    /// Compacts overflowing levels until every level fits its capacity.
    ///
    /// Sweeps upward from level 0. Capacities do not depend on the height, so compacting a
    /// level can only overflow the level above it and one pass suffices. A new top level is
    /// pushed when the current top overflows.
    ///
    /// Returns the number of compactions performed.
    pub fn ensure_capacity<R: RandomSource>(&mut self, rng: &mut R) -> usize {
        let mut compactions = 0;
        let mut level = 0;
        while level < self.height() {
            if self.compactors[level].len() <= self.capacity(level) {
                level += 1;
                continue;
            }
            if level + 1 == self.height() {
                self.compactors.push(Compactor::new(level + 1));
                debug!(
                    k = self.k,
                    height = self.height(),
                    retained = self.num_retained(),
                    "kll hierarchy grew"
                );
            }
            let survivors = self.compactors[level].compact(rng);
            self.compactors[level + 1].extend_sorted(survivors);
            compactions += 1;
            level += 1;
        }
        debug_assert!(self.first_overflowing_level().is_none());
        compactions
    }

    /// Returns the first level holding more items than its capacity.
    pub fn first_overflowing_level(&self) -> Option<usize> {
        (0..self.height()).find(|&level| self.compactors[level].len() > self.capacity(level))
    }

    /// Iterates all retained items with their weights, level by level.
    pub fn weighted_items(&self) -> impl Iterator<Item = (&T, u64)> {
        self.compactors.iter().flat_map(|compactor| {
            let weight = compactor.weight();
            compactor.items().iter().map(move |item| (item, weight))
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::common::random::XorShift64;
    use crate::kll::DEFAULT_K;
    use crate::kll::DEFAULT_M;
    use crate::kll::MIN_K;

    fn fill(hierarchy: &mut LevelHierarchy<i64>, rng: &mut XorShift64, items: impl IntoIterator<Item = i64>) {
        for item in items {
            hierarchy.add(item);
            hierarchy.ensure_capacity(rng);
        }
    }

    fn assert_within_capacity(hierarchy: &LevelHierarchy<i64>) {
        for level in 0..hierarchy.height() {
            let len = hierarchy.compactors()[level].len();
            let cap = hierarchy.capacity(level);
            assert!(len <= cap, "level {level} holds {len} > {cap}");
        }
    }

    #[test]
    fn test_no_compaction_up_to_k() {
        let mut rng = XorShift64::seeded(3);
        let mut hierarchy = LevelHierarchy::new(DEFAULT_K, DEFAULT_M);
        fill(&mut hierarchy, &mut rng, 0..DEFAULT_K as i64);
        assert_eq!(hierarchy.height(), 1);
        assert_eq!(hierarchy.num_retained(), DEFAULT_K as usize);

        hierarchy.add(-1);
        assert_eq!(hierarchy.first_overflowing_level(), Some(0));
        assert_eq!(hierarchy.ensure_capacity(&mut rng), 1);
        assert_eq!(hierarchy.height(), 2);
        assert_within_capacity(&hierarchy);
    }

    #[test]
    fn test_cascade_keeps_every_level_within_capacity() {
        let mut rng = XorShift64::seeded(11);
        let mut hierarchy = LevelHierarchy::new(MIN_K, DEFAULT_M);
        for i in 0..50_000i64 {
            hierarchy.add((i * 7919) % 50_000);
            hierarchy.ensure_capacity(&mut rng);
            assert_eq!(hierarchy.total_weight(), Some(i as u64 + 1));
        }
        assert_within_capacity(&hierarchy);
        assert!(hierarchy.height() > 10);
        assert!(hierarchy.num_retained() <= hierarchy.total_capacity());
    }

    #[test]
    fn test_capacity_never_increases_with_level() {
        let mut rng = XorShift64::seeded(15);
        let mut hierarchy = LevelHierarchy::new(DEFAULT_K, DEFAULT_M);
        fill(&mut hierarchy, &mut rng, 0..100_000);
        assert!(hierarchy.height() > 5);
        let capacities: Vec<usize> = (0..hierarchy.height())
            .map(|level| hierarchy.capacity(level))
            .collect();
        assert!(capacities.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(capacities.iter().max(), Some(&capacities[0]));
        assert_eq!(capacities[0], DEFAULT_K as usize);
        assert_eq!(hierarchy.total_capacity(), hierarchy.height() * DEFAULT_K as usize);
    }

    #[test]
    fn test_higher_levels_stay_sorted() {
        let mut rng = XorShift64::seeded(12);
        let mut hierarchy = LevelHierarchy::new(DEFAULT_K, DEFAULT_M);
        fill(&mut hierarchy, &mut rng, (0..5_000).rev());
        for compactor in &hierarchy.compactors()[1..] {
            assert!(compactor.is_sorted());
            assert!(compactor.items().windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_absorb_then_restore() {
        let mut rng = XorShift64::seeded(13);
        let mut left = LevelHierarchy::new(DEFAULT_K, DEFAULT_M);
        let mut right = LevelHierarchy::new(DEFAULT_K, DEFAULT_M);
        fill(&mut left, &mut rng, 0..3_000);
        fill(&mut right, &mut rng, 3_000..20_000);
        let taller = left.height().max(right.height());

        left.absorb(&right);
        assert_eq!(left.height(), taller);
        assert_eq!(left.total_weight(), Some(20_000));

        left.ensure_capacity(&mut rng);
        assert_eq!(left.first_overflowing_level(), None);
        assert_eq!(left.total_weight(), Some(20_000));
        assert_within_capacity(&left);
    }

    #[test]
    fn test_weighted_items_cover_all_levels() {
        let mut rng = XorShift64::seeded(14);
        let mut hierarchy = LevelHierarchy::new(MIN_K, DEFAULT_M);
        fill(&mut hierarchy, &mut rng, 0..1_000);
        let total: u64 = hierarchy.weighted_items().map(|(_, weight)| weight).sum();
        assert_eq!(total, 1_000);
        assert_eq!(hierarchy.weighted_items().count(), hierarchy.num_retained());
    }

    proptest! {
        #[test]
        fn property_test_levels_stay_within_capacity(
            k in MIN_K..100,
            seed in any::<u64>(),
            batches in prop::collection::vec(prop::collection::vec(any::<i64>(), 0..500), 1..8)
        ) {
            let mut rng = XorShift64::seeded(seed);
            let mut hierarchy = LevelHierarchy::new(k, DEFAULT_M);
            let mut n = 0u64;
            for batch in batches {
                let mut other = LevelHierarchy::new(k, DEFAULT_M);
                fill(&mut other, &mut rng, batch.iter().copied());
                n += batch.len() as u64;

                hierarchy.absorb(&other);
                hierarchy.ensure_capacity(&mut rng);
                for level in 0..hierarchy.height() {
                    prop_assert!(hierarchy.compactors()[level].len() <= hierarchy.capacity(level));
                }
                prop_assert_eq!(hierarchy.total_weight(), Some(n));
            }
        }
    }
}
