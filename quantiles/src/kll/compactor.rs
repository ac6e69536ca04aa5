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

use std::cmp::Ordering;

use super::item::KllItem;
use crate::common::random::RandomSource;

/// One weight class of the hierarchy: every retained item stands for `2^level` stream items.
#[derive(Debug, Clone)]
pub(crate) struct Compactor<T> {
    level: usize,
    items: Vec<T>,
    sorted: bool,
}

impl<T: KllItem> Compactor<T> {
    pub fn new(level: usize) -> Self {
        Self {
            level,
            items: Vec::new(),
            sorted: true,
        }
    }

    pub fn from_items(level: usize, items: Vec<T>, sorted: bool) -> Self {
        Self {
            level,
            items,
            sorted,
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Weight of each retained item.
    pub fn weight(&self) -> u64 {
        1u64 << self.level
    }

    pub fn add(&mut self, item: T) {
        self.items.push(item);
        self.sorted = self.items.len() <= 1;
    }

    /// Absorbs a batch that is already in ascending order.
    pub fn extend_sorted(&mut self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        if self.items.is_empty() {
            self.items = items;
            self.sorted = true;
        } else if self.sorted {
            let current = std::mem::take(&mut self.items);
            self.items = merge_sorted_vec(current, items);
        } else {
            self.items.extend(items);
        }
    }

    /// Absorbs a batch in arbitrary order.
    pub fn extend_unsorted(&mut self, items: impl IntoIterator<Item = T>) {
        let before = self.items.len();
        self.items.extend(items);
        if self.items.len() > before {
            self.sorted = self.items.len() <= 1;
        }
    }

    pub fn sort(&mut self) {
        if !self.sorted {
            self.items.sort_by(T::cmp);
            self.sorted = true;
        }
    }

    /// Halves the buffer and returns the survivors in ascending order.
    ///
    /// With an odd number of items the most recently added one is held back and stays in this
    /// compactor at its current weight. The rest is sorted and split into consecutive pairs;
    /// one fresh coin flip decides whether the lower or the upper element of every pair
    /// survives. The survivors carry twice the weight and belong one level up.
    pub fn compact<R: RandomSource>(&mut self, rng: &mut R) -> Vec<T> {
        debug_assert!(self.items.len() >= 2, "cannot compact fewer than two items");

        let holdout = if self.items.len() % 2 == 1 {
            self.items.pop()
        } else {
            None
        };
        self.sort();

        let offset = usize::from(rng.next_bool());
        let current = std::mem::take(&mut self.items);
        let survivors: Vec<T> = current.into_iter().skip(offset).step_by(2).collect();

        self.items.extend(holdout);
        self.sorted = true;
        survivors
    }
}

pub(crate) fn merge_sorted_vec<T: KllItem>(left: Vec<T>, right: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left_iter = left.into_iter().peekable();
    let mut right_iter = right.into_iter().peekable();

    loop {
        let take_left = match (left_iter.peek(), right_iter.peek()) {
            (Some(l), Some(r)) => T::cmp(r, l) != Ordering::Less,
            _ => break,
        };
        let next = if take_left {
            left_iter.next()
        } else {
            right_iter.next()
        };
        merged.extend(next);
    }
    merged.extend(left_iter);
    merged.extend(right_iter);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::random::XorShift64;

    #[test]
    fn test_add_marks_unsorted() {
        let mut compactor = Compactor::<i64>::new(0);
        assert!(compactor.is_sorted());
        compactor.add(3);
        assert!(compactor.is_sorted());
        compactor.add(1);
        assert!(!compactor.is_sorted());
        compactor.sort();
        assert_eq!(compactor.items(), &[1, 3]);
    }

    #[test]
    fn test_compact_keeps_one_of_each_pair() {
        let mut rng = XorShift64::seeded(9001);
        let bit = rng.clone().next_bool();

        let mut compactor = Compactor::<i64>::new(0);
        for item in [5, 3, 1, 4, 2, 6] {
            compactor.add(item);
        }
        let survivors = compactor.compact(&mut rng);

        let expected = if bit { vec![2, 4, 6] } else { vec![1, 3, 5] };
        assert_eq!(survivors, expected);
        assert!(compactor.is_empty());
    }

    #[test]
    fn test_same_seed_same_survivors() {
        let items: Vec<i64> = (0..101).map(|i| (i * 37) % 101).collect();
        let mut a = Compactor::from_items(2, items.clone(), false);
        let mut b = Compactor::from_items(2, items, false);
        let mut rng_a = XorShift64::seeded(5);
        let mut rng_b = XorShift64::seeded(5);
        for _ in 0..3 {
            assert_eq!(a.compact(&mut rng_a), b.compact(&mut rng_b));
            let refill: Vec<i64> = (0..20).collect();
            a.extend_unsorted(refill.clone());
            b.extend_unsorted(refill);
        }
    }

    #[test]
    fn test_odd_holdout_stays_behind() {
        let mut rng = XorShift64::seeded(1);
        let mut compactor = Compactor::<i64>::new(3);
        for item in [10, 30, 20, 50, 40, 60, 70] {
            compactor.add(item);
        }
        let survivors = compactor.compact(&mut rng);
        assert_eq!(survivors.len(), 3);
        assert_eq!(compactor.items(), &[70]);
        // weight is conserved: 3 survivors at 2^4 plus one holdout at 2^3 = 7 items at 2^3
        assert_eq!(
            survivors.len() as u64 * 2 * compactor.weight() + compactor.weight(),
            7 * compactor.weight()
        );
        assert!(survivors.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_coin_flip_is_fresh_per_compaction() {
        let mut rng = XorShift64::seeded(77);
        let mut lower = 0;
        for _ in 0..200 {
            let mut compactor = Compactor::from_items(0, vec![1i64, 2], true);
            if compactor.compact(&mut rng) == vec![1] {
                lower += 1;
            }
        }
        assert!(lower > 60 && lower < 140, "lower = {lower}");
    }

    #[test]
    fn test_extend_sorted_merges_in_order() {
        let mut compactor = Compactor::from_items(1, vec![1i64, 4, 9], true);
        compactor.extend_sorted(vec![2, 4, 10]);
        assert!(compactor.is_sorted());
        assert_eq!(compactor.items(), &[1, 2, 4, 4, 9, 10]);

        let mut unsorted = Compactor::from_items(0, vec![3i64, 1], false);
        unsorted.extend_sorted(vec![0, 2]);
        assert!(!unsorted.is_sorted());
        unsorted.sort();
        assert_eq!(unsorted.items(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_merge_sorted_vec_is_stable() {
        let merged = merge_sorted_vec(vec![1.0f64, 2.0, 2.0], vec![0.5, 2.0, 3.0]);
        assert_eq!(merged, vec![0.5, 1.0, 2.0, 2.0, 2.0, 3.0]);
    }
}
