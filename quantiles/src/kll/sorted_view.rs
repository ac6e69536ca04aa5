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
use crate::error::Error;

/// A sorted, weighted view over every item retained by a sketch.
///
/// The view borrows the sketch it was built from, so the sketch cannot be updated or merged
/// while the view is alive. Building a view costs a sort of all retained items; keep one around
/// when answering many queries against the same sketch state.
///
/// Ranks are normalized to `[0, 1]`. With `inclusive == false` the rank of an item is the
/// weight of retained items strictly less than it; with `inclusive == true` it also counts the
/// items equal to it.
///
/// # Examples
///
/// ```
/// # use datasketches_quantiles::kll::KllSketch;
/// let mut sketch = KllSketch::<i64>::new(200);
/// for i in 1..=100 {
///     sketch.update(i).unwrap();
/// }
/// let view = sketch.sorted_view().unwrap();
/// assert_eq!(view.rank(&51, false).unwrap(), 0.5);
/// assert_eq!(*view.quantile(0.5, true).unwrap(), 50);
/// ```
#[derive(Debug, Clone)]
pub struct SortedView<'a, T> {
    entries: Vec<Entry<'a, T>>,
    total_weight: u64,
}

#[derive(Debug, Clone, Copy)]
struct Entry<'a, T> {
    item: &'a T,
    weight: u64,
    cumulative: u64,
}

impl<'a, T: KllItem> SortedView<'a, T> {
    pub(crate) fn new(weighted_items: impl Iterator<Item = (&'a T, u64)>) -> Self {
        let mut entries: Vec<Entry<'a, T>> = weighted_items
            .map(|(item, weight)| Entry {
                item,
                weight,
                cumulative: 0,
            })
            .collect();
        entries.sort_by(|a, b| T::cmp(a.item, b.item));

        let mut total_weight = 0u64;
        for entry in &mut entries {
            total_weight += entry.weight;
            entry.cumulative = total_weight;
        }
        Self {
            entries,
            total_weight,
        }
    }

    /// Total weight of the view, equal to the number of items the sketch has seen.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Number of retained items in the view.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the view holds no items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(item, weight)` pairs in ascending item order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a T, u64)> + '_ {
        self.entries.iter().map(|entry| (entry.item, entry.weight))
    }

    /// Returns the normalized rank of `item`.
    ///
    /// Fails with [`InvalidInput`](crate::error::ErrorKind::InvalidInput) if `item` is NaN.
    pub fn rank(&self, item: &T, inclusive: bool) -> Result<f64, Error> {
        if T::is_nan(item) {
            return Err(Error::invalid_input("item must not be NaN"));
        }
        Ok(self.rank_of(item, inclusive))
    }

    fn rank_of(&self, item: &T, inclusive: bool) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let idx = if inclusive {
            self.entries
                .partition_point(|entry| T::cmp(entry.item, item) != Ordering::Greater)
        } else {
            self.entries
                .partition_point(|entry| T::cmp(entry.item, item) == Ordering::Less)
        };
        if idx == 0 {
            return 0.0;
        }
        self.entries[idx - 1].cumulative as f64 / self.total_weight as f64
    }

    /// Returns the retained item at normalized `rank`.
    ///
    /// Fails with [`InvalidInput`](crate::error::ErrorKind::InvalidInput) if `rank` is not in
    /// `[0.0, 1.0]`, and with [`EmptySketch`](crate::error::ErrorKind::EmptySketch) if the view
    /// is empty.
    pub fn quantile(&self, rank: f64, inclusive: bool) -> Result<&'a T, Error> {
        check_rank(rank)?;
        let last = self
            .entries
            .last()
            .ok_or_else(|| Error::empty_sketch("quantile"))?;

        let scaled = rank * self.total_weight as f64;
        let idx = if inclusive {
            let weight = scaled.ceil() as u64;
            self.entries
                .partition_point(|entry| entry.cumulative < weight)
        } else {
            let weight = scaled.floor() as u64;
            self.entries
                .partition_point(|entry| entry.cumulative <= weight)
        };
        Ok(self.entries.get(idx).map_or(last.item, |entry| entry.item))
    }

    /// Returns the normalized ranks of `split_points`, followed by `1.0`.
    ///
    /// The result has `split_points.len() + 1` entries. Split points must be free of NaN and
    /// strictly increasing.
    pub fn cdf(&self, split_points: &[T], inclusive: bool) -> Result<Vec<f64>, Error> {
        check_split_points(split_points)?;
        let mut ranks = Vec::with_capacity(split_points.len() + 1);
        for item in split_points {
            ranks.push(self.rank_of(item, inclusive));
        }
        ranks.push(1.0);
        Ok(ranks)
    }

    /// Returns the fraction of the stream falling in each of the `split_points.len() + 1`
    /// intervals induced by `split_points`.
    pub fn pmf(&self, split_points: &[T], inclusive: bool) -> Result<Vec<f64>, Error> {
        let mut buckets = self.cdf(split_points, inclusive)?;
        for i in (1..buckets.len()).rev() {
            buckets[i] -= buckets[i - 1];
        }
        Ok(buckets)
    }
}

fn check_rank(rank: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&rank) {
        Ok(())
    } else {
        Err(Error::invalid_input("rank must be in [0.0, 1.0]").with_context("rank", rank))
    }
}

fn check_split_points<T: KllItem>(split_points: &[T]) -> Result<(), Error> {
    if split_points.iter().any(T::is_nan) {
        return Err(Error::invalid_input(
            "split_points must not contain NaN values",
        ));
    }
    for (i, pair) in split_points.windows(2).enumerate() {
        if T::cmp(&pair[0], &pair[1]) != Ordering::Less {
            return Err(
                Error::invalid_input("split_points must be unique and monotonically increasing")
                    .with_context("index", i + 1),
            );
        }
    }
    Ok(())
}
