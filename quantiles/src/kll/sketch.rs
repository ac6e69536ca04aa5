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
use std::fmt;

use tracing::debug;

use super::DEFAULT_K;
use super::DEFAULT_M;
use super::MAX_K;
use super::MIN_K;
use super::hierarchy::LevelHierarchy;
use super::item::KllItem;
use super::serialization;
use super::sorted_view::SortedView;
use crate::common::random::XorShift64;
use crate::error::Error;

/// KLL sketch for estimating quantiles and ranks.
///
/// See the [kll module level documentation](crate::kll) for more.
#[derive(Debug)]
pub struct KllSketch<T: KllItem> {
    hierarchy: LevelHierarchy<T>,
    n: u64,
    min_item: Option<T>,
    max_item: Option<T>,
    rng: XorShift64,
}

impl<T: KllItem> Default for KllSketch<T> {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl<T: KllItem> Clone for KllSketch<T> {
    /// Clones the retained state. Every clone gets its own random stream, so neither the
    /// original nor any two clones make correlated compaction choices afterwards.
    fn clone(&self) -> Self {
        Self {
            hierarchy: self.hierarchy.clone(),
            n: self.n,
            min_item: self.min_item.clone(),
            max_item: self.max_item.clone(),
            rng: self.rng.fork(),
        }
    }
}

impl<T: KllItem> KllSketch<T> {
    /// Creates a new sketch with the given value of k.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::kll::KllSketch;
    /// let sketch = KllSketch::<f64>::new(200);
    /// assert_eq!(sketch.k(), 200);
    /// ```
    pub fn new(k: u16) -> Self {
        Self::with_rng(k, XorShift64::default())
    }

    /// Creates a new sketch whose compaction coin flips are drawn from a stream seeded with
    /// `seed`. Two sketches built with the same seed from the same inputs are identical.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    pub fn with_seed(k: u16, seed: u64) -> Self {
        Self::with_rng(k, XorShift64::seeded(seed))
    }

    pub(crate) fn with_rng(k: u16, rng: XorShift64) -> Self {
        assert!(
            (MIN_K..=MAX_K).contains(&k),
            "k must be in [{MIN_K}, {MAX_K}], got {k}"
        );
        Self::from_parts(LevelHierarchy::new(k, DEFAULT_M), 0, None, None, rng)
    }

    pub(crate) fn from_parts(
        hierarchy: LevelHierarchy<T>,
        n: u64,
        min_item: Option<T>,
        max_item: Option<T>,
        rng: XorShift64,
    ) -> Self {
        Self {
            hierarchy,
            n,
            min_item,
            max_item,
            rng,
        }
    }

    pub(crate) fn hierarchy(&self) -> &LevelHierarchy<T> {
        &self.hierarchy
    }

    /// Returns parameter k used to configure this sketch.
    pub fn k(&self) -> u16 {
        self.hierarchy.k()
    }

    /// Returns total weight of the stream.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Returns true if the sketch has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns the number of retained items.
    pub fn num_retained(&self) -> usize {
        self.hierarchy.num_retained()
    }

    /// Returns the number of levels in the hierarchy.
    pub fn num_levels(&self) -> usize {
        self.hierarchy.height()
    }

    /// Returns true if the sketch is in estimation mode.
    ///
    /// A sketch leaves exact mode once it has seen more than `k` items, the capacity of the
    /// single level it starts with. Until then every query answer is exact.
    pub fn is_estimation_mode(&self) -> bool {
        self.hierarchy.height() > 1
    }

    /// Returns the minimum item seen by the sketch.
    ///
    /// This is exact regardless of estimation mode.
    pub fn min_item(&self) -> Result<&T, Error> {
        self.min_item
            .as_ref()
            .ok_or_else(|| Error::empty_sketch("min_item"))
    }

    /// Returns the maximum item seen by the sketch.
    ///
    /// This is exact regardless of estimation mode.
    pub fn max_item(&self) -> Result<&T, Error> {
        self.max_item
            .as_ref()
            .ok_or_else(|| Error::empty_sketch("max_item"))
    }

    /// Updates the sketch with a new item.
    ///
    /// Fails with [`InvalidInput`](crate::error::ErrorKind::InvalidInput) for NaN, leaving the
    /// sketch unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::kll::KllSketch;
    /// let mut sketch = KllSketch::<f64>::new(200);
    /// sketch.update(1.0).unwrap();
    /// assert!(sketch.update(f64::NAN).is_err());
    /// assert_eq!(sketch.n(), 1);
    /// ```
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        if T::is_nan(&item) {
            return Err(Error::invalid_input("item must not be NaN"));
        }
        self.update_min_max(&item);
        self.hierarchy.add(item);
        self.n += 1;
        self.hierarchy.ensure_capacity(&mut self.rng);
        Ok(())
    }

    /// Merges another sketch into this one.
    ///
    /// The result is statistically equivalent to a sketch that saw both streams. Merging is
    /// associative and commutative in distribution only: different merge orders make
    /// different random compaction choices and generally retain different items.
    ///
    /// Fails with [`IncompatibleSketch`](crate::error::ErrorKind::IncompatibleSketch) if the
    /// sketches were configured with different `k`; this sketch is left unchanged.
    pub fn merge(&mut self, other: &KllSketch<T>) -> Result<(), Error> {
        if self.k() != other.k() {
            return Err(Error::incompatible("cannot merge sketches with different k")
                .with_context("k", self.k())
                .with_context("other_k", other.k()));
        }
        if other.is_empty() {
            return Ok(());
        }

        self.update_min_max_from_other(other);
        self.hierarchy.absorb(&other.hierarchy);
        self.n += other.n;
        let compactions = self.hierarchy.ensure_capacity(&mut self.rng);

        debug!(
            k = self.k(),
            n = self.n,
            other_n = other.n,
            height = self.hierarchy.height(),
            compactions,
            "merged kll sketch"
        );
        debug_assert_eq!(
            self.hierarchy.total_weight(),
            Some(self.n),
            "total weight does not match n"
        );
        Ok(())
    }

    /// Returns a sorted, weighted view of the retained items for repeated queries.
    pub fn sorted_view(&self) -> Result<SortedView<'_, T>, Error> {
        self.view_for("sorted_view")
    }

    /// Returns the normalized rank of the given item.
    ///
    /// With `inclusive == false` this is the fraction of the stream strictly less than `item`,
    /// otherwise the fraction less than or equal to it. Fails with
    /// [`InvalidInput`](crate::error::ErrorKind::InvalidInput) if `item` is NaN.
    pub fn rank(&self, item: &T, inclusive: bool) -> Result<f64, Error> {
        let view = self.view_for("rank")?;
        view.rank(item, inclusive)
    }

    /// Returns the normalized ranks of the given items, failing if any of them is NaN.
    pub fn ranks(&self, items: &[T], inclusive: bool) -> Result<Vec<f64>, Error> {
        let view = self.view_for("ranks")?;
        items.iter().map(|item| view.rank(item, inclusive)).collect()
    }

    /// Returns the quantile for the given normalized rank.
    ///
    /// Fails with [`EmptySketch`](crate::error::ErrorKind::EmptySketch) on an empty sketch and
    /// with [`InvalidInput`](crate::error::ErrorKind::InvalidInput) if rank is not in
    /// [0.0, 1.0].
    pub fn quantile(&self, rank: f64, inclusive: bool) -> Result<T, Error> {
        let view = self.view_for("quantile")?;
        view.quantile(rank, inclusive).cloned()
    }

    /// Returns the quantiles for the given normalized ranks.
    pub fn quantiles(&self, ranks: &[f64], inclusive: bool) -> Result<Vec<T>, Error> {
        let view = self.view_for("quantiles")?;
        ranks
            .iter()
            .map(|rank| view.quantile(*rank, inclusive).cloned())
            .collect()
    }

    /// Returns the approximate CDF for the given split points.
    ///
    /// Split points must be strictly increasing and free of NaN.
    pub fn cdf(&self, split_points: &[T], inclusive: bool) -> Result<Vec<f64>, Error> {
        let view = self.view_for("cdf")?;
        view.cdf(split_points, inclusive)
    }

    /// Returns the approximate PMF for the given split points.
    ///
    /// Split points must be strictly increasing and free of NaN.
    pub fn pmf(&self, split_points: &[T], inclusive: bool) -> Result<Vec<f64>, Error> {
        let view = self.view_for("pmf")?;
        view.pmf(split_points, inclusive)
    }

    /// Returns normalized rank error for the configured k.
    ///
    /// This is the a priori bound that holds with 99% confidence, for single rank queries or
    /// for PMF buckets when `pmf` is true.
    pub fn normalized_rank_error(&self, pmf: bool) -> f64 {
        normalized_rank_error(self.k(), pmf)
    }

    /// Iterates the retained items and their weights, lowest level first.
    ///
    /// The weights sum to [`n`](Self::n).
    pub fn iter(&self) -> impl Iterator<Item = (&T, u64)> {
        self.hierarchy.weighted_items()
    }

    /// Serializes the sketch to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        serialization::serialize(self)
    }

    /// Deserializes a sketch from bytes.
    ///
    /// The restored sketch draws its future coin flips from a freshly seeded stream.
    pub fn deserialize(bytes: &[u8]) -> Result<KllSketch<T>, Error> {
        serialization::deserialize(bytes, XorShift64::default())
    }

    /// Deserializes a sketch from bytes, seeding its future coin flips with `seed`.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<KllSketch<T>, Error> {
        serialization::deserialize(bytes, XorShift64::seeded(seed))
    }

    fn view_for(&self, operation: &'static str) -> Result<SortedView<'_, T>, Error> {
        if self.is_empty() {
            return Err(Error::empty_sketch(operation));
        }
        Ok(SortedView::new(self.hierarchy.weighted_items()))
    }

    fn update_min_max(&mut self, item: &T) {
        match (&self.min_item, &self.max_item) {
            (Some(min), Some(max)) => {
                if T::cmp(item, min) == Ordering::Less {
                    self.min_item = Some(item.clone());
                }
                if T::cmp(max, item) == Ordering::Less {
                    self.max_item = Some(item.clone());
                }
            }
            _ => {
                self.min_item = Some(item.clone());
                self.max_item = Some(item.clone());
            }
        }
    }

    fn update_min_max_from_other(&mut self, other: &KllSketch<T>) {
        if let Some(other_min) = &other.min_item {
            self.update_min_max(other_min);
        }
        if let Some(other_max) = &other.max_item {
            self.update_min_max(other_max);
        }
    }
}

// Empirical fit of the 99th percentile rank error as coefficient / k^exponent.
pub(crate) const PMF_COEF: f64 = 2.446;
pub(crate) const PMF_EXP: f64 = 0.9433;
pub(crate) const CDF_COEF: f64 = 2.296;
pub(crate) const CDF_EXP: f64 = 0.9723;

pub(crate) fn normalized_rank_error(k: u16, pmf: bool) -> f64 {
    let k = k as f64;
    if pmf {
        PMF_COEF / k.powf(PMF_EXP)
    } else {
        CDF_COEF / k.powf(CDF_EXP)
    }
}

impl<T: KllItem + fmt::Display> fmt::Display for KllSketch<T> {
    /// Writes a summary of the sketch. The alternate form (`{:#}`) also lists every level and
    /// the retained items.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### KLL sketch summary:")?;
        writeln!(f, "   K              : {}", self.k())?;
        writeln!(f, "   N              : {}", self.n)?;
        writeln!(
            f,
            "   Epsilon        : {:.3}%",
            self.normalized_rank_error(false) * 100.0
        )?;
        writeln!(
            f,
            "   Epsilon PMF    : {:.3}%",
            self.normalized_rank_error(true) * 100.0
        )?;
        writeln!(f, "   Empty          : {}", self.is_empty())?;
        writeln!(f, "   Estimation mode: {}", self.is_estimation_mode())?;
        writeln!(f, "   Levels         : {}", self.num_levels())?;
        writeln!(
            f,
            "   Sorted         : {}",
            self.hierarchy.is_level_zero_sorted()
        )?;
        writeln!(
            f,
            "   Capacity items : {}",
            self.hierarchy.total_capacity()
        )?;
        writeln!(f, "   Retained items : {}", self.num_retained())?;
        if let (Some(min), Some(max)) = (&self.min_item, &self.max_item) {
            writeln!(f, "   Min item       : {min}")?;
            writeln!(f, "   Max item       : {max}")?;
        }
        writeln!(f, "### End sketch summary")?;

        if f.alternate() {
            writeln!(f, "### KLL sketch levels:")?;
            writeln!(f, "   index: nominal capacity, actual size")?;
            for compactor in self.hierarchy.compactors() {
                let level = compactor.level();
                writeln!(
                    f,
                    "   {level}: {}, {}",
                    self.hierarchy.capacity(level),
                    compactor.len()
                )?;
            }
            writeln!(f, "### End sketch levels")?;

            writeln!(f, "### KLL sketch data:")?;
            for compactor in self.hierarchy.compactors() {
                if compactor.is_empty() {
                    continue;
                }
                writeln!(f, " level {}:", compactor.level())?;
                for item in compactor.items() {
                    writeln!(f, "   {item}")?;
                }
            }
            writeln!(f, "### End sketch data")?;
        }
        Ok(())
    }
}
