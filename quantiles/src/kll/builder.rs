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

use super::DEFAULT_K;
use super::MAX_K;
use super::MIN_K;
use super::item::KllItem;
use super::sketch::CDF_COEF;
use super::sketch::CDF_EXP;
use super::sketch::KllSketch;
use super::sketch::PMF_COEF;
use super::sketch::PMF_EXP;
use crate::common::random::XorShift64;

/// Builder for creating [`KllSketch`] instances.
///
/// Provides two ways of choosing `k`:
/// - [`k()`](Self::k): set it directly
/// - [`with_accuracy()`](Self::with_accuracy): derive it from a target normalized rank error
///
/// # Examples
///
/// ```
/// # use datasketches_quantiles::kll::KllSketchBuilder;
/// let sketch = KllSketchBuilder::new().k(400).seed(42).build::<f64>();
/// assert_eq!(sketch.k(), 400);
/// ```
#[derive(Debug, Clone)]
pub struct KllSketchBuilder {
    k: u16,
    seed: Option<u64>,
}

impl Default for KllSketchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KllSketchBuilder {
    /// Creates a builder with `k = DEFAULT_K` and a clock-derived seed.
    pub fn new() -> Self {
        Self {
            k: DEFAULT_K,
            seed: None,
        }
    }

    /// Creates a builder whose `k` achieves the given normalized rank error.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not in (0.0, 1.0).
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::kll::KllSketchBuilder;
    /// let sketch = KllSketchBuilder::with_accuracy(0.01, false).build::<i64>();
    /// assert!(sketch.normalized_rank_error(false) <= 0.01);
    /// ```
    pub fn with_accuracy(epsilon: f64, pmf: bool) -> Self {
        Self::new().k(Self::suggest_k(epsilon, pmf))
    }

    /// Sets parameter k.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    pub fn k(mut self, k: u16) -> Self {
        assert!(
            (MIN_K..=MAX_K).contains(&k),
            "k must be in [{MIN_K}, {MAX_K}], got {k}"
        );
        self.k = k;
        self
    }

    /// Fixes the seed of the compaction coin flips, making the sketch reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds an empty sketch.
    pub fn build<T: KllItem>(self) -> KllSketch<T> {
        let rng = match self.seed {
            Some(seed) => XorShift64::seeded(seed),
            None => XorShift64::default(),
        };
        KllSketch::with_rng(self.k, rng)
    }

    /// Suggests the smallest k whose normalized rank error does not exceed `epsilon`.
    ///
    /// The result is clamped to [MIN_K, MAX_K].
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not in (0.0, 1.0).
    pub fn suggest_k(epsilon: f64, pmf: bool) -> u16 {
        assert!(
            epsilon > 0.0 && epsilon < 1.0,
            "epsilon must be in (0.0, 1.0), got {epsilon}"
        );
        let (coef, exp) = if pmf {
            (PMF_COEF, PMF_EXP)
        } else {
            (CDF_COEF, CDF_EXP)
        };
        let exact = (coef / epsilon).powf(1.0 / exp);
        let rounded = exact.round();
        // absorb floating-point noise when epsilon came from normalized_rank_error
        let k = if (rounded - exact).abs() < 1e-6 {
            rounded
        } else {
            exact.ceil()
        };
        k.clamp(MIN_K as f64, MAX_K as f64) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let sketch = KllSketchBuilder::default().build::<f32>();
        assert_eq!(sketch.k(), DEFAULT_K);
        assert!(sketch.is_empty());
    }

    #[test]
    #[should_panic(expected = "k must be in")]
    fn test_k_too_small_panics() {
        let _ = KllSketchBuilder::new().k(MIN_K - 1);
    }

    #[test]
    fn test_suggest_k_inverts_rank_error() {
        for k in [MIN_K, 50, DEFAULT_K, 1000, 4096] {
            let sketch = KllSketchBuilder::new().k(k).build::<f64>();
            assert_eq!(
                KllSketchBuilder::suggest_k(sketch.normalized_rank_error(false), false),
                k
            );
            assert_eq!(
                KllSketchBuilder::suggest_k(sketch.normalized_rank_error(true), true),
                k
            );
        }
    }

    #[test]
    fn test_suggest_k_clamps() {
        assert_eq!(KllSketchBuilder::suggest_k(0.9, false), MIN_K);
        assert_eq!(KllSketchBuilder::suggest_k(1e-9, false), MAX_K);
    }

    #[test]
    fn test_seeded_builds_are_reproducible() {
        let mut a = KllSketchBuilder::new().k(MIN_K).seed(3).build::<i64>();
        let mut b = KllSketchBuilder::new().k(MIN_K).seed(3).build::<i64>();
        for i in 0..10_000 {
            a.update(i).unwrap();
            b.update(i).unwrap();
        }
        assert_eq!(a.serialize(), b.serialize());
    }
}
