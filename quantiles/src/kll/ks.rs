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

//! Two-sample Kolmogorov-Smirnov test over a pair of KLL sketches.
//!
//! The test asks whether two streams were drawn from the same distribution, using only their
//! sketches. The sketch approximation error is added to the classical threshold, so a
//! rejection is conservative.
//!
//! # Usage
//!
//! ```rust
//! # use datasketches_quantiles::kll::KllSketch;
//! # use datasketches_quantiles::kll::ks;
//! let mut low = KllSketch::<f64>::new(200);
//! let mut high = KllSketch::<f64>::new(200);
//! for i in 0..10_000 {
//!     low.update(i as f64).unwrap();
//!     high.update((i + 5_000) as f64).unwrap();
//! }
//! assert!(ks::ks_test(&low, &high, 0.05).unwrap());
//! ```

use std::cmp::Ordering;

use super::item::KllItem;
use super::sketch::KllSketch;
use crate::error::Error;

/// Returns the largest absolute difference between the two approximate CDFs.
///
/// Fails with [`EmptySketch`](crate::error::ErrorKind::EmptySketch) if either sketch is empty.
pub fn ks_delta<T: KllItem>(a: &KllSketch<T>, b: &KllSketch<T>) -> Result<f64, Error> {
    let view_a = a.sorted_view()?;
    let view_b = b.sorted_view()?;
    let n_a = view_a.total_weight() as f64;
    let n_b = view_b.total_weight() as f64;

    let mut iter_a = view_a.iter().peekable();
    let mut iter_b = view_b.iter().peekable();
    let mut weight_a = 0u64;
    let mut weight_b = 0u64;
    let mut max_delta = 0.0f64;

    while let (Some(&(item_a, _)), Some(&(item_b, _))) = (iter_a.peek(), iter_b.peek()) {
        let pivot = match T::cmp(item_a, item_b) {
            Ordering::Greater => item_b,
            _ => item_a,
        };
        // step both CDFs past every copy of the pivot before comparing them
        while let Some((_, weight)) = iter_a.next_if(|(item, _)| T::cmp(item, pivot).is_eq()) {
            weight_a += weight;
        }
        while let Some((_, weight)) = iter_b.next_if(|(item, _)| T::cmp(item, pivot).is_eq()) {
            weight_b += weight;
        }
        let cdf_a = weight_a as f64 / n_a;
        let cdf_b = weight_b as f64 / n_b;
        max_delta = max_delta.max((cdf_a - cdf_b).abs());
    }
    Ok(max_delta)
}

/// Returns the delta above which the null hypothesis is rejected at significance `p`.
///
/// Fails with [`InvalidInput`](crate::error::ErrorKind::InvalidInput) if `p` is not in
/// (0.0, 1.0), and with [`EmptySketch`](crate::error::ErrorKind::EmptySketch) if either sketch
/// is empty.
pub fn ks_threshold<T: KllItem>(a: &KllSketch<T>, b: &KllSketch<T>, p: f64) -> Result<f64, Error> {
    check_significance(p)?;
    if a.is_empty() || b.is_empty() {
        return Err(Error::empty_sketch("ks_threshold"));
    }
    let r_a = a.num_retained() as f64;
    let r_b = b.num_retained() as f64;
    let alpha_factor = (-0.5 * (0.5 * p).ln()).sqrt();
    let delta_area_threshold = alpha_factor * ((r_a + r_b) / (r_a * r_b)).sqrt();
    Ok(delta_area_threshold + a.normalized_rank_error(false) + b.normalized_rank_error(false))
}

/// Returns true if the hypothesis that both sketches summarize the same distribution can be
/// rejected at significance `p`.
///
/// Returns false when either sketch is empty, since there is nothing to compare.
pub fn ks_test<T: KllItem>(a: &KllSketch<T>, b: &KllSketch<T>, p: f64) -> Result<bool, Error> {
    check_significance(p)?;
    if a.is_empty() || b.is_empty() {
        return Ok(false);
    }
    let threshold = ks_threshold(a, b, p)?;
    let delta = ks_delta(a, b)?;
    Ok(delta > threshold)
}

fn check_significance(p: f64) -> Result<(), Error> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(Error::invalid_input("p must be in (0.0, 1.0)").with_context("p", p))
    }
}
