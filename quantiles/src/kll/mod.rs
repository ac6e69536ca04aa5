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

//! KLL sketch implementation for estimating quantiles and ranks.
//!
//! KLL is a compact, streaming quantiles sketch with near-optimal accuracy per retained item.
//! It supports one-pass updates, approximate quantiles, ranks, PMF and CDF queries, merging of
//! sketches built over disjoint streams, and a versioned binary encoding.
//!
//! Retained items live in a hierarchy of compactors. Items at level `i` each stand for `2^i`
//! stream items. When a level outgrows its capacity it is sorted and halved: a fresh coin flip
//! picks either the even or the odd positions to keep, and the survivors move one level up
//! with twice the weight. Every level holds at most `k` items, so the sketch retains
//! `O(k log(n / k))` items while the rank error stays around
//! [`normalized_rank_error`](KllSketch::normalized_rank_error).
//!
//! Up to `k` items the sketch stores everything and answers exactly. The minimum and maximum
//! are always tracked exactly.
//!
//! A sketch is single-writer: `update` and `merge` take `&mut self`. Queries take `&self` and
//! may run concurrently with each other.
//!
//! # Usage
//!
//! ```rust
//! # use datasketches_quantiles::kll::KllSketch;
//! let mut sketch = KllSketch::<f64>::new(200);
//! sketch.update(1.0).unwrap();
//! sketch.update(2.0).unwrap();
//! let q = sketch.quantile(0.5, true).unwrap();
//! assert!(q >= 1.0 && q <= 2.0);
//!
//! let bytes = sketch.serialize();
//! let restored = KllSketch::<f64>::deserialize(&bytes).unwrap();
//! assert_eq!(restored.n(), 2);
//! ```
//!
//! # Merging
//!
//! ```rust
//! # use datasketches_quantiles::kll::KllSketch;
//! let mut left = KllSketch::<i64>::new(200);
//! let mut right = KllSketch::<i64>::new(200);
//! for i in 0..1_000 {
//!     left.update(i).unwrap();
//!     right.update(i + 1_000).unwrap();
//! }
//! left.merge(&right).unwrap();
//! assert_eq!(left.n(), 2_000);
//! assert_eq!(*left.min_item().unwrap(), 0);
//! assert_eq!(*left.max_item().unwrap(), 1_999);
//! ```

mod builder;
mod capacity;
mod compactor;
mod hierarchy;
mod item;
pub mod ks;
mod serialization;
mod sketch;
mod sorted_view;

pub use self::builder::KllSketchBuilder;
pub use self::item::KllItem;
pub use self::sketch::KllSketch;
pub use self::sorted_view::SortedView;

/// Default value of parameter k.
pub const DEFAULT_K: u16 = 200;
/// Default value of parameter m, the minimum capacity of any level.
pub const DEFAULT_M: u8 = 8;
/// Minimum value of parameter k.
pub const MIN_K: u16 = DEFAULT_M as u16;
/// Maximum value of parameter k.
pub const MAX_K: u16 = u16::MAX;
