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

use datasketches_quantiles::error::ErrorKind;
use datasketches_quantiles::kll::DEFAULT_K;
use datasketches_quantiles::kll::KllSketch;
use datasketches_quantiles::kll::ks;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::gt;
use googletest::prelude::le;
use googletest::prelude::near;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn uniform_sketch(seed: u64, n: usize, shift: f64) -> KllSketch<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sketch = KllSketch::with_seed(DEFAULT_K, seed);
    for _ in 0..n {
        sketch.update(rng.random::<f64>() + shift).unwrap();
    }
    sketch
}

#[test]
fn test_identical_sketches() {
    let sketch = uniform_sketch(1, 10_000, 0.0);
    assert_eq!(ks::ks_delta(&sketch, &sketch).unwrap(), 0.0);
    assert!(!ks::ks_test(&sketch, &sketch, 0.05).unwrap());
}

#[test]
fn test_exact_delta() {
    let mut a = KllSketch::<i64>::new(DEFAULT_K);
    let mut b = KllSketch::<i64>::new(DEFAULT_K);
    for i in 0..100 {
        a.update(i).unwrap();
        b.update(i + 50).unwrap();
    }
    assert_that!(ks::ks_delta(&a, &b).unwrap(), near(0.5, 1e-12));

    let mut disjoint = KllSketch::<i64>::new(DEFAULT_K);
    for i in 1_000..1_100 {
        disjoint.update(i).unwrap();
    }
    assert_eq!(ks::ks_delta(&a, &disjoint).unwrap(), 1.0);
}

#[test]
fn test_same_distribution_is_not_rejected() {
    let a = uniform_sketch(2, 20_000, 0.0);
    let b = uniform_sketch(3, 20_000, 0.0);
    let delta = ks::ks_delta(&a, &b).unwrap();
    let threshold = ks::ks_threshold(&a, &b, 0.05).unwrap();
    assert_that!(delta, le(threshold));
    assert!(!ks::ks_test(&a, &b, 0.05).unwrap());
}

#[test]
fn test_shifted_distribution_is_rejected() {
    let a = uniform_sketch(4, 20_000, 0.0);
    let b = uniform_sketch(5, 20_000, 0.5);
    let delta = ks::ks_delta(&a, &b).unwrap();
    assert_that!(delta, near(0.5, 0.05));
    assert_that!(delta, gt(ks::ks_threshold(&a, &b, 0.05).unwrap()));
    assert!(ks::ks_test(&a, &b, 0.05).unwrap());
}

#[test]
fn test_threshold_grows_with_confidence() {
    let a = uniform_sketch(6, 5_000, 0.0);
    let b = uniform_sketch(7, 5_000, 0.0);
    let loose = ks::ks_threshold(&a, &b, 0.1).unwrap();
    let strict = ks::ks_threshold(&a, &b, 0.001).unwrap();
    assert_that!(loose, le(strict));
}

#[test]
fn test_empty_and_invalid_inputs() {
    let empty = KllSketch::<f64>::new(DEFAULT_K);
    let full = uniform_sketch(8, 100, 0.0);

    assert!(!ks::ks_test(&empty, &full, 0.05).unwrap());
    assert!(!ks::ks_test(&full, &empty, 0.05).unwrap());
    assert_eq!(
        ks::ks_delta(&empty, &full).unwrap_err().kind(),
        ErrorKind::EmptySketch
    );
    assert_eq!(
        ks::ks_threshold(&full, &empty, 0.05).unwrap_err().kind(),
        ErrorKind::EmptySketch
    );

    for p in [0.0, 1.0, -0.5, f64::NAN] {
        let err = ks::ks_test(&full, &full, p).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_that!(err.message(), contains_substring("p must be in (0.0, 1.0)"));
    }
}
