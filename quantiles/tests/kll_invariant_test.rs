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

use datasketches_quantiles::kll::KllSketch;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Update(i32),
    Merge { items: Vec<i32>, seed: u64 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => any::<i32>().prop_map(Op::Update),
        1 => (prop::collection::vec(any::<i32>(), 0..300), any::<u64>())
            .prop_map(|(items, seed)| Op::Merge { items, seed }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn property_test_invariants_hold_after_every_operation(
        k in 8u16..64,
        seed in any::<u64>(),
        ops in prop::collection::vec(arb_op(), 1..400)
    ) {
        let mut sketch = KllSketch::<i32>::with_seed(k, seed);
        let mut n = 0u64;
        let mut min = i32::MAX;
        let mut max = i32::MIN;

        for op in ops {
            match op {
                Op::Update(item) => {
                    sketch.update(item).unwrap();
                    n += 1;
                    min = min.min(item);
                    max = max.max(item);
                }
                Op::Merge { items, seed } => {
                    let mut other = KllSketch::with_seed(k, seed);
                    for item in &items {
                        other.update(*item).unwrap();
                        min = min.min(*item);
                        max = max.max(*item);
                    }
                    n += items.len() as u64;
                    sketch.merge(&other).unwrap();
                }
            }

            prop_assert_eq!(sketch.n(), n);
            prop_assert_eq!(sketch.is_empty(), n == 0);
            let total: u64 = sketch.iter().map(|(_, weight)| weight).sum();
            prop_assert_eq!(total, n);
            prop_assert_eq!(sketch.is_estimation_mode(), n > u64::from(k));
            if n > 0 {
                prop_assert_eq!(*sketch.min_item().unwrap(), min);
                prop_assert_eq!(*sketch.max_item().unwrap(), max);
            }
        }

        // decoding rejects any level above its capacity
        let restored = KllSketch::<i32>::deserialize(&sketch.serialize()).unwrap();
        prop_assert_eq!(restored.n(), n);
        prop_assert_eq!(restored.num_retained(), sketch.num_retained());
    }

    #[test]
    fn property_test_queries_are_consistent(
        items in prop::collection::vec(-1_000i32..1_000, 1..2_000),
        query in -1_100i32..1_100,
        rank in 0.0f64..=1.0,
    ) {
        let mut sketch = KllSketch::<i32>::with_seed(32, 1);
        for item in &items {
            sketch.update(*item).unwrap();
        }

        let exclusive = sketch.rank(&query, false).unwrap();
        let inclusive = sketch.rank(&query, true).unwrap();
        prop_assert!((0.0..=1.0).contains(&exclusive));
        prop_assert!(exclusive <= inclusive);

        let quantile = sketch.quantile(rank, true).unwrap();
        prop_assert!(quantile >= *sketch.min_item().unwrap());
        prop_assert!(quantile <= *sketch.max_item().unwrap());
        prop_assert!(sketch.rank(&quantile, true).unwrap() >= rank - 1e-9);

        let cdf = sketch.cdf(&[query], false).unwrap();
        prop_assert_eq!(cdf, vec![exclusive, 1.0]);
    }
}
