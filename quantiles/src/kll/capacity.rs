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

//! Per-level capacity schedule.
//!
//! Every level of a hierarchy may hold up to `k` items, and never fewer than `m` so that a
//! level always has something to compact. The schedule is flat: it never increases with the
//! level index, and level 0, which holds the raw unweighted items, is never smaller than any
//! level above it. A hierarchy of height `h` retains at most `h * k` items, which is
//! `O(k log(n / k))` for a stream of `n` items.

/// Returns the maximum number of items any single level may retain.
pub(crate) fn level_capacity(k: u16, m: u8) -> usize {
    usize::from(k).max(usize::from(m))
}

/// Returns the sum of all level capacities of a hierarchy of `height` levels.
pub(crate) fn total_capacity(k: u16, m: u8, height: usize) -> usize {
    level_capacity(k, m) * height
}
