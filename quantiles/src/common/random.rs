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

//! Per-instance random streams for randomized compaction.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Number of forks taken in this process; each fork mixes in a distinct value.
static FORKS: AtomicU64 = AtomicU64::new(0);

/// Random number source for sketches.
pub trait RandomSource {
    /// Returns the next random 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Returns a random boolean value.
    fn next_bool(&mut self) -> bool {
        // xorshift low bits are weaker than high bits
        (self.next_u64() >> 63) != 0
    }
}

/// Xorshift-based random generator for sketch operations.
///
/// Each sketch owns one of these; nothing is shared across instances or threads.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Creates a new generator using the provided seed.
    ///
    /// The seed is scrambled first so that nearby seeds give unrelated streams.
    pub fn seeded(seed: u64) -> Self {
        let state = splitmix64(seed);
        let state = if state == 0 { GOLDEN_GAMMA } else { state };
        Self { state }
    }

    /// Derives a generator with its own stream without advancing this one.
    ///
    /// Repeated forks of the same parent state yield different streams, since every fork
    /// mixes in a process-wide counter. Forked streams are therefore not reproducible.
    pub fn fork(&self) -> Self {
        let count = FORKS.fetch_add(1, Ordering::Relaxed);
        let salt = splitmix64(count).rotate_left(17);
        Self::seeded(self.state ^ salt)
    }
}

impl Default for XorShift64 {
    fn default() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        // Stack addresses differ between threads that seed in the same clock tick.
        let marker = 0u8;
        let addr = &marker as *const u8 as usize as u64;
        Self::seeded(nanos as u64 ^ (std::process::id() as u64).rotate_left(32) ^ addr)
    }
}

impl RandomSource for XorShift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}
