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

//! Binary serialization of KLL sketches.
//!
//! All multi-byte fields are little-endian.
//!
//! ```text
//! byte 0      preamble ints: 2 for an empty sketch, 5 otherwise
//! byte 1      serial version
//! byte 2      family id
//! byte 3      flags
//! bytes 4-5   k
//! byte 6      m
//! byte 7      item type tag
//! -- end of an empty sketch --
//! bytes 8-15  n
//! byte 16     number of levels
//! bytes 17-19 unused
//! then        one u32 retained count per level
//! then        min item, max item
//! then        retained items, level 0 first
//! ```

use std::cmp::Ordering;

use tracing::debug;

use super::DEFAULT_M;
use super::MAX_K;
use super::MIN_K;
use super::capacity::level_capacity;
use super::compactor::Compactor;
use super::hierarchy::LevelHierarchy;
use super::item::KllItem;
use super::sketch::KllSketch;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::random::XorShift64;
use crate::error::Error;

/// Family ID for KLL sketches in DataSketches format.
pub const KLL_FAMILY_ID: u8 = 15;

/// The only serialization version this crate reads and writes.
pub const SERIAL_VERSION: u8 = 1;

/// Preamble ints for empty sketches.
pub const PREAMBLE_INTS_EMPTY: u8 = 2;
/// Preamble ints for sketches with at least one item.
pub const PREAMBLE_INTS_FULL: u8 = 5;

/// Flag indicating the sketch is empty.
pub const FLAG_EMPTY: u8 = 1 << 0;
/// Flag indicating level zero is sorted.
pub const FLAG_LEVEL_ZERO_SORTED: u8 = 1 << 1;
/// Flag indicating the sketch has a single level and answers exactly.
pub const FLAG_EXACT_MODE: u8 = 1 << 2;

/// Serialized size for an empty sketch in bytes.
pub const EMPTY_SIZE_BYTES: usize = 8;
/// Offset of the per-level counts for sketches with at least one item.
pub const DATA_START: usize = 20;

/// Items at level 63 already weigh 2^63; a 64-bit `n` cannot fill a taller hierarchy.
pub const MAX_NUM_LEVELS: usize = 64;

pub(crate) fn serialized_size<T: KllItem>(sketch: &KllSketch<T>) -> usize {
    if sketch.is_empty() {
        return EMPTY_SIZE_BYTES;
    }
    let hierarchy = sketch.hierarchy();
    let mut size = DATA_START + hierarchy.height() * 4;
    if let (Ok(min), Ok(max)) = (sketch.min_item(), sketch.max_item()) {
        size += T::serialized_size(min) + T::serialized_size(max);
    }
    size += hierarchy
        .weighted_items()
        .map(|(item, _)| T::serialized_size(item))
        .sum::<usize>();
    size
}

pub(crate) fn serialize<T: KllItem>(sketch: &KllSketch<T>) -> Vec<u8> {
    let hierarchy = sketch.hierarchy();
    let mut bytes = SketchBytes::with_capacity(serialized_size(sketch));

    let is_empty = sketch.is_empty();
    let flags = (if is_empty { FLAG_EMPTY } else { 0 })
        | (if hierarchy.is_level_zero_sorted() {
            FLAG_LEVEL_ZERO_SORTED
        } else {
            0
        })
        | (if hierarchy.height() == 1 {
            FLAG_EXACT_MODE
        } else {
            0
        });

    bytes.write_u8(if is_empty {
        PREAMBLE_INTS_EMPTY
    } else {
        PREAMBLE_INTS_FULL
    });
    bytes.write_u8(SERIAL_VERSION);
    bytes.write_u8(KLL_FAMILY_ID);
    bytes.write_u8(flags);
    bytes.write_u16_le(hierarchy.k());
    bytes.write_u8(hierarchy.m());
    bytes.write_u8(T::TYPE_TAG);

    if is_empty {
        return bytes.into_bytes();
    }

    bytes.write_u64_le(sketch.n());
    bytes.write_u8(hierarchy.height() as u8);
    bytes.write(&[0u8; 3]);
    for compactor in hierarchy.compactors() {
        bytes.write_u32_le(compactor.len() as u32);
    }

    if let (Ok(min), Ok(max)) = (sketch.min_item(), sketch.max_item()) {
        T::serialize(min, &mut bytes);
        T::serialize(max, &mut bytes);
    }
    for (item, _) in hierarchy.weighted_items() {
        T::serialize(item, &mut bytes);
    }

    bytes.into_bytes()
}

pub(crate) fn deserialize<T: KllItem>(
    bytes: &[u8],
    rng: XorShift64,
) -> Result<KllSketch<T>, Error> {
    decode(bytes, rng).inspect_err(|err| {
        debug!(len = bytes.len(), error = %err, "rejected kll sketch image");
    })
}

fn decode<T: KllItem>(bytes: &[u8], rng: XorShift64) -> Result<KllSketch<T>, Error> {
    fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
        move |err| Error::insufficient_data(tag).set_source(err)
    }

    let mut cursor = SketchSlice::new(bytes);

    let preamble_ints = cursor.read_u8().map_err(make_error("preamble_ints"))?;
    let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
    let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
    let flags = cursor.read_u8().map_err(make_error("flags"))?;
    let k = cursor.read_u16_le().map_err(make_error("k"))?;
    let m = cursor.read_u8().map_err(make_error("m"))?;
    let type_tag = cursor.read_u8().map_err(make_error("type_tag"))?;

    if family_id != KLL_FAMILY_ID {
        return Err(Error::invalid_family(KLL_FAMILY_ID, family_id, "KLL"));
    }
    if serial_version != SERIAL_VERSION {
        return Err(Error::deserial(format!(
            "unsupported serial version: expected {SERIAL_VERSION}, got {serial_version}"
        )));
    }
    if type_tag != T::TYPE_TAG {
        return Err(Error::deserial(format!(
            "item type mismatch: expected tag {}, got {type_tag}",
            T::TYPE_TAG
        )));
    }
    if m != DEFAULT_M {
        return Err(Error::deserial(format!(
            "invalid m: expected {DEFAULT_M}, got {m}"
        )));
    }
    if !(MIN_K..=MAX_K).contains(&k) {
        return Err(Error::deserial(format!("k out of range: {k}")));
    }

    let is_empty = (flags & FLAG_EMPTY) != 0;
    let expected_preamble_ints = if is_empty {
        PREAMBLE_INTS_EMPTY
    } else {
        PREAMBLE_INTS_FULL
    };
    if preamble_ints != expected_preamble_ints {
        return Err(Error::deserial(format!(
            "invalid preamble ints: expected {expected_preamble_ints}, got {preamble_ints}"
        )));
    }

    if is_empty {
        return Ok(KllSketch::from_parts(
            LevelHierarchy::new(k, m),
            0,
            None,
            None,
            rng,
        ));
    }

    let n = cursor.read_u64_le().map_err(make_error("n"))?;
    let num_levels = cursor.read_u8().map_err(make_error("num_levels"))? as usize;
    let mut unused = [0u8; 3];
    cursor
        .read_exact(&mut unused)
        .map_err(make_error("unused"))?;

    if n == 0 {
        return Err(Error::deserial("non-empty sketch with n = 0"));
    }
    if num_levels == 0 || num_levels > MAX_NUM_LEVELS {
        return Err(Error::deserial(format!(
            "num_levels must be in [1, {MAX_NUM_LEVELS}], got {num_levels}"
        )));
    }
    let is_exact_mode = (flags & FLAG_EXACT_MODE) != 0;
    if is_exact_mode != (num_levels == 1) {
        return Err(Error::deserial(
            "exact mode flag disagrees with the number of levels",
        )
        .with_context("num_levels", num_levels));
    }

    let mut level_sizes = Vec::with_capacity(num_levels);
    for level in 0..num_levels {
        let size = cursor.read_u32_le().map_err(make_error("level_sizes"))? as usize;
        let capacity = level_capacity(k, m);
        if size > capacity {
            return Err(Error::deserial("level holds more items than its capacity")
                .with_context("level", level)
                .with_context("size", size)
                .with_context("capacity", capacity));
        }
        level_sizes.push(size);
    }

    let min_item = read_item::<T>(&mut cursor)?;
    let max_item = read_item::<T>(&mut cursor)?;
    if T::cmp(&min_item, &max_item) == Ordering::Greater {
        return Err(Error::deserial("min item is greater than max item"));
    }

    let mut compactors = Vec::with_capacity(num_levels);
    for (level, size) in level_sizes.into_iter().enumerate() {
        let mut items = Vec::with_capacity(size);
        for _ in 0..size {
            let item = read_item::<T>(&mut cursor)?;
            if T::cmp(&item, &min_item) == Ordering::Less
                || T::cmp(&item, &max_item) == Ordering::Greater
            {
                return Err(
                    Error::deserial("retained item outside [min_item, max_item]")
                        .with_context("level", level),
                );
            }
            items.push(item);
        }
        let mut sorted = items
            .windows(2)
            .all(|pair| T::cmp(&pair[0], &pair[1]) != Ordering::Greater);
        if level == 0 {
            sorted &= (flags & FLAG_LEVEL_ZERO_SORTED) != 0;
        }
        compactors.push(Compactor::from_items(level, items, sorted));
    }

    let hierarchy = LevelHierarchy::from_compactors(k, m, compactors);
    match hierarchy.total_weight() {
        Some(total) if total == n => {}
        total => {
            return Err(Error::deserial("retained weight does not match n")
                .with_context("n", n)
                .with_context("weight", format!("{total:?}")));
        }
    }

    Ok(KllSketch::from_parts(
        hierarchy,
        n,
        Some(min_item),
        Some(max_item),
        rng,
    ))
}

fn read_item<T: KllItem>(cursor: &mut SketchSlice<'_>) -> Result<T, Error> {
    let item = T::deserialize(cursor)?;
    if T::is_nan(&item) {
        return Err(Error::deserial("serialized item is NaN"));
    }
    Ok(item)
}
