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

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;

/// Capability set required of the items stored in a [`KllSketch`](super::KllSketch).
///
/// An item type supplies a total order over the values it admits, a byte encoding, and a
/// one-byte type tag that is written into the serialized image so that bytes produced for one
/// item type are rejected when read back as another.
///
/// Values for which [`KllItem::is_nan`] returns true are refused by
/// [`KllSketch::update`](super::KllSketch::update) and never reach the comparator.
///
/// Tags below 128 are reserved for the implementations in this crate.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
///
/// use datasketches_quantiles::codec::{SketchBytes, SketchSlice};
/// use datasketches_quantiles::error::Error;
/// use datasketches_quantiles::kll::{KllItem, KllSketch};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Version(u16, u16);
///
/// impl KllItem for Version {
///     const TYPE_TAG: u8 = 200;
///
///     fn cmp(a: &Self, b: &Self) -> Ordering {
///         (a.0, a.1).cmp(&(b.0, b.1))
///     }
///
///     fn serialized_size(_value: &Self) -> usize {
///         4
///     }
///
///     fn serialize(value: &Self, bytes: &mut SketchBytes) {
///         bytes.write_u16_le(value.0);
///         bytes.write_u16_le(value.1);
///     }
///
///     fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
///         let major = input.read_u16_le().map_err(|_| Error::new(
///             datasketches_quantiles::error::ErrorKind::CorruptData, "version"))?;
///         let minor = input.read_u16_le().map_err(|_| Error::new(
///             datasketches_quantiles::error::ErrorKind::CorruptData, "version"))?;
///         Ok(Version(major, minor))
///     }
/// }
///
/// let mut sketch = KllSketch::new(200);
/// sketch.update(Version(1, 2)).unwrap();
/// sketch.update(Version(1, 10)).unwrap();
/// assert_eq!(sketch.max_item().unwrap(), &Version(1, 10));
/// ```
pub trait KllItem: Clone {
    /// Identifies the item type in serialized images.
    const TYPE_TAG: u8;

    /// Compare two items.
    fn cmp(a: &Self, b: &Self) -> Ordering;

    /// Returns true if the item is NaN.
    fn is_nan(_value: &Self) -> bool {
        false
    }

    /// Serialized size in bytes.
    fn serialized_size(value: &Self) -> usize;

    /// Serialize a single item into the buffer.
    fn serialize(value: &Self, bytes: &mut SketchBytes);

    /// Deserialize a single item from the input.
    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error>;
}

impl KllItem for f32 {
    const TYPE_TAG: u8 = 1;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
    }

    fn is_nan(value: &Self) -> bool {
        value.is_nan()
    }

    fn serialized_size(_value: &Self) -> usize {
        4
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_f32_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_f32_le()
            .map_err(|err| Error::insufficient_data("f32").set_source(err))
    }
}

impl KllItem for f64 {
    const TYPE_TAG: u8 = 2;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
    }

    fn is_nan(value: &Self) -> bool {
        value.is_nan()
    }

    fn serialized_size(_value: &Self) -> usize {
        8
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_f64_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_f64_le()
            .map_err(|err| Error::insufficient_data("f64").set_source(err))
    }
}

impl KllItem for i32 {
    const TYPE_TAG: u8 = 3;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        Ord::cmp(a, b)
    }

    fn serialized_size(_value: &Self) -> usize {
        4
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_i32_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_i32_le()
            .map_err(|err| Error::insufficient_data("i32").set_source(err))
    }
}

impl KllItem for i64 {
    const TYPE_TAG: u8 = 4;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        Ord::cmp(a, b)
    }

    fn serialized_size(_value: &Self) -> usize {
        8
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_i64_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_i64_le()
            .map_err(|err| Error::insufficient_data("i64").set_source(err))
    }
}

impl KllItem for u64 {
    const TYPE_TAG: u8 = 5;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        Ord::cmp(a, b)
    }

    fn serialized_size(_value: &Self) -> usize {
        8
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_u64_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_u64_le()
            .map_err(|err| Error::insufficient_data("u64").set_source(err))
    }
}

impl KllItem for String {
    const TYPE_TAG: u8 = 6;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        Ord::cmp(a, b)
    }

    fn serialized_size(value: &Self) -> usize {
        4 + value.len()
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_u32_le(value.len() as u32);
        bytes.write(value.as_bytes());
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        let len = input
            .read_u32_le()
            .map_err(|err| Error::insufficient_data("string_len").set_source(err))?
            as usize;
        if len > input.remaining() {
            return Err(Error::insufficient_data("string_bytes")
                .with_context("declared", len)
                .with_context("remaining", input.remaining()));
        }
        let mut buf = vec![0u8; len];
        input
            .read_exact(&mut buf)
            .map_err(|err| Error::insufficient_data("string_bytes").set_source(err))?;
        String::from_utf8(buf).map_err(|err| Error::deserial("invalid utf-8 string").set_source(err))
    }
}
