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

//! Little-endian byte writer and reader shared by the sketch serializers.

use std::io;
use std::io::Cursor;
use std::io::Read;

use byteorder::LE;
use byteorder::ReadBytesExt;

/// A growable byte buffer that sketch images are written into.
pub struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    /// Constructs an empty `SketchBytes` with at least the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Consumes the `SketchBytes` and returns the underlying `Vec<u8>`.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes the given byte slice.
    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    /// Writes a 16-bit unsigned integer in little-endian byte order.
    pub fn write_u16_le(&mut self, n: u16) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a 32-bit unsigned integer in little-endian byte order.
    pub fn write_u32_le(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a 32-bit signed integer in little-endian byte order.
    pub fn write_i32_le(&mut self, n: i32) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a 64-bit unsigned integer in little-endian byte order.
    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a 64-bit signed integer in little-endian byte order.
    pub fn write_i64_le(&mut self, n: i64) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a 32-bit floating-point number in little-endian byte order.
    pub fn write_f32_le(&mut self, n: f32) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a 64-bit floating-point number in little-endian byte order.
    pub fn write_f64_le(&mut self, n: f64) {
        self.write(&n.to_le_bytes());
    }
}

/// A read cursor over a serialized sketch image.
pub struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl<'a> SketchSlice<'a> {
    /// Creates a cursor positioned at the start of `slice`.
    pub fn new(slice: &'a [u8]) -> Self {
        Self {
            slice: Cursor::new(slice),
        }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        let len = self.slice.get_ref().len() as u64;
        len.saturating_sub(self.slice.position()) as usize
    }

    /// Fills `buf` completely or fails with [`io::ErrorKind::UnexpectedEof`].
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.slice.read_u8()
    }

    /// Reads a 16-bit unsigned integer in little-endian byte order.
    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        self.slice.read_u16::<LE>()
    }

    /// Reads a 32-bit unsigned integer in little-endian byte order.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.slice.read_u32::<LE>()
    }

    /// Reads a 32-bit signed integer in little-endian byte order.
    pub fn read_i32_le(&mut self) -> io::Result<i32> {
        self.slice.read_i32::<LE>()
    }

    /// Reads a 64-bit unsigned integer in little-endian byte order.
    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        self.slice.read_u64::<LE>()
    }

    /// Reads a 64-bit signed integer in little-endian byte order.
    pub fn read_i64_le(&mut self) -> io::Result<i64> {
        self.slice.read_i64::<LE>()
    }

    /// Reads a 32-bit floating-point number in little-endian byte order.
    pub fn read_f32_le(&mut self) -> io::Result<f32> {
        self.slice.read_f32::<LE>()
    }

    /// Reads a 64-bit floating-point number in little-endian byte order.
    pub fn read_f64_le(&mut self) -> io::Result<f64> {
        self.slice.read_f64::<LE>()
    }
}
