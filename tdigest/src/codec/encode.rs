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

/// A wrapper around a `Vec<u8>` that provides methods for writing the data
/// types the digest wire format is made of. The format is big-endian except
/// for centroid counts, which are unsigned LEB128 varints.
pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    /// Constructs an empty `SketchBytes` with at least the specified capacity.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Constructs a `SketchBytes` that appends to the given buffer, so callers
    /// can recycle an allocation across encodes.
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Consumes the `SketchBytes` and returns the underlying `Vec<u8>`.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Writes a 32-bit signed integer in big-endian byte order.
    pub(crate) fn write_i32_be(&mut self, n: i32) {
        self.bytes.extend_from_slice(&n.to_be_bytes());
    }

    /// Writes a 32-bit floating-point number in big-endian byte order.
    pub(crate) fn write_f32_be(&mut self, n: f32) {
        self.bytes.extend_from_slice(&n.to_be_bytes());
    }

    /// Writes a 64-bit floating-point number in big-endian byte order.
    pub(crate) fn write_f64_be(&mut self, n: f64) {
        self.bytes.extend_from_slice(&n.to_be_bytes());
    }

    /// Writes an unsigned LEB128 varint: 7-bit groups starting from the least
    /// significant, high bit set on every group but the last.
    pub(crate) fn write_uvarint(&mut self, mut n: u64) {
        while n >= 0x80 {
            self.bytes.push((n as u8) | 0x80);
            n >>= 7;
        }
        self.bytes.push(n as u8);
    }
}
