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

use std::io;
use std::io::Cursor;
use std::io::Read;

/// Longest legal encoding of a u64 varint: ten 7-bit groups.
const MAX_UVARINT_BYTES: u32 = 10;

/// Reads an unsigned LEB128 varint from the given reader.
///
/// Fails with `UnexpectedEof` on a short read and with `InvalidData` when the
/// encoding runs past the ten bytes a u64 can need or overflows 64 bits.
pub(crate) fn read_uvarint<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        let group = byte[0];
        if shift == 7 * (MAX_UVARINT_BYTES - 1) && group > 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint overflows 64 bits",
            ));
        }
        value |= u64::from(group & 0x7f) << shift;
        if group & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 7 * MAX_UVARINT_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint is too long",
            ));
        }
    }
}

/// A wrapper around a byte slice that provides methods for reading the data
/// types the digest wire format is made of.
pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    /// Creates a new `SketchSlice` from the given byte slice.
    pub(crate) fn new(slice: &[u8]) -> SketchSlice<'_> {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    /// Reads exactly `buf.len()` bytes from the slice into `buf`.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    /// Reads a 32-bit signed integer in big-endian byte order.
    pub(crate) fn read_i32_be(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Reads a 32-bit floating-point number in big-endian byte order.
    pub(crate) fn read_f32_be(&mut self) -> io::Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    /// Reads a 64-bit floating-point number in big-endian byte order.
    pub(crate) fn read_f64_be(&mut self) -> io::Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Reads an unsigned LEB128 varint.
    pub(crate) fn read_uvarint(&mut self) -> io::Result<u64> {
        read_uvarint(&mut self.slice)
    }
}

#[cfg(test)]
mod tests {
    use super::read_uvarint;
    use super::SketchSlice;
    use crate::codec::SketchBytes;

    #[test]
    fn test_uvarint_round_trip() {
        let values = [
            0u64,
            10,
            100,
            1000,
            10_000,
            65_535,
            2_147_483_647,
            2 * u64::from(u32::MAX),
            u64::MAX,
        ];

        let mut bytes = SketchBytes::with_capacity(64);
        for &value in &values {
            bytes.write_uvarint(value);
        }

        let encoded = bytes.into_bytes();
        let mut slice = SketchSlice::new(&encoded);
        for &value in &values {
            assert_eq!(slice.read_uvarint().unwrap(), value);
        }
    }

    #[test]
    fn test_uvarint_single_byte_boundary() {
        let mut bytes = SketchBytes::with_capacity(4);
        bytes.write_uvarint(127);
        bytes.write_uvarint(128);
        let encoded = bytes.into_bytes();
        assert_eq!(encoded, vec![0x7f, 0x80, 0x01]);
    }

    #[test]
    fn test_uvarint_truncated() {
        let mut reader: &[u8] = &[0x80, 0x80];
        let err = read_uvarint(&mut reader).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_uvarint_overlong() {
        let mut reader: &[u8] = &[0x80; 11];
        let err = read_uvarint(&mut reader).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_uvarint_max_is_ten_bytes() {
        let mut bytes = SketchBytes::with_capacity(10);
        bytes.write_uvarint(u64::MAX);
        assert_eq!(bytes.into_bytes().len(), 10);
    }
}
