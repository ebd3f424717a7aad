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

//! The compact wire format: a big-endian header (version tag, compression,
//! centroid count) followed by the centroid means as delta-encoded f32 values
//! and the counts as unsigned LEB128 varints. The layout matches the
//! `asSmallBytes` output of the reference Java implementation, so payloads
//! interoperate both ways.

use std::io;
use std::io::Read;

use byteorder::ReadBytesExt;
use byteorder::BE;

use crate::codec;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::sketch::TDigest;

/// Wire tag of the delta-encoded "small" layout.
const SMALL_ENCODING: i32 = 2;
/// Fixed-width prefix: version tag, compression, centroid count.
const HEADER_SIZE_BYTES: usize = 16;
/// Bytes per delta-encoded centroid mean.
const MEAN_SIZE_BYTES: usize = 4;
/// Centroid counts past this bound are treated as corruption.
const MAX_CENTROID_COUNT: i32 = 1 << 22;

fn read_error(tag: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::insufficient_data(tag),
        io::ErrorKind::InvalidData => Error::deserial(format!("bad varint: {tag}")),
        _ => Error::io(err),
    }
}

fn check_compression(compression: f64) -> Result<(), Error> {
    if compression.is_nan() || compression < 1.0 {
        return Err(Error::deserial(format!(
            "bad compression in serialization: {compression}"
        )));
    }
    Ok(())
}

fn check_centroid_count(count: i32) -> Result<usize, Error> {
    if count < 0 || count > MAX_CENTROID_COUNT {
        return Err(Error::deserial(format!(
            "bad number of centroids in serialization: {count}"
        )));
    }
    Ok(count as usize)
}

fn check_centroid_weight(weight: u64) -> Result<u32, Error> {
    if weight == 0 || weight > u64::from(u32::MAX) {
        return Err(Error::deserial(format!(
            "bad centroid weight in serialization: {weight}"
        )));
    }
    Ok(weight as u32)
}

impl TDigest {
    /// Serializes the digest into a fresh byte array so it can be saved to
    /// disk or sent over the wire.
    ///
    /// The encoding is deterministic: equal digests serialize to equal
    /// bytes.
    ///
    /// # Errors
    ///
    /// Reserved for encoder failures; encoding into memory does not fail.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// let mut digest = TDigest::new();
    /// digest.add(42.0).unwrap();
    ///
    /// let bytes = digest.as_bytes().unwrap();
    /// let decoded = TDigest::from_reader(&bytes[..]).unwrap();
    /// assert_eq!(decoded.count(), 1);
    /// ```
    pub fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = SketchBytes::with_capacity(self.encoded_size_upper_bound());
        self.encode_into(&mut bytes);
        Ok(bytes.into_bytes())
    }

    /// Serializes the digest into the supplied buffer, avoiding a fresh
    /// allocation when its capacity is large enough. Previous contents are
    /// discarded.
    pub fn to_bytes(&self, buf: &mut Vec<u8>) {
        let mut recycled = std::mem::take(buf);
        recycled.clear();
        recycled.reserve(self.encoded_size_upper_bound());
        let mut bytes = SketchBytes::from_vec(recycled);
        self.encode_into(&mut bytes);
        *buf = bytes.into_bytes();
    }

    fn encoded_size_upper_bound(&self) -> usize {
        // varints take at most five bytes for a u32 count
        HEADER_SIZE_BYTES + self.len() * (MEAN_SIZE_BYTES + 5)
    }

    fn encode_into(&self, bytes: &mut SketchBytes) {
        bytes.write_i32_be(SMALL_ENCODING);
        bytes.write_f64_be(self.compression());
        bytes.write_i32_be(self.len() as i32);

        let mut previous = 0.0f64;
        self.for_each_centroid(|mean, _| {
            bytes.write_f32_be((mean - previous) as f32);
            previous = mean;
            true
        });
        self.for_each_centroid(|_, count| {
            bytes.write_uvarint(u64::from(count));
            true
        });
    }

    /// Reads a serialized digest from the given reader and deserializes it.
    ///
    /// The digest is rebuilt by replaying the decoded centroids, so the
    /// result is fully functional and carries the compression stored in the
    /// payload together with the default randomness source.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported version tag, an implausible centroid count,
    /// malformed centroid data, a short read, or a failing reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<TDigest, Error> {
        let encoding = reader
            .read_i32::<BE>()
            .map_err(read_error("encoding version"))?;
        if encoding != SMALL_ENCODING {
            return Err(Error::unsupported_encoding(SMALL_ENCODING, encoding));
        }

        let compression = reader
            .read_f64::<BE>()
            .map_err(read_error("compression"))?;
        check_compression(compression)?;

        let count = reader
            .read_i32::<BE>()
            .map_err(read_error("centroid count"))?;
        let count = check_centroid_count(count)?;

        let mut means = Vec::with_capacity(count);
        let mut mean = 0.0f64;
        for _ in 0..count {
            let delta = reader
                .read_f32::<BE>()
                .map_err(read_error("centroid mean delta"))?;
            mean += f64::from(delta);
            if mean.is_nan() {
                return Err(Error::deserial("bad centroid mean in serialization: NaN"));
            }
            means.push(mean);
        }

        let mut digest = TDigest::for_decode(compression, count);
        for mean in means {
            let weight = codec::read_uvarint(&mut reader)
                .map_err(read_error("centroid weight"))?;
            let weight = check_centroid_weight(weight)?;
            digest.add_weighted(mean, weight)?;
        }
        Ok(digest)
    }

    /// Deserializes a payload into this digest, re-using its buffers.
    ///
    /// The whole payload is validated before anything is touched: on error
    /// the digest keeps its previous contents, on success it is fully
    /// replaced (compression included).
    ///
    /// # Errors
    ///
    /// Fails on an unsupported version tag, an implausible centroid count,
    /// malformed centroid data, or a truncated buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// let mut source = TDigest::new();
    /// source.add(42.0).unwrap();
    /// let bytes = source.as_bytes().unwrap();
    ///
    /// let mut target = TDigest::new();
    /// target.add(7.0).unwrap();
    /// target.from_bytes(&bytes).unwrap();
    /// assert_eq!(target.count(), 1);
    /// assert_eq!(target.quantile(0.5), 42.0);
    /// ```
    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut cursor = SketchSlice::new(bytes);

        let encoding = cursor
            .read_i32_be()
            .map_err(read_error("encoding version"))?;
        if encoding != SMALL_ENCODING {
            return Err(Error::unsupported_encoding(SMALL_ENCODING, encoding));
        }

        let compression = cursor.read_f64_be().map_err(read_error("compression"))?;
        check_compression(compression)?;

        let count = cursor
            .read_i32_be()
            .map_err(read_error("centroid count"))?;
        let count = check_centroid_count(count)?;

        // Validation pass: walk the entire payload before mutating anything,
        // so a malformed buffer leaves this digest untouched.
        let mut mean = 0.0f64;
        for _ in 0..count {
            let delta = cursor
                .read_f32_be()
                .map_err(read_error("centroid mean delta"))?;
            mean += f64::from(delta);
            if mean.is_nan() {
                return Err(Error::deserial("bad centroid mean in serialization: NaN"));
            }
        }
        let mut total = 0u64;
        for _ in 0..count {
            let weight = cursor
                .read_uvarint()
                .map_err(read_error("centroid weight"))?;
            let weight = check_centroid_weight(weight)?;
            total += u64::from(weight);
        }

        // Rebuild pass over the now-validated regions.
        let means_region = &bytes[HEADER_SIZE_BYTES..HEADER_SIZE_BYTES + count * MEAN_SIZE_BYTES];
        let counts_region = &bytes[HEADER_SIZE_BYTES + count * MEAN_SIZE_BYTES..];

        let summary = self.summary_mut();
        summary.means.clear();
        summary.counts.clear();

        let mut mean = 0.0f64;
        for chunk in means_region.chunks_exact(MEAN_SIZE_BYTES) {
            mean += f64::from(f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            summary.means.push(mean);
        }

        let mut cursor = SketchSlice::new(counts_region);
        for _ in 0..count {
            let weight = cursor
                .read_uvarint()
                .map_err(read_error("centroid weight"))?;
            summary.counts.push(weight as u32);
        }

        self.set_compression(compression);
        self.set_count(total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::sketch::TDigest;
    use crate::summary::Summary;

    fn digest_from_centroids(centroids: &[(f64, u32)]) -> TDigest {
        let mut digest = TDigest::for_decode(100.0, centroids.len());
        let mut total = 0u64;
        let mut summary = Summary::with_capacity(centroids.len());
        for &(mean, count) in centroids {
            summary.means.push(mean);
            summary.counts.push(count);
            total += u64::from(count);
        }
        *digest.summary_mut() = summary;
        digest.set_count(total);
        digest
    }

    #[test]
    fn test_header_layout() {
        let digest = digest_from_centroids(&[(0.5, 3)]);
        let bytes = digest.as_bytes().unwrap();

        // version tag 2, compression 100.0, one centroid
        assert_eq!(&bytes[0..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[4..12], &100.0f64.to_be_bytes());
        assert_eq!(&bytes[12..16], &[0, 0, 0, 1]);
        // first delta is relative to 0.0
        assert_eq!(&bytes[16..20], &0.5f32.to_be_bytes());
        // count 3 fits a single varint byte
        assert_eq!(&bytes[20..], &[3]);
    }

    #[test]
    fn test_means_are_delta_encoded() {
        let digest = digest_from_centroids(&[(1.0, 1), (3.0, 1), (7.0, 1)]);
        let bytes = digest.as_bytes().unwrap();

        assert_eq!(&bytes[16..20], &1.0f32.to_be_bytes());
        assert_eq!(&bytes[20..24], &2.0f32.to_be_bytes());
        assert_eq!(&bytes[24..28], &4.0f32.to_be_bytes());
    }

    #[test]
    fn test_empty_digest_round_trip() {
        let digest = TDigest::new();
        let bytes = digest.as_bytes().unwrap();
        assert_eq!(bytes.len(), 16);

        let decoded = TDigest::from_reader(&bytes[..]).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.count(), 0);
        assert_eq!(decoded.compression(), 100.0);
    }

    #[test]
    fn test_to_bytes_reuses_buffer() {
        let digest = digest_from_centroids(&[(1.0, 1), (2.0, 2)]);
        let expected = digest.as_bytes().unwrap();

        let mut buf = Vec::with_capacity(64);
        let data = buf.as_ptr();
        digest.to_bytes(&mut buf);
        assert_eq!(buf, expected);
        assert_eq!(buf.as_ptr(), data);

        // stale contents from a previous encode are discarded
        let mut buf = expected.clone();
        buf.extend_from_slice(&[0xAA; 32]);
        digest.to_bytes(&mut buf);
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_from_bytes_rejects_zero_weight() {
        let digest = digest_from_centroids(&[(1.0, 1)]);
        let mut bytes = digest.as_bytes().unwrap();
        *bytes.last_mut().unwrap() = 0;

        let mut target = TDigest::new();
        assert!(target.from_bytes(&bytes).is_err());
        assert!(TDigest::from_reader(&bytes[..]).is_err());
    }
}
