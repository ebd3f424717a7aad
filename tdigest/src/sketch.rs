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

use crate::error::Error;
use crate::options::TDigestOption;
use crate::rng::DigestRng;
use crate::rng::GlobalRng;
use crate::summary::Summary;

/// Compression used when no option overrides it.
const DEFAULT_COMPRESSION: f64 = 100.0;
/// Initial summary capacity, in centroids per unit of compression.
const INITIAL_CAPACITY_FACTOR: f64 = 10.0;
/// A summary growing past this multiple of the compression is compressed.
const COMPRESSION_TRIGGER_FACTOR: f64 = 20.0;

fn estimate_capacity(compression: f64) -> usize {
    (compression * INITIAL_CAPACITY_FACTOR) as usize
}

/// T-Digest is a quantile approximation data structure.
///
/// Typical use cases involve accumulating metrics on several distinct nodes
/// of a cluster and then merging them together to get a system-wide quantile
/// overview: sensory data from IoT devices, performance metrics for
/// distributed systems, quantiles over enormous document datasets, etc.
///
/// # Examples
///
/// ```
/// # use tdigest::TDigest;
/// # use tdigest::TDigestOption;
/// let mut digest = TDigest::with_options([TDigestOption::Compression(100)]).unwrap();
/// for sample in [10.0, 20.0, 30.0] {
///     digest.add(sample).unwrap();
/// }
/// assert_eq!(digest.quantile(0.5), 20.0);
/// assert_eq!(digest.count(), 3);
/// ```
#[derive(Debug)]
pub struct TDigest {
    summary: Summary,
    compression: f64,
    count: u64,
    rng: Box<dyn DigestRng>,
}

impl Default for TDigest {
    fn default() -> Self {
        TDigest::new()
    }
}

impl TDigest {
    /// Creates a new digest with a configuration that should be useful for
    /// most use cases: compression set to 100 and the process-global random
    /// number generator.
    pub fn new() -> TDigest {
        TDigest {
            summary: Summary::with_capacity(estimate_capacity(DEFAULT_COMPRESSION)),
            compression: DEFAULT_COMPRESSION,
            count: 0,
            rng: Box::new(GlobalRng),
        }
    }

    /// Creates a new digest, applying the given options in order.
    ///
    /// # Errors
    ///
    /// The first option that fails to validate aborts construction.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// # use tdigest::TDigestOption;
    /// let digest = TDigest::with_options([
    ///     TDigestOption::Compression(42),
    ///     TDigestOption::LocalRandomNumberGenerator(0xCA10),
    /// ])
    /// .unwrap();
    /// assert_eq!(digest.compression(), 42.0);
    ///
    /// assert!(TDigest::with_options([TDigestOption::Compression(0)]).is_err());
    /// ```
    pub fn with_options(
        options: impl IntoIterator<Item = TDigestOption>,
    ) -> Result<TDigest, Error> {
        let mut digest = TDigest::new();
        for option in options {
            option.apply(&mut digest)?;
        }
        digest.summary = Summary::with_capacity(estimate_capacity(digest.compression));
        Ok(digest)
    }

    // for deserialization; the payload's compression is validated by the
    // codec, which also knows exactly how many centroids are coming
    pub(crate) fn for_decode(compression: f64, centroids: usize) -> TDigest {
        TDigest {
            summary: Summary::with_capacity(centroids),
            compression,
            count: 0,
            rng: Box::new(GlobalRng),
        }
    }

    /// Registers a new sample in the digest.
    ///
    /// It is an alias for [`add_weighted`](Self::add_weighted) with a weight
    /// of 1.
    ///
    /// # Errors
    ///
    /// Fails when `value` is NaN.
    pub fn add(&mut self, value: f64) -> Result<(), Error> {
        self.add_weighted(value, 1)
    }

    /// Registers a sample that occurred `weight` times.
    ///
    /// This is the main entry point of the digest: every mutation (merging,
    /// compression, deserialization replay) funnels through it. The sample is
    /// either folded into a nearby centroid, picked uniformly at random among
    /// the neighbors with spare capacity, or recorded as a fresh centroid
    /// when every neighbor is at its scale-function ceiling.
    ///
    /// # Errors
    ///
    /// Fails when `weight` is zero or `value` is NaN, without mutating the
    /// digest.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// let mut digest = TDigest::new();
    /// digest.add_weighted(42.0, 100).unwrap();
    /// assert_eq!(digest.count(), 100);
    /// ```
    pub fn add_weighted(&mut self, value: f64, weight: u32) -> Result<(), Error> {
        if weight == 0 {
            return Err(Error::invalid_input(format!(
                "illegal datapoint <value: {value:.4}, weight: 0>"
            )));
        }
        if value.is_nan() {
            return Err(Error::invalid_input("sample value must not be NaN"));
        }

        if self.summary.is_empty() {
            self.summary.add(value, weight)?;
            self.count = u64::from(weight);
            return Ok(());
        }

        // Walk right from the floor while the distance to `value` keeps
        // shrinking; [begin, end) covers the neighbors tied at the minimum.
        let start = self.summary.floor(value).unwrap_or(0);
        let mut begin = start;
        let mut end = self.summary.len();
        let mut min_distance = f64::MAX;
        for neighbor in start..self.summary.len() {
            let distance = (self.summary.mean(neighbor) - value).abs();
            if distance < min_distance {
                begin = neighbor;
                min_distance = distance;
            } else if distance > min_distance {
                end = neighbor;
                break;
            }
        }

        let mut selected = None;
        let mut eligible = 0.0f64;
        let mut head = self.summary.head_sum(begin) as f64;

        for neighbor in begin..end {
            let centroid_weight = f64::from(self.summary.count(neighbor));
            let quantile = if self.count == 1 {
                0.5
            } else {
                (head + (centroid_weight - 1.0) / 2.0) / (self.count - 1) as f64
            };
            let ceiling =
                4.0 * self.count as f64 * quantile * (1.0 - quantile) / self.compression;

            if centroid_weight + f64::from(weight) <= ceiling {
                eligible += 1.0;
                // reservoir sample of size one over the eligible neighbors
                if self.rng.next_f64() < 1.0 / eligible {
                    selected = Some(neighbor);
                }
            }
            head += centroid_weight;
        }

        match selected {
            None => self.summary.add(value, weight)?,
            Some(index) => {
                let count = self.summary.count(index);
                let mean = weighted_average(
                    self.summary.mean(index),
                    f64::from(count),
                    value,
                    f64::from(weight),
                );
                self.summary.set_at(index, mean, count + weight);
            }
        }
        self.count += u64::from(weight);

        if self.summary.len() as f64 > COMPRESSION_TRIGGER_FACTOR * self.compression {
            self.compress()?;
        }
        Ok(())
    }

    /// Returns the total number of samples this digest represents.
    ///
    /// The result is how many times [`add`](Self::add) was called plus how
    /// many samples the digests it has been merged with had. This is useful
    /// for knowing whether there is enough data to trust the quantiles, or
    /// whether too many samples have been registered already and something
    /// should be done about it (say, by filling a fresh side digest and
    /// switching over once it has seen enough data).
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the number of centroids in the digest.
    pub fn len(&self) -> usize {
        self.summary.len()
    }

    /// Returns true if the digest has not seen any samples.
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    /// Returns the compression parameter the digest was configured with.
    pub fn compression(&self) -> f64 {
        self.compression
    }

    /// Calls `f` with the mean and count of each centroid, in mean-sorted
    /// order. Iteration stops when `f` returns false.
    pub fn for_each_centroid(&self, f: impl FnMut(f64, u32) -> bool) {
        self.summary.iterate(f);
    }

    /// Tries to reduce the number of individual centroids stored in the
    /// digest by replaying them, shuffled, through a fresh summary.
    ///
    /// Compression trades accuracy for performance and happens automatically
    /// after a certain number of distinct samples accumulate, so calling this
    /// is never required. When minimizing network traffic it can be a good
    /// idea to compress before serializing. The total weight reported by
    /// [`count`](Self::count) is unaffected.
    ///
    /// # Errors
    ///
    /// Propagates the first replay failure, which would leave the digest
    /// holding whatever had been replayed so far; with the summary invariants
    /// in place this does not happen in practice.
    pub fn compress(&mut self) -> Result<(), Error> {
        if self.summary.len() <= 1 {
            return Ok(());
        }

        let capacity = self.summary.len();
        let old = std::mem::replace(&mut self.summary, Summary::with_capacity(capacity));
        self.count = 0;

        let (mut means, mut counts) = old.into_parts();
        shuffle(&mut means, &mut counts, self.rng.as_mut());
        for (&mean, &count) in means.iter().zip(&counts) {
            self.add_weighted(mean, count)?;
        }
        Ok(())
    }

    /// Joins the given digest into itself.
    ///
    /// Merging is useful when multiple instances accumulate samples in
    /// separate places and a single quantile overview over all of them is
    /// wanted, the typical scatter-gather scenario. The donor is left
    /// untouched; the receiver keeps its own compression and randomness
    /// source.
    ///
    /// # Errors
    ///
    /// Propagates the first replay failure.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// let mut a = TDigest::new();
    /// let mut b = TDigest::new();
    /// a.add(1.0).unwrap();
    /// b.add(2.0).unwrap();
    /// a.merge(&b).unwrap();
    /// assert_eq!(a.count(), 2);
    /// assert_eq!(b.count(), 1);
    /// ```
    pub fn merge(&mut self, other: &TDigest) -> Result<(), Error> {
        if other.summary.is_empty() {
            return Ok(());
        }

        // Replaying in sorted order would bias centroid placement badly, so
        // the donor's centroids are cloned and shuffled first.
        let (mut means, mut counts) = other.summary.to_parts();
        shuffle(&mut means, &mut counts, self.rng.as_mut());
        for (&mean, &count) in means.iter().zip(&counts) {
            self.add_weighted(mean, count)?;
        }
        Ok(())
    }

    /// Returns the desired quantile estimation.
    ///
    /// The estimate interpolates linearly between centroid means, using
    /// cumulative counts as coordinates; an empty digest yields NaN and a
    /// single-centroid digest yields its mean for every `q`.
    ///
    /// # Panics
    ///
    /// Panics when `q` is outside `[0, 1]`, which indicates a caller bug.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// let mut digest = TDigest::new();
    /// for sample in [1.0, 2.0, 3.0] {
    ///     digest.add(sample).unwrap();
    /// }
    /// assert_eq!(digest.quantile(0.5), 2.0);
    /// ```
    pub fn quantile(&self, q: f64) -> f64 {
        assert!(
            (0.0..=1.0).contains(&q),
            "q must be between 0 and 1 (inclusive)"
        );

        if self.summary.is_empty() {
            return f64::NAN;
        }
        if self.summary.len() == 1 {
            return self.summary.mean(0);
        }

        // A virtual index into the (count - 1)-long stream of samples; each
        // centroid sits at the midpoint of its mass.
        let index = q * (self.count - 1) as f64;
        let (found, head) = self.summary.floor_sum(index);
        let mut next = found.unwrap_or(0);
        let mut total = head as f64;

        let mut previous_mean = f64::NAN;
        let mut previous_index = 0.0;
        if next > 0 {
            previous_mean = self.summary.mean(next - 1);
            previous_index = total - (f64::from(self.summary.count(next - 1)) + 1.0) / 2.0;
        }

        loop {
            let next_index = total + (f64::from(self.summary.count(next)) - 1.0) / 2.0;
            if next_index >= index {
                if previous_mean.is_nan() {
                    // the index is before the first centroid
                    if next_index == previous_index {
                        return self.summary.mean(next);
                    }
                    // assume linear growth
                    let next_index2 = total
                        + f64::from(self.summary.count(next))
                        + (f64::from(self.summary.count(next + 1)) - 1.0) / 2.0;
                    previous_mean = (next_index2 * self.summary.mean(next)
                        - next_index * self.summary.mean(next + 1))
                        / (next_index2 - next_index);
                }
                // common case: the result sits between two centroids
                return interpolate(
                    index,
                    previous_index,
                    next_index,
                    previous_mean,
                    self.summary.mean(next),
                );
            }
            if next + 1 == self.summary.len() {
                // the index is past the last centroid
                let next_index2 = (self.count - 1) as f64;
                let next_mean2 = (self.summary.mean(next) * (next_index2 - previous_index)
                    - previous_mean * (next_index2 - next_index))
                    / (next_index - previous_index);
                return interpolate(
                    index,
                    next_index,
                    next_index2,
                    self.summary.mean(next),
                    next_mean2,
                );
            }
            total += f64::from(self.summary.count(next));
            previous_mean = self.summary.mean(next);
            previous_index = next_index;
            next += 1;
        }
    }

    /// Returns the approximate fraction of samples that are less than or
    /// equal to the given value.
    ///
    /// An empty digest yields NaN; a single-centroid digest degenerates to a
    /// step function at its mean. The result is always within `[0, 1]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tdigest::TDigest;
    /// let mut digest = TDigest::new();
    /// for sample in 0..100 {
    ///     digest.add(f64::from(sample)).unwrap();
    /// }
    /// assert_eq!(digest.cdf(f64::NEG_INFINITY), 0.0);
    /// assert_eq!(digest.cdf(f64::INFINITY), 1.0);
    /// ```
    pub fn cdf(&self, value: f64) -> f64 {
        let len = self.summary.len();
        if len == 0 {
            return f64::NAN;
        }
        if len == 1 {
            if value < self.summary.mean(0) {
                return 0.0;
            }
            return 1.0;
        }

        // Each centroid owns the interval spanning half the distance to its
        // neighbors on either side; the first and last mirror the half-width
        // of their only neighbor.
        let mut total = 0.0;
        for i in 0..len {
            let mean = self.summary.mean(i);
            let left = if i == 0 {
                (self.summary.mean(1) - mean) / 2.0
            } else {
                (mean - self.summary.mean(i - 1)) / 2.0
            };
            let right = if i + 1 == len {
                left
            } else {
                (self.summary.mean(i + 1) - mean) / 2.0
            };

            if value < mean + right {
                let fraction = (value - (mean - left)) / ((mean + right) - (mean - left));
                let cdf =
                    (total + f64::from(self.summary.count(i)) * fraction) / self.count as f64;
                return cdf.clamp(0.0, 1.0);
            }
            total += f64::from(self.summary.count(i));
        }
        1.0
    }

    pub(crate) fn summary_mut(&mut self) -> &mut Summary {
        &mut self.summary
    }

    pub(crate) fn set_compression(&mut self, compression: f64) {
        self.compression = compression;
    }

    pub(crate) fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    pub(crate) fn set_rng(&mut self, rng: Box<dyn DigestRng>) {
        self.rng = rng;
    }
}

/// Piecewise-linear interpolation at `index` between the points
/// `(previous_index, previous_mean)` and `(next_index, next_mean)`.
fn interpolate(
    index: f64,
    previous_index: f64,
    next_index: f64,
    previous_mean: f64,
    next_mean: f64,
) -> f64 {
    let delta = next_index - previous_index;
    let previous_weight = (next_index - index) / delta;
    let next_weight = (index - previous_index) / delta;
    previous_mean * previous_weight + next_mean * next_weight
}

/// The weighted average of two samples, arranged so precision loss stays
/// small when one weight dominates. Keeping the result monotonic in its
/// inputs is what lets `set_at` restore sort order with a local bubble.
fn weighted_average(x1: f64, w1: f64, x2: f64, w2: f64) -> f64 {
    if x1 <= x2 {
        weighted_average_sorted(x1, w1, x2, w2)
    } else {
        weighted_average_sorted(x2, w2, x1, w1)
    }
}

fn weighted_average_sorted(x1: f64, w1: f64, x2: f64, w2: f64) -> f64 {
    let x = (x1 * w1 + x2 * w2) / (w1 + w2);
    x.clamp(x1, x2)
}

/// Fisher-Yates shuffle over both centroid arrays in lockstep.
fn shuffle(means: &mut [f64], counts: &mut [u32], rng: &mut dyn DigestRng) {
    for i in (1..means.len()).rev() {
        let j = rng.next_below(i + 1);
        means.swap(i, j);
        counts.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::interpolate;
    use super::shuffle;
    use super::weighted_average;
    use crate::rng::LocalRng;

    #[test]
    fn test_weighted_average_is_symmetric() {
        let a = weighted_average(10.0, 1.0, 20.0, 3.0);
        let b = weighted_average(20.0, 3.0, 10.0, 1.0);
        assert_eq!(a, b);
        assert_eq!(a, 17.5);
    }

    #[test]
    fn test_weighted_average_stays_in_range() {
        let average = weighted_average(1.0, 1e12, 2.0, 1.0);
        assert!((1.0..=2.0).contains(&average));
    }

    #[test]
    fn test_interpolate_endpoints() {
        assert_eq!(interpolate(0.0, 0.0, 10.0, 5.0, 7.0), 5.0);
        assert_eq!(interpolate(10.0, 0.0, 10.0, 5.0, 7.0), 7.0);
        assert_eq!(interpolate(5.0, 0.0, 10.0, 5.0, 7.0), 6.0);
    }

    #[test]
    fn test_shuffle_covers_every_index() {
        // With a full Fisher-Yates pass the first element must be able to
        // move; run a few seeds and require that it does at least once.
        let mut moved = false;
        for seed in 0..20 {
            let mut rng = LocalRng::seeded(seed);
            let mut means: Vec<f64> = (0..10).map(f64::from).collect();
            let mut counts: Vec<u32> = (1..=10).collect();
            shuffle(&mut means, &mut counts, &mut rng);

            for (&mean, &count) in means.iter().zip(&counts) {
                assert_eq!(mean as u32 + 1, count);
            }
            if means[0] != 0.0 {
                moved = true;
            }
        }
        assert!(moved);
    }
}
