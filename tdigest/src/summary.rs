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

//! The centroid container inside a digest: a mean-sorted sequence stored as
//! two parallel arrays. Tree semantics (floor lookups, ordered insertion) are
//! simulated with binary search plus shift-on-insert; the digest keeps the
//! size bounded, so the shifts stay cheap and prefix sums can be computed by
//! scanning a contiguous array.

use crate::error::Error;

/// Below this length a linear scan beats binary search on the means array.
const LINEAR_SCAN_CUTOFF: usize = 250;

/// Mean-sorted centroid store.
///
/// Invariants: `means` is non-decreasing and free of NaN, `counts` entries
/// are at least 1, and both arrays always have the same length.
#[derive(Debug, Clone, Default)]
pub(crate) struct Summary {
    pub(crate) means: Vec<f64>,
    pub(crate) counts: Vec<u32>,
}

impl Summary {
    pub(crate) fn with_capacity(capacity: usize) -> Summary {
        Summary {
            means: Vec::with_capacity(capacity),
            counts: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.means.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Positional access; the caller guarantees `index < len()`.
    #[inline]
    pub(crate) fn mean(&self, index: usize) -> f64 {
        self.means[index]
    }

    /// Positional access; the caller guarantees `index < len()`.
    #[inline]
    pub(crate) fn count(&self, index: usize) -> u32 {
        self.counts[index]
    }

    /// Inserts a centroid at its sorted position, shifting later entries
    /// right. Ties insert after equal means. Never coalesces.
    pub(crate) fn add(&mut self, mean: f64, count: u32) -> Result<(), Error> {
        if mean.is_nan() {
            return Err(Error::invalid_input("centroid mean must not be NaN"));
        }
        if count == 0 {
            return Err(Error::invalid_input("centroid count must be positive"));
        }

        let index = self.find_insertion_index(mean);
        self.means.insert(index, mean);
        self.counts.insert(index, count);
        Ok(())
    }

    /// The smallest index whose mean is strictly greater than `x`, or `len()`
    /// when every mean is less than or equal to it.
    pub(crate) fn find_insertion_index(&self, x: f64) -> usize {
        if self.means.len() < LINEAR_SCAN_CUTOFF {
            self.means
                .iter()
                .position(|&mean| mean > x)
                .unwrap_or(self.means.len())
        } else {
            self.means.partition_point(|&mean| mean <= x)
        }
    }

    /// The largest index whose mean is strictly less than `x`. Equal means
    /// count as being above the floor.
    pub(crate) fn floor(&self, x: f64) -> Option<usize> {
        let above = if self.means.len() < LINEAR_SCAN_CUTOFF {
            self.means
                .iter()
                .position(|&mean| mean >= x)
                .unwrap_or(self.means.len())
        } else {
            self.means.partition_point(|&mean| mean < x)
        };
        above.checked_sub(1)
    }

    /// Sum of the counts before `index` (exclusive).
    ///
    /// This runs once per neighbor on every insertion, so it is summed in
    /// blocks of four to keep the loop wide.
    pub(crate) fn head_sum(&self, index: usize) -> u64 {
        let head = &self.counts[..index];
        let mut chunks = head.chunks_exact(4);
        let mut sum = 0u64;
        for chunk in &mut chunks {
            sum += u64::from(chunk[0])
                + u64::from(chunk[1])
                + u64::from(chunk[2])
                + u64::from(chunk[3]);
        }
        for &count in chunks.remainder() {
            sum += u64::from(count);
        }
        sum
    }

    /// The largest index whose head sum does not exceed `target`, along with
    /// that head sum. `(None, 0)` when no centroid satisfies the bound, which
    /// only happens for negative targets.
    pub(crate) fn floor_sum(&self, target: f64) -> (Option<usize>, u64) {
        let mut cumulative = 0u64;
        let mut found = None;
        for (index, &count) in self.counts.iter().enumerate() {
            if cumulative as f64 <= target {
                found = Some(index);
            } else {
                break;
            }
            cumulative += u64::from(count);
        }
        match found {
            Some(index) => (Some(index), cumulative - u64::from(self.counts[index])),
            None => (None, 0),
        }
    }

    /// Overwrites slot `index` and restores sort order by bubbling the entry
    /// towards its new position. Insertion only ever nudges a mean within its
    /// immediate neighborhood, so the bubble terminates after a few swaps.
    pub(crate) fn set_at(&mut self, index: usize, mean: f64, count: u32) {
        self.means[index] = mean;
        self.counts[index] = count;
        self.bubble_right(index);
        self.bubble_left(index);
    }

    fn bubble_right(&mut self, index: usize) {
        let mut i = index + 1;
        while i < self.means.len() && self.means[i - 1] > self.means[i] {
            self.means.swap(i - 1, i);
            self.counts.swap(i - 1, i);
            i += 1;
        }
    }

    fn bubble_left(&mut self, index: usize) {
        let mut i = index;
        while i > 0 && self.means[i - 1] > self.means[i] {
            self.means.swap(i - 1, i);
            self.counts.swap(i - 1, i);
            i -= 1;
        }
    }

    /// In-order traversal, stopping early when `f` returns false.
    pub(crate) fn iterate(&self, mut f: impl FnMut(f64, u32) -> bool) {
        for (&mean, &count) in self.means.iter().zip(&self.counts) {
            if !f(mean, count) {
                break;
            }
        }
    }

    /// Copies out the raw centroid arrays, e.g. for a merge replay that must
    /// not disturb this summary.
    pub(crate) fn to_parts(&self) -> (Vec<f64>, Vec<u32>) {
        (self.means.clone(), self.counts.clone())
    }

    /// Consumes the summary, yielding the raw centroid arrays.
    pub(crate) fn into_parts(self) -> (Vec<f64>, Vec<u32>) {
        (self.means, self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::Summary;
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    fn is_sorted(summary: &Summary) -> bool {
        summary.means.windows(2).all(|pair| pair[0] <= pair[1])
    }

    #[test]
    fn test_rejects_bad_centroids() {
        let mut summary = Summary::with_capacity(2);

        assert!(summary.add(1.0, 1).is_ok());
        assert!(summary.add(f64::NAN, 1).is_err());
        assert!(summary.add(1.0, 0).is_err());
        assert_eq!(summary.len(), 1);
    }

    #[test]
    fn test_add_keeps_sort_order() {
        let mut rng = StdRng::seed_from_u64(0xFEED);
        let mut summary = Summary::with_capacity(16);

        for _ in 0..1000 {
            let mean: f64 = rng.random();
            let count = rng.random_range(1..100);
            summary.add(mean, count).unwrap();
            assert!(is_sorted(&summary));
        }
        assert_eq!(summary.len(), 1000);
    }

    #[test]
    fn test_ties_insert_to_the_right() {
        let mut summary = Summary::with_capacity(4);
        summary.add(5.0, 1).unwrap();
        summary.add(5.0, 2).unwrap();
        summary.add(5.0, 3).unwrap();

        assert_eq!(summary.counts, vec![1, 2, 3]);
        assert_eq!(summary.find_insertion_index(5.0), 3);
    }

    #[test]
    fn test_floor() {
        let mut summary = Summary::with_capacity(128);
        for i in 0..101 {
            summary.add(f64::from(i) / 2.0, 1).unwrap();
        }

        assert_eq!(summary.floor(-30.0), None);
        assert_eq!(summary.floor(0.0), None);

        for i in 0..summary.len() {
            let mean = summary.mean(i);
            let floor = summary.floor(mean + 0.1).unwrap();
            assert_eq!(summary.mean(floor), mean);
        }
    }

    #[test]
    fn test_floor_skips_equal_means() {
        let mut summary = Summary::with_capacity(4);
        summary.add(1.0, 1).unwrap();
        summary.add(2.0, 1).unwrap();
        summary.add(2.0, 1).unwrap();

        // equal means are above the floor
        assert_eq!(summary.floor(2.0), Some(0));
    }

    #[test]
    fn test_head_sum_matches_naive() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut summary = Summary::with_capacity(64);
        for _ in 0..300 {
            summary.add(rng.random(), rng.random_range(1..50)).unwrap();
        }

        for index in 0..=summary.len() {
            let naive: u64 = summary.counts[..index].iter().map(|&c| u64::from(c)).sum();
            assert_eq!(summary.head_sum(index), naive);
        }
    }

    #[test]
    fn test_floor_sum() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut summary = Summary::with_capacity(128);
        let mut total = 0u64;
        for _ in 0..100 {
            let count = rng.random_range(1..10);
            summary.add(rng.random(), count).unwrap();
            total += u64::from(count);
        }

        let (index, cumulative) = summary.floor_sum(-1.0);
        assert_eq!(index, None);
        assert_eq!(cumulative, 0);

        for target in 0..(total + 10) {
            let (index, cumulative) = summary.floor_sum(target as f64);
            let index = index.unwrap();
            assert_eq!(cumulative, summary.head_sum(index));
            assert!(summary.head_sum(index) as f64 <= target as f64);
            if index + 1 < summary.len() {
                assert!(summary.head_sum(index + 1) as f64 > target as f64);
            }
        }
    }

    #[test]
    fn test_set_at_never_breaks_sorting() {
        let mut summary = Summary::with_capacity(8);
        for _ in 0..5 {
            summary.add(10.0, 1).unwrap();
        }

        summary.set_at(0, 30.0, 1);
        assert!(is_sorted(&summary));

        let last = summary.len() - 1;
        summary.set_at(last, 0.0, 1);
        assert!(is_sorted(&summary));

        summary.set_at(3, 10.1, 1);
        assert!(is_sorted(&summary));

        summary.set_at(3, 9.9, 1);
        assert!(is_sorted(&summary));
    }

    #[test]
    fn test_set_at_carries_counts_with_means() {
        let mut summary = Summary::with_capacity(8);
        for i in 1..=5 {
            summary.add(f64::from(i), i).unwrap();
        }

        // move the middle entry past the right end
        summary.set_at(2, 9.0, 7);
        assert!(is_sorted(&summary));
        let last = summary.len() - 1;
        assert_eq!(summary.mean(last), 9.0);
        assert_eq!(summary.count(last), 7);
    }

    #[test]
    fn test_iterate_early_exit() {
        let mut summary = Summary::with_capacity(8);
        for i in 1..=6u32 {
            summary.add(f64::from(i), i * 10).unwrap();
        }

        let mut visited = 0;
        summary.iterate(|_, _| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);

        let mut total = 0u32;
        summary.iterate(|_, count| {
            total += count;
            true
        });
        assert_eq!(total, 210);
    }
}
