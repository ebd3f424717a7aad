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

//! The source of randomness a digest uses for reservoir sampling and centroid
//! shuffling, modeled as an injectable capability so sketches can be made
//! deterministic in tests and independent of each other in production.

use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Randomness capability consumed by the digest.
///
/// Implementations must return uniformly distributed values; the statistical
/// quality of the sketch degrades with a biased source.
pub trait DigestRng: fmt::Debug {
    /// Returns a uniformly distributed float in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Returns a uniformly distributed integer in `[0, bound)`.
    ///
    /// `bound` must be greater than zero.
    fn next_below(&mut self, bound: usize) -> usize;
}

/// The default randomness source, backed by the process-wide generator.
///
/// Every digest constructed with defaults draws from the same underlying
/// generator (one per thread), so mutating two such digests concurrently is
/// not safe. Supply a [`LocalRng`] through
/// [`TDigestOption::LocalRandomNumberGenerator`](crate::TDigestOption) for
/// independent, reproducible instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalRng;

impl DigestRng for GlobalRng {
    fn next_f64(&mut self) -> f64 {
        rand::rng().random()
    }

    fn next_below(&mut self, bound: usize) -> usize {
        rand::rng().random_range(0..bound)
    }
}

/// A self-contained, seeded randomness source.
///
/// Two digests built from the same seed and fed the same samples in the same
/// order produce identical centroids.
#[derive(Debug, Clone)]
pub struct LocalRng {
    inner: StdRng,
}

impl LocalRng {
    /// Creates a generator deterministically derived from `seed`.
    pub fn seeded(seed: i64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed as u64),
        }
    }
}

impl DigestRng for LocalRng {
    fn next_f64(&mut self) -> f64 {
        self.inner.random()
    }

    fn next_below(&mut self, bound: usize) -> usize {
        self.inner.random_range(0..bound)
    }
}
