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
use crate::rng::LocalRng;
use crate::sketch::TDigest;

/// A construction-time configuration knob for
/// [`TDigest::with_options`](crate::TDigest::with_options).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TDigestOption {
    /// Sets the digest compression.
    ///
    /// The compression parameter rules the threshold at which samples are
    /// merged together: the more often distinct samples are merged, the more
    /// precision is lost. Compression should be tuned according to the data
    /// distribution, but the default of 100 is often good enough. A higher
    /// value means holding more centroids in memory (thus better precision),
    /// a bigger serialization payload and slower addition of new samples.
    ///
    /// Values below 1 are rejected.
    Compression(u32),

    /// Replaces the process-global randomness source with a deterministic
    /// one derived from the given seed, making the digest reproducible and
    /// independent of every other digest in the process.
    LocalRandomNumberGenerator(i64),
}

impl TDigestOption {
    pub(crate) fn apply(self, digest: &mut TDigest) -> Result<(), Error> {
        match self {
            TDigestOption::Compression(compression) => {
                if compression < 1 {
                    return Err(Error::invalid_input("compression should be >= 1"));
                }
                digest.set_compression(f64::from(compression));
                Ok(())
            }
            TDigestOption::LocalRandomNumberGenerator(seed) => {
                digest.set_rng(Box::new(LocalRng::seeded(seed)));
                Ok(())
            }
        }
    }
}
