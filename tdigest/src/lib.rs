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

//! # T-Digest quantile sketch
//!
//! A highly accurate, mergeable data structure for quantile estimation: an
//! adaptive histogram of weighted centroids with tighter resolution at the
//! distribution tails, based on the t-digest described by Ted Dunning and
//! Otmar Ertl.
//!
//! Producers feed weighted samples into a [`TDigest`]; consumers ask for
//! approximate quantiles and cumulative distribution values. Digests built on
//! different nodes can be merged into one global digest, and every digest
//! serializes to a compact binary form that interoperates with the reference
//! Java implementation.
//!
//! ```
//! # use tdigest::TDigest;
//! # use tdigest::TDigestOption;
//! let mut digest = TDigest::with_options([TDigestOption::Compression(100)]).unwrap();
//! for sample in 0..10_000 {
//!     digest.add(f64::from(sample)).unwrap();
//! }
//!
//! let p99 = digest.quantile(0.99);
//! assert!(p99 > 9_500.0 && p99 < 10_000.0);
//!
//! let bytes = digest.as_bytes().unwrap();
//! let restored = TDigest::from_reader(&bytes[..]).unwrap();
//! assert_eq!(restored.count(), 10_000);
//! ```
//!
//! A single digest is not safe for concurrent mutation; wrap it in a lock or
//! keep one per thread and [`merge`](TDigest::merge) on read.

#![deny(missing_docs)]

pub mod error;

mod codec;
mod options;
mod rng;
mod serialization;
mod sketch;
mod summary;

pub use self::options::TDigestOption;
pub use self::rng::DigestRng;
pub use self::rng::GlobalRng;
pub use self::rng::LocalRng;
pub use self::sketch::TDigest;
