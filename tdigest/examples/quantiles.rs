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

use tdigest::TDigest;
use tdigest::TDigestOption;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // One digest per producer; a seeded generator keeps the run reproducible.
    let mut requests_eu = TDigest::with_options([
        TDigestOption::Compression(100),
        TDigestOption::LocalRandomNumberGenerator(1),
    ])?;
    let mut requests_us = TDigest::with_options([
        TDigestOption::Compression(100),
        TDigestOption::LocalRandomNumberGenerator(2),
    ])?;

    // Fake some response latencies (milliseconds): the EU fleet is slower.
    println!("Recording 50,000 latencies on two nodes...");
    for i in 0..50_000u32 {
        let jitter = f64::from(i % 997) / 10.0;
        requests_eu.add(20.0 + jitter)?;
        requests_us.add(5.0 + jitter / 2.0)?;
    }

    println!("EU node:  p50={:.1}ms p99={:.1}ms ({} centroids)",
        requests_eu.quantile(0.5),
        requests_eu.quantile(0.99),
        requests_eu.len(),
    );
    println!("US node:  p50={:.1}ms p99={:.1}ms ({} centroids)",
        requests_us.quantile(0.5),
        requests_us.quantile(0.99),
        requests_us.len(),
    );

    // Merge both nodes into a fleet-wide view.
    let mut fleet = TDigest::with_options([TDigestOption::Compression(100)])?;
    fleet.merge(&requests_eu)?;
    fleet.merge(&requests_us)?;

    println!(
        "Fleet:    p50={:.1}ms p99={:.1}ms over {} samples",
        fleet.quantile(0.5),
        fleet.quantile(0.99),
        fleet.count(),
    );
    println!(
        "Fraction of requests under 50ms: {:.1}%",
        fleet.cdf(50.0) * 100.0
    );

    // Ship the digest somewhere else and restore it.
    let payload = fleet.as_bytes()?;
    let restored = TDigest::from_reader(&payload[..])?;
    println!(
        "Serialized to {} bytes; restored digest holds {} samples",
        payload.len(),
        restored.count(),
    );

    Ok(())
}
