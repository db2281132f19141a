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

//! Per-column running statistics shipped with each flushed blob.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use num::BigInt;

/// Running min/max, length, null-count and distinct-value statistics for one
/// column within the current buffer epoch.
#[derive(Debug, Clone, Default)]
pub struct RowBufferStats {
    current_min_int: Option<BigInt>,
    current_max_int: Option<BigInt>,
    current_min_str: Option<String>,
    current_max_str: Option<String>,
    current_min_real: Option<f64>,
    current_max_real: Option<f64>,
    current_max_length: i64,
    current_null_count: i64,
    // Fingerprints of every non-null value seen, for the distinct estimate.
    fingerprints: HashSet<u64>,
}

fn fingerprint(value: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl RowBufferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_int_value(&mut self, value: &BigInt) {
        match &self.current_min_int {
            Some(min) if min <= value => {}
            _ => self.current_min_int = Some(value.clone()),
        }
        match &self.current_max_int {
            Some(max) if max >= value => {}
            _ => self.current_max_int = Some(value.clone()),
        }
        self.fingerprints.insert(fingerprint(value));
    }

    pub fn add_str_value(&mut self, value: &str) {
        match self.current_min_str.as_deref() {
            Some(min) if min <= value => {}
            _ => self.current_min_str = Some(value.to_string()),
        }
        match self.current_max_str.as_deref() {
            Some(max) if max >= value => {}
            _ => self.current_max_str = Some(value.to_string()),
        }
        self.fingerprints.insert(fingerprint(&value));
    }

    /// NaN contributes to the distinct estimate but is ignored for ordering.
    pub fn add_real_value(&mut self, value: f64) {
        if !value.is_nan() {
            match self.current_min_real {
                Some(min) if min <= value => {}
                _ => self.current_min_real = Some(value),
            }
            match self.current_max_real {
                Some(max) if max >= value => {}
                _ => self.current_max_real = Some(value),
            }
        }
        self.fingerprints.insert(fingerprint(&value.to_bits()));
    }

    pub fn set_current_max_length(&mut self, length: i64) {
        self.current_max_length = self.current_max_length.max(length);
    }

    pub fn inc_current_null_count(&mut self) {
        self.current_null_count += 1;
    }

    pub fn current_min_int(&self) -> Option<&BigInt> {
        self.current_min_int.as_ref()
    }

    pub fn current_max_int(&self) -> Option<&BigInt> {
        self.current_max_int.as_ref()
    }

    pub fn current_min_str(&self) -> Option<&str> {
        self.current_min_str.as_deref()
    }

    pub fn current_max_str(&self) -> Option<&str> {
        self.current_max_str.as_deref()
    }

    pub fn current_min_real(&self) -> Option<f64> {
        self.current_min_real
    }

    pub fn current_max_real(&self) -> Option<f64> {
        self.current_max_real
    }

    pub fn current_max_length(&self) -> i64 {
        self.current_max_length
    }

    pub fn current_null_count(&self) -> i64 {
        self.current_null_count
    }

    /// Distinct non-null values seen so far. Exact for the hash-set backing;
    /// the contract only requires a non-decreasing estimate.
    pub fn distinct_values(&self) -> i64 {
        self.fingerprints.len() as i64
    }
}
