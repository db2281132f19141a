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

//! Byte accounting for channel buffers.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Tracks the bytes a channel's row buffer has accounted for. The channel
/// creates one allocator per buffer and must not share it; the flush service
/// uses the reserved total for upstream backpressure.
pub struct BufferAllocator {
    name: String,
    reserved: AtomicI64,
    closed: AtomicBool,
}

impl Debug for BufferAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BufferAllocator")
            .field("name", &self.name)
            .field("reserved", &self.reserved.load(Ordering::Acquire))
            .finish()
    }
}

impl BufferAllocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reserved: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reserve(&self, bytes: i64) {
        self.reserved.fetch_add(bytes, Ordering::AcqRel);
    }

    pub fn release(&self, bytes: i64) {
        let prev = self.reserved.fetch_sub(bytes, Ordering::AcqRel);
        if prev < bytes {
            log::warn!(
                "allocator {} released {bytes} bytes with only {prev} reserved",
                self.name
            );
        }
    }

    pub fn reserved(&self) -> i64 {
        self.reserved.load(Ordering::Acquire)
    }

    /// Terminal operation; reservations left behind indicate a leak.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let reserved = self.reserved.load(Ordering::Acquire);
        if reserved != 0 {
            log::warn!(
                "allocator {} closed with {reserved} bytes still reserved",
                self.name
            );
        }
    }
}

impl Drop for BufferAllocator {
    fn drop(&mut self) {
        let reserved = self.reserved.load(Ordering::Acquire);
        if !self.closed.load(Ordering::Acquire) && reserved != 0 {
            log::warn!(
                "allocator {} dropped with {reserved} bytes still reserved",
                self.name
            );
        }
    }
}
