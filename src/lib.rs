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

//! Core row buffering for a streaming ingest client.
//!
//! Each ingestion channel owns an [`buffer::ArrowRowBuffer`] that accumulates
//! loosely-typed rows, encodes every field into Arrow columnar vectors with
//! per-column statistics, and atomically hands the encoded columns to the
//! flush stage as a [`channel::ChannelData`] bundle. The schema is fixed when
//! the channel opens, from the column metadata in the
//! [`channel::OpenChannelResponse`].

#![deny(clippy::clone_on_ref_ptr)]

pub mod buffer;
pub mod channel;
pub mod errors;
pub mod memory;
pub mod schema;
pub mod value;

pub use buffer::ep_info::{build_ep_info_from_stats, EpInfo, FileColumnProperties};
pub use buffer::stats::RowBufferStats;
pub use buffer::ArrowRowBuffer;
pub use channel::{ChannelData, IngestChannel, OpenChannelResponse};
pub use errors::{ErrorCode, IngestError, IngestResult};
pub use memory::BufferAllocator;
pub use schema::ColumnMetadata;
pub use value::{Row, Value};
