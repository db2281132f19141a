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

//! Contract between the row buffer and the channel that owns it, plus the
//! bundle handed to the flush service.

use std::sync::{Arc, Weak};

use arrow::array::RecordBatch;
use serde::Deserialize;

use crate::buffer::ep_info::EpInfo;
use crate::memory::BufferAllocator;
use crate::schema::ColumnMetadata;

/// Operations the row buffer needs from its owning channel. The buffer holds
/// only a weak handle so it never extends the channel's lifetime.
pub trait IngestChannel: Send + Sync {
    /// Allocator used to account the buffer's bytes; valid for the lifetime
    /// of the buffer and not shared with any other buffer.
    fn allocator(&self) -> Arc<BufferAllocator>;

    /// Atomically increments and returns the channel's row sequencer.
    fn increment_and_get_row_sequencer(&self) -> i64;

    fn offset_token(&self) -> Option<String>;

    /// Last-write-wins scalar recording the latest buffered row.
    fn set_offset_token(&self, offset_token: Option<String>);

    /// `db.schema.table.channel`, for logging.
    fn fully_qualified_name(&self) -> String;
}

/// Everything the flush service needs to build one blob: the encoded columns
/// in schema order (each field carries its encoding metadata), durability
/// ordering, and the per-column statistics.
#[derive(Debug)]
pub struct ChannelData {
    batch: RecordBatch,
    row_count: i64,
    buffer_size: f32,
    channel: Weak<dyn IngestChannel>,
    row_sequencer: i64,
    offset_token: Option<String>,
    column_eps: EpInfo,
}

impl ChannelData {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        batch: RecordBatch,
        row_count: i64,
        buffer_size: f32,
        channel: Weak<dyn IngestChannel>,
        row_sequencer: i64,
        offset_token: Option<String>,
        column_eps: EpInfo,
    ) -> Self {
        Self {
            batch,
            row_count,
            buffer_size,
            channel,
            row_sequencer,
            offset_token,
            column_eps,
        }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Estimated encoded bytes, fractional to account for bitmap bits.
    pub fn buffer_size(&self) -> f32 {
        self.buffer_size
    }

    pub fn channel(&self) -> Weak<dyn IngestChannel> {
        Weak::clone(&self.channel)
    }

    pub fn row_sequencer(&self) -> i64 {
        self.row_sequencer
    }

    pub fn offset_token(&self) -> Option<&str> {
        self.offset_token.as_deref()
    }

    pub fn column_eps(&self) -> &EpInfo {
        &self.column_eps
    }
}

/// Reply to a channel-open request; `table_columns` feeds
/// [`crate::buffer::ArrowRowBuffer::setup_schema`].
#[derive(Debug, Clone, Deserialize)]
pub struct OpenChannelResponse {
    #[serde(rename = "status_code")]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "database", default)]
    pub db_name: Option<String>,
    #[serde(rename = "schema", default)]
    pub schema_name: Option<String>,
    #[serde(rename = "table", default)]
    pub table_name: Option<String>,
    #[serde(rename = "channel", default)]
    pub channel_name: Option<String>,
    #[serde(rename = "client_sequencer", default)]
    pub client_sequencer: Option<i64>,
    #[serde(rename = "row_sequencer", default)]
    pub row_sequencer: Option<i64>,
    #[serde(rename = "offset_token", default)]
    pub offset_token: Option<String>,
    #[serde(rename = "table_columns", default)]
    pub table_columns: Vec<ColumnMetadata>,
}
