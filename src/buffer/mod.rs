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

//! The per-channel row buffer: rows in, Arrow columns out.

pub mod ep_info;
mod row;
pub mod stats;
mod vector;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::datatypes::{FieldRef, Schema};
use log::debug;

use crate::channel::{ChannelData, IngestChannel};
use crate::errors::{IngestError, IngestResult};
use crate::memory::BufferAllocator;
use crate::schema::{build_field, normalize_column_name, ColumnMetadata};
use crate::value::{Row, Value};
use ep_info::build_ep_info_from_stats;
use row::{append_cell, encode_cell, EncodedCell};
use stats::RowBufferStats;
use vector::ColumnVector;

#[derive(Default)]
struct BufferInner {
    // One entry per column in each map, keyed by normalized name.
    vectors: HashMap<String, ColumnVector>,
    fields: HashMap<String, FieldRef>,
    stats: HashMap<String, RowBufferStats>,
    // Flush emits columns in schema order.
    column_order: Vec<String>,
    row_count: i64,
    cur_row_index: usize,
    buffer_size: f32,
    reserved_bytes: i64,
}

/// Accumulates rows for one ingest channel, encoding each field into Arrow
/// columnar storage, and hands the encoded columns to the flush service.
///
/// Inserts and flushes are serialized by an internal lock. The row count and
/// byte estimate are mirrored in atomics so metrics can read them without
/// contending.
pub struct ArrowRowBuffer {
    owning_channel: Weak<dyn IngestChannel>,
    allocator: Arc<BufferAllocator>,
    inner: Mutex<BufferInner>,
    row_count: AtomicI64,
    buffer_size_bits: AtomicU32,
}

impl ArrowRowBuffer {
    pub fn new(channel: &Arc<dyn IngestChannel>) -> Self {
        Self {
            owning_channel: Arc::downgrade(channel),
            allocator: channel.allocator(),
            inner: Mutex::new(BufferInner::default()),
            row_count: AtomicI64::new(0),
            buffer_size_bits: AtomicU32::new(0f32.to_bits()),
        }
    }

    /// Materializes one vector, one field and one empty stats record per
    /// column. Called exactly once, before the first insert.
    pub fn setup_schema(&self, columns: &[ColumnMetadata]) -> IngestResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for column in columns {
            let field = Arc::new(build_field(column)?);
            let vector = ColumnVector::for_field(&field)?;
            let name = field.name().clone();
            if inner.fields.contains_key(&name) {
                return Err(IngestError::Internal(format!(
                    "duplicate column {name} in schema"
                )));
            }
            inner.column_order.push(name.clone());
            inner.vectors.insert(name.clone(), vector);
            inner.fields.insert(name.clone(), field);
            inner.stats.insert(name, RowBufferStats::new());
        }
        Ok(())
    }

    /// Inserts a batch of rows, then records `offset_token` on the owning
    /// channel. The batch fails as a whole with `INVALID_ROW` if any row
    /// cannot be encoded; rows encoded before the failure stay buffered, the
    /// failed row leaves no effects.
    pub fn insert_rows<I>(&self, rows: I, offset_token: Option<String>) -> IngestResult<()>
    where
        I: IntoIterator<Item = Row>,
    {
        let channel = self.channel()?;
        let mut inner = self.inner.lock().unwrap();
        let mut result = Ok(());
        for row in rows {
            if let Err(err) = Self::convert_row_to_arrow(&mut inner, &row) {
                result = Err(match err {
                    err @ IngestError::InvalidRow(_) => err,
                    other => IngestError::InvalidRow(other.to_string()),
                });
                break;
            }
            inner.row_count += 1;
            self.row_count.store(inner.row_count, Ordering::Release);
        }
        if result.is_ok() {
            channel.set_offset_token(offset_token);
        }
        self.sync_accounting(&mut inner);
        result
    }

    /// Encodes one row across all schema columns at the current row index.
    ///
    /// Coercion happens for every column before anything is appended, so a
    /// bad value fails the row without leaving partially written vectors.
    /// Columns the row does not name are null-filled to keep every vector
    /// the same length.
    fn convert_row_to_arrow(inner: &mut BufferInner, row: &Row) -> IngestResult<()> {
        let BufferInner {
            vectors,
            fields,
            stats,
            column_order,
            buffer_size,
            cur_row_index,
            ..
        } = inner;

        // Resolve the row's keys to normalized column names. A key spelled
        // two ways collapses to one write; the last entry wins.
        let mut row_size = 0f32;
        let mut staged: HashMap<String, &Value> = HashMap::with_capacity(row.len());
        for (key, value) in row {
            row_size += 0.125; // 1 bit in the null bitmap
            if key.is_empty() {
                return Err(IngestError::Internal("invalid column name: empty".to_string()));
            }
            let column_name = normalize_column_name(key);
            if !fields.contains_key(&column_name) {
                return Err(IngestError::Internal(format!(
                    "no column field for {column_name}"
                )));
            }
            staged.insert(column_name, value);
        }

        let mut cells: Vec<EncodedCell> = Vec::with_capacity(column_order.len());
        for name in column_order.iter() {
            let field = fields
                .get(name)
                .ok_or_else(|| Self::missing_column(name, "field"))?;
            let vector = vectors
                .get(name)
                .ok_or_else(|| Self::missing_column(name, "vector"))?;
            let cell = match staged.get(name).copied() {
                None => {
                    row_size += 0.125;
                    EncodedCell::Null
                }
                Some(Value::Null) => EncodedCell::Null,
                Some(value) => encode_cell(field, vector, value, &mut row_size)?,
            };
            cells.push(cell);
        }

        for (name, cell) in column_order.iter().zip(cells) {
            let vector = vectors
                .get_mut(name)
                .ok_or_else(|| Self::missing_column(name, "vector"))?;
            let column_stats = stats
                .get_mut(name)
                .ok_or_else(|| Self::missing_column(name, "stats"))?;
            append_cell(vector, column_stats, cell)?;
        }
        *buffer_size += row_size;
        *cur_row_index += 1;
        Ok(())
    }

    /// Takes ownership of the buffered columns and everything the flush
    /// service needs to build a blob, then resets the buffer. Returns `None`
    /// when there is nothing to flush.
    pub fn flush(&self) -> IngestResult<Option<ChannelData>> {
        let channel = self.channel()?;
        debug!(
            "Row buffer flush requested on channel={}",
            channel.fully_qualified_name()
        );
        if self.row_count.load(Ordering::Acquire) == 0 {
            return Ok(None);
        }

        let mut inner = self.inner.lock().unwrap();
        // Re-check now that the lock is held; a concurrent flush may have
        // emptied the buffer.
        if inner.row_count == 0 {
            return Ok(None);
        }

        let BufferInner {
            vectors,
            fields,
            column_order,
            cur_row_index,
            ..
        } = &mut *inner;
        let mut schema_fields: Vec<FieldRef> = Vec::with_capacity(column_order.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(column_order.len());
        for name in column_order.iter() {
            let field = fields
                .get(name)
                .ok_or_else(|| Self::missing_column(name, "field"))?;
            let column_vector = vectors
                .get_mut(name)
                .ok_or_else(|| Self::missing_column(name, "vector"))?;
            if column_vector.len() != *cur_row_index {
                return Err(IngestError::Internal(format!(
                    "column {name} holds {} values, expected {}",
                    column_vector.len(),
                    cur_row_index
                )));
            }
            schema_fields.push(Arc::clone(field));
            arrays.push(column_vector.finish());
        }

        let row_count = inner.row_count;
        let buffer_size = inner.buffer_size;
        let row_sequencer = channel.increment_and_get_row_sequencer();
        let offset_token = channel.offset_token();
        let stats_snapshot = inner.stats.clone();
        self.reset_locked(&mut inner);
        drop(inner);

        debug!(
            "Row buffer flush on channel={}, rowCount={}, bufferSize={}",
            channel.fully_qualified_name(),
            row_count,
            buffer_size
        );

        let schema = Arc::new(Schema::new(schema_fields));
        let options = RecordBatchOptions::new().with_row_count(Some(row_count as usize));
        let batch = RecordBatch::try_new_with_options(schema, arrays, &options)?;
        let column_eps = build_ep_info_from_stats(row_count, &stats_snapshot);
        Ok(Some(ChannelData::new(
            batch,
            row_count,
            buffer_size,
            Weak::clone(&self.owning_channel),
            row_sequencer,
            offset_token,
            column_eps,
        )))
    }

    /// Clears vectors and counters and rebuilds every stats slot. Invoked
    /// from flush with the lock held.
    fn reset_locked(&self, inner: &mut BufferInner) {
        for column_vector in inner.vectors.values_mut() {
            column_vector.clear();
        }
        for column_stats in inner.stats.values_mut() {
            *column_stats = RowBufferStats::new();
        }
        inner.row_count = 0;
        inner.cur_row_index = 0;
        inner.buffer_size = 0.0;
        self.allocator.release(inner.reserved_bytes);
        inner.reserved_bytes = 0;
        self.row_count.store(0, Ordering::Release);
        self.buffer_size_bits.store(0f32.to_bits(), Ordering::Release);
    }

    /// Releases the vectors and closes the allocator. The caller must ensure
    /// no insert or flush is in flight.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.vectors.clear();
        inner.fields.clear();
        inner.stats.clear();
        inner.column_order.clear();
        self.allocator.release(inner.reserved_bytes);
        inner.reserved_bytes = 0;
        self.allocator.close();
    }

    /// Estimated encoded bytes currently buffered. Best-effort read without
    /// taking the flush lock.
    pub fn get_size(&self) -> f32 {
        f32::from_bits(self.buffer_size_bits.load(Ordering::Acquire))
    }

    /// Rows currently buffered. Best-effort read without taking the flush
    /// lock.
    pub fn row_count(&self) -> i64 {
        self.row_count.load(Ordering::Acquire)
    }

    fn channel(&self) -> IngestResult<Arc<dyn IngestChannel>> {
        self.owning_channel
            .upgrade()
            .ok_or_else(|| IngestError::Internal("owning channel was dropped".to_string()))
    }

    fn missing_column(name: &str, what: &str) -> IngestError {
        IngestError::Internal(format!("no column {what} for {name}"))
    }

    fn sync_accounting(&self, inner: &mut BufferInner) {
        self.buffer_size_bits
            .store(inner.buffer_size.to_bits(), Ordering::Release);
        let total = inner.buffer_size.ceil() as i64;
        if total > inner.reserved_bytes {
            self.allocator.reserve(total - inner.reserved_bytes);
            inner.reserved_bytes = total;
        }
    }
}
