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

//! Extended-property (EP) metadata shipped with each blob for server-side
//! pruning.

use std::collections::HashMap;

use serde::Serialize;

use crate::buffer::stats::RowBufferStats;

/// Server-bound per-column properties, copied out of a stats snapshot.
/// Integer bounds travel as decimal strings since they can exceed 64 bits.
#[derive(Debug, Clone, Serialize)]
pub struct FileColumnProperties {
    #[serde(rename = "minIntValue", skip_serializing_if = "Option::is_none")]
    min_int_value: Option<String>,
    #[serde(rename = "maxIntValue", skip_serializing_if = "Option::is_none")]
    max_int_value: Option<String>,
    #[serde(rename = "minStrValue", skip_serializing_if = "Option::is_none")]
    min_str_value: Option<String>,
    #[serde(rename = "maxStrValue", skip_serializing_if = "Option::is_none")]
    max_str_value: Option<String>,
    #[serde(rename = "minRealValue", skip_serializing_if = "Option::is_none")]
    min_real_value: Option<f64>,
    #[serde(rename = "maxRealValue", skip_serializing_if = "Option::is_none")]
    max_real_value: Option<f64>,
    #[serde(rename = "maxLength")]
    max_length: i64,
    #[serde(rename = "nullCount")]
    null_count: i64,
    #[serde(rename = "distinctValues")]
    distinct_values: i64,
}

impl From<&RowBufferStats> for FileColumnProperties {
    fn from(stats: &RowBufferStats) -> Self {
        Self {
            min_int_value: stats.current_min_int().map(|v| v.to_string()),
            max_int_value: stats.current_max_int().map(|v| v.to_string()),
            min_str_value: stats.current_min_str().map(str::to_string),
            max_str_value: stats.current_max_str().map(str::to_string),
            min_real_value: stats.current_min_real(),
            max_real_value: stats.current_max_real(),
            max_length: stats.current_max_length(),
            null_count: stats.current_null_count(),
            distinct_values: stats.distinct_values(),
        }
    }
}

impl FileColumnProperties {
    pub fn min_int_value(&self) -> Option<&str> {
        self.min_int_value.as_deref()
    }

    pub fn max_int_value(&self) -> Option<&str> {
        self.max_int_value.as_deref()
    }

    pub fn min_str_value(&self) -> Option<&str> {
        self.min_str_value.as_deref()
    }

    pub fn max_str_value(&self) -> Option<&str> {
        self.max_str_value.as_deref()
    }

    pub fn min_real_value(&self) -> Option<f64> {
        self.min_real_value
    }

    pub fn max_real_value(&self) -> Option<f64> {
        self.max_real_value
    }

    pub fn max_length(&self) -> i64 {
        self.max_length
    }

    pub fn null_count(&self) -> i64 {
        self.null_count
    }

    pub fn distinct_values(&self) -> i64 {
        self.distinct_values
    }
}

/// Row count plus one [`FileColumnProperties`] per column.
#[derive(Debug, Clone, Serialize)]
pub struct EpInfo {
    #[serde(rename = "rowCount")]
    row_count: i64,
    #[serde(rename = "columnEps")]
    column_eps: HashMap<String, FileColumnProperties>,
}

impl EpInfo {
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    pub fn column_eps(&self) -> &HashMap<String, FileColumnProperties> {
        &self.column_eps
    }
}

/// Packages a stats snapshot into the EP-info DTO handed to the flush
/// service. Pure transformation.
pub fn build_ep_info_from_stats(
    row_count: i64,
    col_stats: &HashMap<String, RowBufferStats>,
) -> EpInfo {
    let column_eps = col_stats
        .iter()
        .map(|(name, stats)| (name.clone(), FileColumnProperties::from(stats)))
        .collect();
    EpInfo {
        row_count,
        column_eps,
    }
}
