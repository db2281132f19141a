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

//! Ingest SDK errors and their wire-level error codes.

use std::num::{ParseFloatError, ParseIntError};

use arrow::error::ArrowError;
use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The server described a column with a (logical, physical) type pair the
    /// buffer cannot encode. Fatal for the open channel.
    #[error("Unknown data type, logical type: {logical}, physical type: {physical}")]
    UnknownDataType { logical: String, physical: String },

    /// A row in an insert batch could not be encoded. The batch is failed as
    /// a whole and the buffer holds whatever was encoded before the failure.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// An invariant of the buffer was violated (missing vector/field/stats
    /// for a known column, unexpected vector kind, dropped channel). Fatal.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Arrow {
        #[from]
        source: ArrowError,
    },

    #[error(transparent)]
    NumberIntFormat {
        #[from]
        source: ParseIntError,
    },

    #[error(transparent)]
    NumberFloatFormat {
        #[from]
        source: ParseFloatError,
    },
}

impl IngestError {
    /// The stable error code this error surfaces as.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            IngestError::UnknownDataType { .. } => ErrorCode::UnknownDataType,
            IngestError::Internal(_) => ErrorCode::InternalError,
            IngestError::InvalidRow(_)
            | IngestError::Arrow { .. }
            | IngestError::NumberIntFormat { .. }
            | IngestError::NumberFloatFormat { .. } => ErrorCode::InvalidRow,
        }
    }
}

/// Wire-level error codes reported to callers and to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InternalError,
    UnknownDataType,
    InvalidRow,
}

impl ErrorCode {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnknownDataType => "UNKNOWN_DATA_TYPE",
            ErrorCode::InvalidRow => "INVALID_ROW",
        }
    }

    /// Message code associated with the error, stable across releases.
    pub fn message_code(&self) -> &'static str {
        match self {
            ErrorCode::InternalError => "0001",
            ErrorCode::UnknownDataType => "0002",
            ErrorCode::InvalidRow => "0003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.message_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        let err = IngestError::UnknownDataType {
            logical: "TIMESTAMP_TZ".to_string(),
            physical: "SB8".to_string(),
        };
        assert_eq!(err.error_code(), ErrorCode::UnknownDataType);
        assert!(err.to_string().contains("TIMESTAMP_TZ"));
        assert!(err.to_string().contains("SB8"));

        assert_eq!(
            IngestError::InvalidRow("bad".to_string()).error_code(),
            ErrorCode::InvalidRow
        );
        assert_eq!(
            IngestError::Internal("broken".to_string()).error_code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn parse_errors_surface_as_invalid_row() {
        let err: IngestError = "abc".parse::<i64>().unwrap_err().into();
        assert_eq!(err.error_code(), ErrorCode::InvalidRow);
    }

    #[test]
    fn message_codes_are_stable() {
        assert_eq!(ErrorCode::InternalError.message_code(), "0001");
        assert_eq!(ErrorCode::UnknownDataType.message_code(), "0002");
        assert_eq!(ErrorCode::InvalidRow.message_code(), "0003");
        assert_eq!(
            ErrorCode::UnknownDataType.to_string(),
            "UNKNOWN_DATA_TYPE (0002)"
        );
    }
}
